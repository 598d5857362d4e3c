// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Global constants.

// === Wire format constants ===
// DO NOT CHANGE THESE without bumping VERSION.

/// Magic bytes identifying a FileVault metadata record.
pub const MAGIC: [u8; 4] = *b"FVLT";

/// Current on-disk metadata record version.
pub const VERSION: u8 = 3;

/// Largest `original_size` a metadata record may declare.
pub const MAX_ORIGINAL_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// 4-level palette used in `youtube` mode. Encodes 2 bits per channel.
pub const YT_LEVELS: [u8; 4] = [0, 85, 170, 255];

/// 8-level palette used in `local` mode. Encodes 3 bits per channel.
pub const LOCAL_LEVELS: [u8; 8] = [0, 36, 73, 109, 146, 182, 219, 255];

/// How many color channels each block carries: red, green, blue.
pub const COLOR_CHANNELS: usize = 3;

/// Ordered candidate block sizes tried while probing an unknown stream.
/// Order matters: it is chosen by expected frequency so decode behavior
/// stays reproducible across runs.
pub const PROBE_BLOCK_SIZES: [u8; 7] = [8, 4, 16, 6, 10, 12, 2];

/// Ordered candidate bits-per-channel values tried while probing.
pub const PROBE_BPC: [u8; 2] = [2, 3];

/// Absolute per-channel offset above which a calibration-adjusted LUT is built.
pub const OFFSET_CORRECTION_THRESHOLD: i32 = 2;

// === Configuration Constants ===

/// Default pixel block size for `youtube` mode.
pub const DEFAULT_BLOCK_YT: u8 = 8;

/// Default pixel block size for `local` mode.
pub const DEFAULT_BLOCK_LOCAL: u8 = 4;

/// Default output video resolution.
pub const DEFAULT_RESOLUTION: (u32, u32) = (640, 480);

/// Default output video framerate.
pub const DEFAULT_FPS: u8 = 10;

/// Default data-frame repetition count.
pub const DEFAULT_REPEAT: u8 = 1;

/// Name of the ffmpeg executable, resolved through `PATH`.
pub const FFMPEG_EXECUTABLE: &str = "ffmpeg";

/// Name of the ffprobe executable, resolved through `PATH`.
pub const FFPROBE_EXECUTABLE: &str = "ffprobe";

/// H.264 Constant Rate Factor used for `youtube` mode.
/// 0 -> lossless, 23 -> x264 default, 51 -> worst possible.
pub const H264_CRF_YOUTUBE: u32 = 18;

/// H.264 Constant Rate Factor used for `local` mode (lossless).
pub const H264_CRF_LOCAL: u32 = 0;

/// x264 preset used for `youtube` mode.
pub const H264_PRESET_YOUTUBE: &str = "medium";

/// x264 preset used for `local` mode.
pub const H264_PRESET_LOCAL: &str = "ultrafast";

/// x264 tune used for `youtube` mode; favors a mostly-static image sequence.
pub const H264_TUNE_YOUTUBE: &str = "stillimage";

/// Pixel format used to mux `youtube` mode video. Chroma subsampled 4:2:0.
pub const PIXEL_FORMAT_YOUTUBE: &str = "yuv420p";

/// Pixel format used to mux `local` mode video. Full chroma resolution.
pub const PIXEL_FORMAT_LOCAL: &str = "yuv444p";

/// Maximum number of trailing stderr bytes surfaced from a failed child process.
pub const STDERR_TAIL_BYTES: usize = 500;
