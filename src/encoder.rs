// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Orchestrates the quantizer, bit packer, frame renderer, calibration
//! pattern, metadata record, and payload pipeline into a sequence of raw
//! RGB frames, handed off to the ffmpeg muxer.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};

use crate::calibration::generate_calibration_frame;
use crate::ffmpeg::EncodeSink;
use crate::frame::{Geometry, render_frame};
use crate::metadata::{self, BuildParams};
use crate::mode::Mode;
use crate::packer::pack;
use crate::pipeline::{compress, derive_key, generate_salt, xor_crypt};
use crate::progress::{ProgressTimer, fmt_size};

/// Parameters controlling a single encode run.
pub struct EncodeConfig {
    /// File to read and encode.
    pub input: PathBuf,
    /// Destination `.mp4` path.
    pub output: PathBuf,
    /// Resilience profile: `youtube` or `local`.
    pub mode: Mode,
    /// Output video width in pixels.
    pub width: u32,
    /// Output video height in pixels.
    pub height: u32,
    /// Output video framerate.
    pub fps: u8,
    /// Data-frame repetition count, at least 1.
    pub repeat: u8,
    /// Pixel block size; defaults to `mode.default_block_size()` if `None`.
    pub block_size: Option<u8>,
    /// Optional password; when set, the payload is XOR-obfuscated.
    pub password: Option<String>,
}

/// Summary of a completed encode, printed by the CLI.
#[derive(Debug)]
pub struct EncodeReport {
    /// Original file name, as recorded in the metadata record.
    pub filename: String,
    /// Uncompressed plaintext length.
    pub original_size: u64,
    /// Payload length after compress/encrypt.
    pub payload_size: u64,
    /// Number of unique data frames written (before repetition).
    pub data_frames: usize,
    /// SHA-256 of the plaintext.
    pub file_hash: [u8; 32],
}

/// Reads, compresses, optionally encrypts, and frames `config.input`,
/// streaming calibration/metadata/data frames into an ffmpeg muxer writing
/// `config.output`.
pub fn encode(config: &EncodeConfig) -> Result<EncodeReport> {
    if !config.input.is_file() {
        bail!("input file not found: {}", config.input.display());
    }
    if config.repeat == 0 {
        bail!("repeat must be at least 1");
    }

    let block_size = config.block_size.unwrap_or_else(|| config.mode.default_block_size());
    let geometry = Geometry {
        width: config.width,
        height: config.height,
        block_size,
    };
    if geometry.grid_w() < 4 || geometry.grid_h() < 4 {
        bail!(
            "resolution {}x{} at block size {} is too small to fit a metadata frame",
            config.width,
            config.height,
            block_size
        );
    }

    let bpc = u32::from(config.mode.bpc());
    let levels = config.mode.levels();
    let bytes_per_frame = geometry.bytes_per_frame(bpc);
    if bytes_per_frame == 0 {
        bail!("resolution/block-size combination encodes zero bytes per frame");
    }

    let raw_data = fs::read(&config.input).context("unable to read input file")?;
    let original_size = raw_data.len() as u64;
    let filename = config
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_hash: [u8; 32] = Sha256::digest(&raw_data).into();

    let (compressed_data, is_compressed) = compress(&raw_data).context("compression failed")?;
    if is_compressed {
        println!(
            "  Compressed: {} -> {}",
            fmt_size(original_size),
            fmt_size(compressed_data.len() as u64)
        );
    }

    let (payload, is_encrypted, salt) = if let Some(password) = &config.password {
        let salt = generate_salt();
        let key = derive_key(password, &salt, compressed_data.len());
        (xor_crypt(&compressed_data, &key), true, salt)
    } else {
        (compressed_data, false, [0u8; 16])
    };

    let payload_size = payload.len() as u64;
    let data_frames = payload.len().div_ceil(bytes_per_frame);

    println!("  File:       {filename}");
    println!("  Original:   {}", fmt_size(original_size));
    println!("  Payload:    {}", fmt_size(payload_size));
    println!("  Mode:       {:?}", config.mode);
    println!("  Block:      {block_size}x{block_size}");
    println!("  Resolution: {}x{}", config.width, config.height);
    println!("  Frames:     {} data x{}", data_frames, config.repeat);

    let mut sink = EncodeSink::spawn(&config.output, config.width, config.height, config.fps, config.mode)?;

    let cal_frame = generate_calibration_frame(&geometry, levels);
    sink.write_frame(&cal_frame)?;

    let meta_params = BuildParams {
        block_size,
        bpc: config.mode.bpc(),
        width: u16::try_from(config.width).context("width must fit in u16")?,
        height: u16::try_from(config.height).context("height must fit in u16")?,
        fps: config.fps,
        repeat: config.repeat,
        filename: &filename,
        original_size,
        payload_size,
        file_hash,
        compressed: is_compressed,
        encrypted: is_encrypted,
        salt,
    };
    let meta_record = metadata::build(&meta_params, bytes_per_frame);
    let meta_blocks = pack(&meta_record, geometry.block_count(), bpc);
    sink.write_frame(&render_frame(&geometry, levels, &meta_blocks))?;

    let timer = ProgressTimer::start();
    for (i, chunk) in payload.chunks(bytes_per_frame).enumerate() {
        let mut padded = chunk.to_vec();
        padded.resize(bytes_per_frame, 0);
        let blocks = pack(&padded, geometry.block_count(), bpc);
        let rendered = render_frame(&geometry, levels, &blocks);
        for _ in 0..config.repeat {
            sink.write_frame(&rendered)?;
        }
        print!("\r  Encoding: {} ", timer.bar(i + 1, data_frames, 30));
    }
    println!();

    sink.finish()?;

    Ok(EncodeReport {
        filename,
        original_size,
        payload_size,
        data_frames,
        file_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // The in-memory pipeline (hash, compress, encrypt, frame layout) is
    // covered end-to-end by `crate::decoder`'s round-trip tests, which drive
    // frames directly and bypass the codec subprocess entirely.

    #[test]
    fn geometry_rejects_undersized_grids() {
        let geometry = Geometry {
            width: 16,
            height: 16,
            block_size: 8,
        };
        assert!(geometry.grid_w() < 4);
    }

    #[test]
    fn data_frame_count_matches_ceil_division() {
        let geometry = Geometry {
            width: 640,
            height: 480,
            block_size: 8,
        };
        let bpc = 2u32;
        let bytes_per_frame = geometry.bytes_per_frame(bpc);
        let payload = vec![0u8; bytes_per_frame * 3 + 1];
        let frames = payload.len().div_ceil(bytes_per_frame);
        assert_eq!(frames, 4);
    }
}
