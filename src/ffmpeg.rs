// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Invoking the external ffmpeg/ffprobe binaries that mux and demux the raw
//! RGB24 frame stream into and out of an H.264/MP4 container.
//!
//! This is the one concurrency surface in the crate: a child process. All
//! state here lives for the duration of a single encode or decode call.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{Context, Result};

use crate::constants::{
    FFMPEG_EXECUTABLE, FFPROBE_EXECUTABLE, H264_CRF_LOCAL, H264_CRF_YOUTUBE, H264_PRESET_LOCAL,
    H264_PRESET_YOUTUBE, H264_TUNE_YOUTUBE, PIXEL_FORMAT_LOCAL, PIXEL_FORMAT_YOUTUBE,
    STDERR_TAIL_BYTES,
};
use crate::error::CodecError;
use crate::mode::Mode;

/// A running ffmpeg muxer: raw RGB24 frames are written to `stdin`, and the
/// finished MP4 is on disk once `finish` returns successfully.
pub struct EncodeSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl EncodeSink {
    /// Spawns ffmpeg to mux a raw RGB24 stream of the given geometry/fps
    /// into an H.264 MP4 at `output_path`, using encoding parameters per
    /// `mode` (chroma-subsampled CRF~18 for `youtube`, lossless `yuv444p`
    /// for `local`).
    pub fn spawn(output_path: &std::path::Path, width: u32, height: u32, fps: u8, mode: Mode) -> Result<Self> {
        let (pixel_format, crf, preset, tune) = match mode {
            Mode::Youtube => (
                PIXEL_FORMAT_YOUTUBE,
                H264_CRF_YOUTUBE,
                H264_PRESET_YOUTUBE,
                Some(H264_TUNE_YOUTUBE),
            ),
            Mode::Local => (PIXEL_FORMAT_LOCAL, H264_CRF_LOCAL, H264_PRESET_LOCAL, None),
        };

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-v".into(),
            "warning".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{width}x{height}"),
            "-r".into(),
            fps.to_string(),
            "-i".into(),
            "-".into(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            pixel_format.into(),
            "-crf".into(),
            crf.to_string(),
            "-preset".into(),
            preset.into(),
        ];
        if let Some(tune) = tune {
            args.push("-tune".into());
            args.push(tune.into());
        }
        args.push("-movflags".into());
        args.push("+faststart".into());
        args.push(output_path.to_string_lossy().into_owned());

        let mut child = Command::new(FFMPEG_EXECUTABLE)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|_| CodecError::Missing {
                executable: FFMPEG_EXECUTABLE,
            })?;

        let stdin = child.stdin.take();
        Ok(Self { child, stdin })
    }

    /// Writes one raw RGB24 frame (`width * height * 3` bytes) to the
    /// encoder's stdin.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.stdin
            .as_mut()
            .context("encoder stdin already closed")?
            .write_all(frame)
            .context("failed to write frame to ffmpeg stdin")
    }

    /// Closes stdin and waits for ffmpeg to finish muxing. Returns an error
    /// surfacing the child's stderr tail if it exits non-zero.
    pub fn finish(mut self) -> Result<()> {
        drop(self.stdin.take());
        let status = self.child.wait().context("failed to wait on ffmpeg")?;
        if status.success() {
            return Ok(());
        }
        let stderr_tail = read_stderr_tail(&mut self.child);
        Err(CodecError::ProcessFailed {
            executable: FFMPEG_EXECUTABLE,
            stderr_tail,
        }
        .into())
    }
}

/// A running ffmpeg demuxer: raw RGB24 frames are read from `stdout`.
pub struct DecodeSource {
    child: Child,
    stdout: ChildStdout,
}

impl DecodeSource {
    /// Spawns ffmpeg to demux `input_path` into a raw RGB24 stream on stdout.
    pub fn spawn(input_path: &std::path::Path) -> Result<Self> {
        let mut child = Command::new(FFMPEG_EXECUTABLE)
            .args([
                "-i",
                &input_path.to_string_lossy(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-v",
                "quiet",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|_| CodecError::Missing {
                executable: FFMPEG_EXECUTABLE,
            })?;

        let stdout = child.stdout.take().context("ffmpeg stdout was not piped")?;
        Ok(Self { child, stdout })
    }

    /// Reads exactly one raw RGB24 frame (`frame_size` bytes). Returns
    /// `Ok(None)` on a clean EOF with no bytes read, or `Ok(Some(partial))`
    /// if the stream ended mid-frame (a short stream, tolerated by the
    /// caller with a warning).
    pub fn read_frame(&mut self, frame_size: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; frame_size];
        let mut read_so_far = 0usize;
        while read_so_far < frame_size {
            let n = self
                .stdout
                .read(&mut buf[read_so_far..])
                .context("failed to read frame from ffmpeg stdout")?;
            if n == 0 {
                break;
            }
            read_so_far += n;
        }
        if read_so_far == 0 {
            return Ok(None);
        }
        buf.truncate(read_so_far);
        Ok(Some(buf))
    }

    /// Tears the child down without deadlock: kill it and reap the exit
    /// status. `self.stdout` is dropped along with `self`, closing the pipe
    /// so the child never blocks writing to a reader that has gone away.
    pub fn close(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Probes a video file's pixel dimensions via ffprobe's JSON stream metadata.
pub fn probe_dimensions(path: &std::path::Path) -> Result<(u32, u32)> {
    let output = Command::new(FFPROBE_EXECUTABLE)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            &path.to_string_lossy(),
        ])
        .output()
        .map_err(|_| CodecError::Missing {
            executable: FFPROBE_EXECUTABLE,
        })?;

    if !output.status.success() {
        anyhow::bail!("ffprobe failed to read video metadata for {}", path.display());
    }

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).context("ffprobe output was not valid JSON")?;
    let streams = parsed
        .get("streams")
        .and_then(|s| s.as_array())
        .context("ffprobe output had no streams array")?;

    for stream in streams {
        if stream.get("codec_type").and_then(|v| v.as_str()) == Some("video") {
            let width = stream.get("width").and_then(serde_json::Value::as_u64);
            let height = stream.get("height").and_then(serde_json::Value::as_u64);
            if let (Some(w), Some(h)) = (width, height) {
                #[allow(clippy::cast_possible_truncation)]
                return Ok((w as u32, h as u32));
            }
        }
    }

    anyhow::bail!("ffprobe found no video stream in {}", path.display())
}

/// Reads up to `STDERR_TAIL_BYTES` of a failed child's stderr for display.
fn read_stderr_tail(child: &mut Child) -> String {
    let mut buf = Vec::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_end(&mut buf);
    }
    let start = buf.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&buf[start..]).into_owned()
}
