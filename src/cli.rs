// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Command line argument handling: `encode`, `decode`, `info`, `verify`.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use crate::constants::{DEFAULT_FPS, DEFAULT_REPEAT, DEFAULT_RESOLUTION};
use crate::encoder::EncodeConfig;
use crate::decoder::DecodeConfig;
use crate::mode::Mode;

/// A parsed `WIDTHxHEIGHT` resolution, e.g. `640x480`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Resolution(u32, u32);

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT (e.g. 640x480), got {s:?}"))?;
        let width: u32 = w.parse().map_err(|_| format!("invalid width in resolution {s:?}"))?;
        let height: u32 = h.parse().map_err(|_| format!("invalid height in resolution {s:?}"))?;
        if width == 0 || height == 0 {
            return Err(format!("resolution dimensions must be non-zero, got {s:?}"));
        }
        Ok(Resolution(width, height))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.0, self.1)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        let (width, height) = DEFAULT_RESOLUTION;
        Resolution(width, height)
    }
}

/// Store and retrieve arbitrary files through lossily re-encoded video.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level operation to perform.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a file into an H.264/MP4 video stream.
    Encode {
        /// File to encode.
        input: PathBuf,
        /// Destination `.mp4` path. Defaults to the input path with its
        /// extension replaced by `.mp4`.
        output: Option<PathBuf>,
        /// Resilience profile.
        #[arg(short, long, value_enum, default_value_t = Mode::Youtube)]
        mode: Mode,
        /// Output resolution as `WIDTHxHEIGHT`.
        #[arg(short, long, default_value_t = Resolution::default())]
        resolution: Resolution,
        /// Output video framerate.
        #[arg(long, default_value_t = DEFAULT_FPS, value_parser = clap::value_parser!(u8).range(1..=60))]
        fps: u8,
        /// Number of times each data frame is repeated, for redundancy.
        #[arg(long, default_value_t = DEFAULT_REPEAT, value_parser = clap::value_parser!(u8).range(1..=20))]
        repeat: u8,
        /// Pixel block size; defaults to the mode's recommended size.
        #[arg(long)]
        block_size: Option<u8>,
        /// Password to obfuscate the payload with. Not authenticated encryption.
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Decode a file back out of a previously encoded video stream.
    Decode {
        /// Source `.mp4` path.
        input: PathBuf,
        /// Directory to write the recovered file into.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Password, if the stream was encrypted.
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Print a stream's metadata record without decoding its payload.
    Info {
        /// Source `.mp4` path.
        input: PathBuf,
    },
    /// Fully decode a stream in memory and confirm its SHA-256 matches.
    Verify {
        /// Source `.mp4` path.
        input: PathBuf,
        /// Password, if the stream was encrypted.
        #[arg(short, long)]
        password: Option<String>,
    },
}

impl Args {
    /// Builds an `EncodeConfig` from `Command::Encode` fields. When `output`
    /// was omitted, derives it from `input` with its extension replaced by
    /// `.mp4`.
    ///
    /// # Errors
    /// Returns an error if called on a non-`Encode` command.
    pub fn encode_config(&self) -> Result<EncodeConfig> {
        let Command::Encode {
            input,
            output,
            mode,
            resolution,
            fps,
            repeat,
            block_size,
            password,
        } = &self.command
        else {
            bail!("encode_config called on a non-encode command");
        };

        let Resolution(width, height) = *resolution;
        let output = output.clone().unwrap_or_else(|| input.with_extension("mp4"));

        Ok(EncodeConfig {
            input: input.clone(),
            output,
            mode: *mode,
            width,
            height,
            fps: *fps,
            repeat: *repeat,
            block_size: *block_size,
            password: password.clone(),
        })
    }

    /// Builds a `DecodeConfig` from `Command::Decode` fields.
    ///
    /// # Errors
    /// Returns an error if called on a non-`Decode` command.
    pub fn decode_config(&self) -> Result<DecodeConfig> {
        let Command::Decode {
            input,
            output_dir,
            password,
        } = &self.command
        else {
            bail!("decode_config called on a non-decode command");
        };

        Ok(DecodeConfig {
            input: input.clone(),
            output_dir: output_dir.clone(),
            password: password.clone(),
        })
    }
}
