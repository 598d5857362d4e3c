// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! filevault - Store and retrieve arbitrary files through lossily
//! re-encoded video.
//!
//! Encodes a file as a sequence of flat-colored block grids, rendered as
//! raw RGB24 frames and muxed into an H.264/MP4 stream. A platform like
//! YouTube can re-encode that stream with lossy chroma subsampling and the
//! file still comes back out, because `youtube` mode's 4-level palette
//! survives it; `local` mode trades that resilience for 8 levels per
//! channel when the round trip is known to be lossless.
//!
//! NOTE: No effort has been undertaken to make this work on Windows.
//! Probably wont. 🤷

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_docs_in_private_items,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::pedantic,
    clippy::redundant_clone,
    clippy::needless_pass_by_value
)]
#![allow(clippy::cast_lossless)]

use anyhow::Result;
use clap::Parser;

use cli::{Args, Command};

mod calibration;
mod cli;
mod constants;
mod decoder;
mod encoder;
mod error;
mod ffmpeg;
mod frame;
mod fs_helpers;
mod metadata;
mod mode;
mod packer;
mod pipeline;
mod progress;
mod quantize;

use crate::timed_block;

/// Reads command line arguments and dispatches to the requested subcommand.
fn execute_args() -> Result<()> {
    let args = Args::parse();

    match &args.command {
        Command::Encode { .. } => {
            let config = args.encode_config()?;
            timed_block!("encoding", {
                let report = encoder::encode(&config)?;
                println!(
                    "Encoded {} ({} data frames, SHA-256 {})",
                    report.filename,
                    report.data_frames,
                    hex_string(&report.file_hash)
                );
            });
        }
        Command::Decode { .. } => {
            let config = args.decode_config()?;
            timed_block!("decoding", {
                let report = decoder::decode(&config)?;
                println!("Decoded to {}", report.output_path.display());
                if report.hash_verified {
                    println!("SHA-256 verified.");
                } else {
                    println!("WARNING: recovered file's SHA-256 does not match the recorded hash.");
                }
            });
        }
        Command::Info { input } => {
            let metadata = decoder::info(input)?;
            print_metadata(&metadata);
        }
        Command::Verify { input, password } => {
            timed_block!("verification", {
                let ok = decoder::verify(input, password.as_deref())?;
                if ok {
                    println!("OK: SHA-256 matches.");
                } else {
                    println!("FAILED: SHA-256 does not match.");
                }
            });
        }
    }

    Ok(())
}

/// Prints a metadata record's fields for the `info` subcommand.
fn print_metadata(metadata: &metadata::Metadata) {
    println!("File:        {}", metadata.filename);
    println!("Version:     {}", metadata.version);
    println!("Block size:  {}", metadata.block_size);
    println!("Bits/chan:   {}", metadata.bpc);
    println!("Resolution:  {}x{}", metadata.width, metadata.height);
    println!("FPS:         {}", metadata.fps);
    println!("Repeat:      {}", metadata.repeat);
    println!("Compressed:  {}", metadata.compressed);
    println!("Encrypted:   {}", metadata.encrypted);
    println!("Original:    {} bytes", metadata.original_size);
    println!("Payload:     {} bytes", metadata.payload_size);
    println!("SHA-256:     {}", hex_string(&metadata.file_hash));
}

/// Formats bytes as lowercase hex, the way a file hash is conventionally printed.
fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn main() -> Result<()> {
    let start = std::time::Instant::now();
    execute_args()?;
    println!("Total execution time: {}", progress::fmt_duration(start.elapsed()));
    Ok(())
}
