// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Encoding modes: `youtube` (resists chroma subsampling) and `local`
//! (assumes a lossless or near-lossless round trip).

use clap::ValueEnum;

use crate::constants::{DEFAULT_BLOCK_LOCAL, DEFAULT_BLOCK_YT, LOCAL_LEVELS, YT_LEVELS};

/// Which palette/resilience profile to encode with.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "lower")]
pub enum Mode {
    /// 4-level palette, 2 bits per channel. Survives chroma subsampling.
    Youtube,
    /// 8-level palette, 3 bits per channel. Assumes a lossless round trip.
    Local,
}

impl Mode {
    /// The fixed, ordered palette of intensity levels for this mode.
    #[must_use]
    pub fn levels(self) -> &'static [u8] {
        match self {
            Mode::Youtube => &YT_LEVELS,
            Mode::Local => &LOCAL_LEVELS,
        }
    }

    /// Bits per channel encoded in each block: `2` for youtube, `3` for local.
    #[must_use]
    pub fn bpc(self) -> u8 {
        match self {
            Mode::Youtube => 2,
            Mode::Local => 3,
        }
    }

    /// Default pixel block size when the caller doesn't override one.
    #[must_use]
    pub fn default_block_size(self) -> u8 {
        match self {
            Mode::Youtube => DEFAULT_BLOCK_YT,
            Mode::Local => DEFAULT_BLOCK_LOCAL,
        }
    }

    /// The mode matching a given `bpc`, as recovered during decode probing.
    #[must_use]
    pub fn from_bpc(bpc: u8) -> Option<Mode> {
        match bpc {
            2 => Some(Mode::Youtube),
            3 => Some(Mode::Local),
            _ => None,
        }
    }
}
