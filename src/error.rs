// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The one place a typed error is worth having: the external codec boundary,
//! where the caller needs to tell "binary not installed" apart from "binary
//! ran and failed" to print a useful hint. Everything else in this crate
//! stays `anyhow::Error`.

use std::fmt;

/// Failure arising from invoking the external video codec subprocess.
#[derive(Debug)]
pub enum CodecError {
    /// The configured executable could not be found on `PATH`.
    Missing {
        /// Name of the executable that could not be spawned.
        executable: &'static str,
    },
    /// The child process exited with a non-zero status.
    ProcessFailed {
        /// Name of the executable that failed.
        executable: &'static str,
        /// Trailing bytes of the child's stderr, decoded lossily.
        stderr_tail: String,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Missing { executable } => write!(
                f,
                "{executable} not found on PATH. Install ffmpeg: \
                 Debian/Ubuntu `apt install ffmpeg`, macOS `brew install ffmpeg`, \
                 Fedora `dnf install ffmpeg`, Arch `pacman -S ffmpeg`."
            ),
            CodecError::ProcessFailed {
                executable,
                stderr_tail,
            } => write!(f, "{executable} exited with an error:\n{stderr_tail}"),
        }
    }
}

impl std::error::Error for CodecError {}
