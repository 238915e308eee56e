// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors that reach the caller.  Problems with individual tiles
//! never do: an empty tile renders as an empty buffer, a stale tile is
//! dropped, and a panicking tile is left blank.

use failure::Fail;
use std::io;

/// Everything that can go wrong outside of a tile.
#[derive(Debug, Fail)]
pub enum RenderError {
    /// A configuration value is out of range.
    #[fail(display = "invalid configuration: {}", _0)]
    InvalidConfig(String),

    /// No preset by that name.
    #[fail(display = "unknown preset: {}", _0)]
    UnknownPreset(String),

    /// Every worker thread has gone away while tiles were still due.
    #[fail(display = "render worker disconnected")]
    WorkerDisconnected,

    /// Spawning a thread or writing an image failed.
    #[fail(display = "i/o error: {}", _0)]
    Io(#[cause] io::Error),
}

impl From<io::Error> for RenderError {
    fn from(e: io::Error) -> Self {
        RenderError::Io(e)
    }
}
