// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for fallible dispatcher operations.

use core::fmt;

use bracken_mem::OutOfMemory;

/// Errors reported by fallible dispatcher operations.
///
/// Everything else that could be called misuse is either a silent no-op by
/// design (double unbind, unbind of a never-bound callback) or a contract
/// violation that panics (any use of a destroyed dispatcher or its events).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Error {
    /// An allocation below the API was refused by the installed memory hooks
    /// or genuinely failed. The operation rolled back: no partial state
    /// remains.
    NoMemory,
    /// An argument was rejected; the only producer is creating an event with
    /// an empty name.
    InvalidArgument,
    /// The operation conflicts with current state; the only producer is
    /// creating an event whose case-folded name already exists.
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NoMemory => "out of memory",
            Self::InvalidArgument => "invalid argument",
            Self::InvalidState => "invalid state",
        };
        f.write_str(message)
    }
}

impl core::error::Error for Error {}

impl From<OutOfMemory> for Error {
    fn from(_: OutOfMemory) -> Self {
        Self::NoMemory
    }
}
