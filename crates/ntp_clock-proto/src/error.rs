// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Custom error types for NTP packet parsing.
//!
//! Decoding never fails on an out-of-range enumerated field; those fall back
//! to a documented variant. The only failure is a buffer that cannot hold a
//! full 48-byte header. [`ParseError`] converts into [`std::io::Error`] so it
//! can travel through `io::Result` based APIs.

use std::fmt;

/// Errors that can occur while decoding an NTP packet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// The buffer is too short for the expected data.
    BufferTooShort {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        available: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BufferTooShort { needed, available } => {
                write!(
                    f,
                    "buffer too short: needed {} bytes, got {}",
                    needed, available
                )
            }
        }
    }
}

impl From<ParseError> for std::io::Error {
    fn from(err: ParseError) -> std::io::Error {
        let kind = match &err {
            ParseError::BufferTooShort { .. } => std::io::ErrorKind::UnexpectedEof,
        };
        std::io::Error::new(kind, err)
    }
}

impl std::error::Error for ParseError {}
