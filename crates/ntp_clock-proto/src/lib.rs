// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTP wire format for a single-server clock correction client.
//!
//! This crate provides the packet header types, the NTP fixed-point formats,
//! and the codec used to build 48-byte client requests and decode server
//! replies (RFC 1305 / RFC 5905 header layout).
//!
//! ```
//! use ntp_clock_proto::codec;
//!
//! let request = codec::encode_request(Some(1_700_000_000.25));
//! let reply = codec::decode_reply(&request, 1_700_000_000.5).unwrap();
//! assert!((reply.transmit_time() - 1_700_000_000.25).abs() < 1e-6);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Custom error types for NTP packet parsing.
pub mod error;

/// NTP protocol types and constants.
pub mod protocol;

/// Conversion between NTP timestamps and floating seconds since the Unix epoch.
pub mod unix_time;

/// Client request encoding and server reply decoding.
pub mod codec;

pub use codec::{Reply, decode_reply, encode_request};
