// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Build client requests and decode server replies.
//!
//! Requests always go out as NTPv3 client packets with the transmit timestamp
//! set from the local wall clock. Replies are decoded from the first 48 bytes;
//! anything after the header (extension fields, key identifier, digest) is
//! ignored.

use std::ops::Deref;

use crate::error::ParseError;
use crate::protocol::{
    ClockSource, ConstPackedSizeBytes, LeapIndicator, Mode, Packet, ReadBytes, ShortFormat,
    Stratum, TimestampFormat, Version, WriteBytes,
};
use crate::unix_time;

/// Size of an encoded request and the minimum size of a reply.
pub const HEADER_SIZE: usize = Packet::PACKED_SIZE_BYTES;

/// The header sent by [`encode_request`], with the given transmit timestamp.
pub fn request_packet(transmit_timestamp: TimestampFormat) -> Packet {
    Packet {
        leap_indicator: LeapIndicator::NoWarning,
        version: Version::V3,
        mode: Mode::Client,
        stratum: Stratum::UNSPECIFIED,
        poll: crate::protocol::REQUEST_POLL,
        precision: crate::protocol::REQUEST_PRECISION,
        root_delay: ShortFormat {
            seconds: 1,
            fraction: 0,
        },
        root_dispersion: ShortFormat {
            seconds: 1,
            fraction: 0,
        },
        clock_source: ClockSource::Debug(0),
        reference_timestamp: TimestampFormat::default(),
        origin_timestamp: TimestampFormat::default(),
        receive_timestamp: TimestampFormat::default(),
        transmit_timestamp,
    }
}

/// Encode a 48-byte client request.
///
/// The transmit timestamp is `transmit_time` (Unix seconds) when given, or
/// the current system time otherwise.
pub fn encode_request(transmit_time: Option<f64>) -> [u8; HEADER_SIZE] {
    let transmit = transmit_time.unwrap_or_else(unix_time::now_seconds);
    let packet = request_packet(unix_time::to_timestamp(transmit));
    let mut buf = [0u8; HEADER_SIZE];
    let mut writer = &mut buf[..];
    let written = writer.write_bytes(&packet);
    debug_assert!(written.is_ok(), "header fits its own packed size");
    buf
}

/// Decode a server reply received at `destination_time` (Unix seconds).
///
/// Fails only when `bytes` is shorter than a full header.
pub fn decode_reply(bytes: &[u8], destination_time: f64) -> Result<Reply, ParseError> {
    let too_short = ParseError::BufferTooShort {
        needed: HEADER_SIZE,
        available: bytes.len(),
    };
    if bytes.len() < HEADER_SIZE {
        return Err(too_short);
    }
    let mut reader = &bytes[..HEADER_SIZE];
    let packet = reader.read_bytes::<Packet>().map_err(|_| too_short)?;
    Ok(Reply {
        packet,
        destination_time,
    })
}

/// A decoded server reply together with the local time it arrived.
///
/// Dereferences to the raw [`Packet`]; the accessors below convert its fixed
/// point fields into floating seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reply {
    /// The decoded header.
    pub packet: Packet,
    /// Local wall clock when the reply arrived, in Unix seconds. Not part of
    /// the wire bytes.
    pub destination_time: f64,
}

impl Reply {
    /// Time the server clock was last set, in Unix seconds.
    pub fn reference_time(&self) -> f64 {
        unix_time::from_timestamp(self.packet.reference_timestamp)
    }

    /// The request's transmit time as echoed by the server (T1).
    pub fn origin_time(&self) -> f64 {
        unix_time::from_timestamp(self.packet.origin_timestamp)
    }

    /// Server time when the request arrived (T2).
    pub fn receive_time(&self) -> f64 {
        unix_time::from_timestamp(self.packet.receive_timestamp)
    }

    /// Server time when the reply departed (T3).
    pub fn transmit_time(&self) -> f64 {
        unix_time::from_timestamp(self.packet.transmit_timestamp)
    }

    /// Round-trip delay to the reference clock, in seconds.
    pub fn root_delay(&self) -> f64 {
        self.packet.root_delay.to_seconds()
    }

    /// Dispersion to the reference clock, in seconds.
    pub fn root_dispersion(&self) -> f64 {
        self.packet.root_dispersion.to_seconds()
    }

    /// Clock offset `((T2 - T1) + (T3 - T4)) / 2`, where T4 is the
    /// destination time. Positive when the local clock is behind.
    pub fn offset(&self) -> f64 {
        ((self.receive_time() - self.origin_time())
            + (self.transmit_time() - self.destination_time))
            / 2.0
    }
}

impl Deref for Reply {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.packet
    }
}
