// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Every time value handled by this crate is a plain `f64` count of seconds
//! since 00:00:00 UTC, 1 January 1970. NTP timestamps count from 1900, so
//! conversions shift by [`EPOCH_DELTA`]. Era rollover (2036) is not handled:
//! the 32-bit seconds field is taken to lie in era 0.

use crate::protocol::TimestampFormat;
use std::time;

/// The number of seconds from 1st January 1900 UTC to the start of the Unix epoch.
pub const EPOCH_DELTA: i64 = 2_208_988_800;

// One unit of the 32-bit fraction field is 1/2^32 s.
const FRACTION_SCALE: f64 = 4_294_967_296.0;

/// Convert Unix seconds to an NTP timestamp.
///
/// The integer and fractional parts are split before shifting epochs so the
/// fraction keeps full `f64` precision.
///
/// ```
/// use ntp_clock_proto::unix_time;
///
/// let ts = unix_time::to_timestamp(0.5);
/// assert_eq!(ts.seconds, 2_208_988_800);
/// assert_eq!(ts.fraction, 0x8000_0000);
/// ```
pub fn to_timestamp(unix_seconds: f64) -> TimestampFormat {
    let whole = unix_seconds.floor();
    let fract = unix_seconds - whole;
    TimestampFormat {
        seconds: (whole as i64).wrapping_add(EPOCH_DELTA) as u32,
        fraction: (fract * FRACTION_SCALE) as u32,
    }
}

/// Convert an NTP timestamp to Unix seconds.
///
/// An all-zero timestamp maps to `-2208988800.0`.
pub fn from_timestamp(ts: TimestampFormat) -> f64 {
    (ts.seconds as i64 - EPOCH_DELTA) as f64 + ts.fraction as f64 / FRACTION_SCALE
}

/// The system wall clock as Unix seconds.
///
/// Instants before 1970 come back negative.
pub fn now_seconds() -> f64 {
    match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}
