//! Types and constants of the NTP packet header.
//!
//! Provides `ReadBytes` and `WriteBytes` implementations which extend the byteorder crate
//! `WriteBytesExt` and `ReadBytesExt` traits with the ability to read and write types from the NTP
//! protocol respectively.
//!
//! Field documentation is largely derived from IETF RFC 5905.

/// NTP port number.
pub const PORT: u16 = 123;

/// Poll exponent advertised in client requests (16 s).
pub const REQUEST_POLL: i8 = 4;

/// Precision exponent advertised in client requests (about 15 ms).
pub const REQUEST_PRECISION: i8 = -6;

/// Maximum stratum number.
pub const MAXSTRAT: u8 = 16;

mod io;
mod traits;
mod types;

pub use self::traits::*;
pub use self::types::*;
