use std::fmt;

use super::ConstPackedSizeBytes;

/// **NTP Short Format** - Used in delay and dispersion header fields where the full resolution and
/// range of the other formats are not justified. It includes a 16-bit unsigned seconds field and a
/// 16-bit fraction field.
///
/// ### Layout
///
/// ```ignore
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          Seconds              |           Fraction            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ShortFormat {
    /// Seconds component (16-bit unsigned).
    pub seconds: u16,
    /// Fractional seconds component (16-bit unsigned).
    pub fraction: u16,
}

/// **NTP Timestamp Format** - A 32-bit unsigned seconds field spanning 136 years and a 32-bit
/// fraction field resolving 232 picoseconds.
///
/// The prime epoch is 0 h 1 January 1900 UTC, when all bits are zero.
///
/// ### Layout
///
/// ```ignore
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            Seconds                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            Fraction                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimestampFormat {
    /// Seconds since 1900-01-01 00:00:00 UTC (32-bit unsigned).
    pub seconds: u32,
    /// Fractional seconds (32-bit unsigned, resolution of ~232 picoseconds).
    pub fraction: u32,
}

/// A 2-bit integer warning of an impending leap second to be inserted or deleted in the last
/// minute of the current month.
///
/// Only the indicator is read; no leap second is ever scheduled from it.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum LeapIndicator {
    /// No leap required.
    #[default]
    NoWarning = 0,
    /// Last minute of the day has 61 seconds.
    AddOne = 1,
    /// Last minute of the day has 59 seconds.
    SubOne = 2,
    /// Clock unsynchronized.
    Unknown = 3,
}

impl LeapIndicator {
    /// Interpret the low two bits of `bits`.
    ///
    /// Never fails: any value that does not name a variant falls back to
    /// [`LeapIndicator::NoWarning`].
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            1 => LeapIndicator::AddOne,
            2 => LeapIndicator::SubOne,
            3 => LeapIndicator::Unknown,
            _ => LeapIndicator::NoWarning,
        }
    }
}

/// A 3-bit integer representing the NTP version number.
///
/// Note that while this struct is 8-bits, this field is packed to 3 in the actual header. Replies
/// carry whatever version the server chose, so any 3-bit value is accepted.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Version(pub(super) u8);

impl Version {
    /// NTP version 3 (RFC 1305), used for outgoing requests.
    pub const V3: Self = Version(3);
    /// NTP version 4 (RFC 5905).
    pub const V4: Self = Version(4);

    /// Create a `Version` from the low three bits of `v`.
    pub fn from_bits(v: u8) -> Self {
        Version(v & 0b111)
    }

    /// Returns the raw version number as a `u8`.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Version {
    /// Defaults to NTPv3, the version this client speaks.
    fn default() -> Self {
        Version::V3
    }
}

/// A 3-bit integer representing the association mode.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Mode {
    /// Reserved mode (value 0).
    Reserved = 0,
    /// Symmetric active mode (value 1).
    SymmetricActive = 1,
    /// Symmetric passive mode (value 2).
    SymmetricPassive = 2,
    /// Client mode (value 3).
    #[default]
    Client = 3,
    /// Server mode (value 4).
    Server = 4,
    /// Broadcast mode (value 5).
    Broadcast = 5,
    /// NTP control message mode (value 6).
    NtpControlMessage = 6,
    /// Reserved for private use (value 7).
    ReservedForPrivateUse = 7,
}

impl Mode {
    /// Interpret the low three bits of `bits`.
    ///
    /// Never fails: a value that does not name a variant falls back to
    /// [`Mode::ReservedForPrivateUse`].
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Mode::Reserved,
            1 => Mode::SymmetricActive,
            2 => Mode::SymmetricPassive,
            3 => Mode::Client,
            4 => Mode::Server,
            5 => Mode::Broadcast,
            6 => Mode::NtpControlMessage,
            _ => Mode::ReservedForPrivateUse,
        }
    }
}

/// An 8-bit integer representing the stratum.
///
/// ```ignore
/// +--------+-----------------------------------------------------+
/// | Value  | Meaning                                             |
/// +--------+-----------------------------------------------------+
/// | 0      | unspecified or invalid                              |
/// | 1      | primary server (e.g., equipped with a GPS receiver) |
/// | 2-15   | secondary server (via NTP)                          |
/// | 16     | unsynchronized                                      |
/// | 17-255 | invalid                                             |
/// +--------+-----------------------------------------------------+
/// ```
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Stratum(pub u8);

impl Stratum {
    /// Unspecified or invalid.
    pub const UNSPECIFIED: Self = Stratum(0);
    /// The primary server (e.g. equipped with a GPS receiver).
    pub const PRIMARY: Self = Stratum(1);
    /// The minimum value specifying a secondary server (via NTP).
    pub const SECONDARY_MIN: Self = Stratum(2);
    /// The maximum value specifying a secondary server (via NTP).
    pub const SECONDARY_MAX: Self = Stratum(15);
    /// An unsynchronized stratum.
    pub const UNSYNCHRONIZED: Self = Stratum(super::MAXSTRAT);

    /// Whether or not the stratum represents a secondary server.
    pub fn is_secondary(&self) -> bool {
        Self::SECONDARY_MIN <= *self && *self <= Self::SECONDARY_MAX
    }

    /// Whether or not the server declares itself unsynchronized.
    pub fn is_unsynchronized(&self) -> bool {
        *self == Self::UNSYNCHRONIZED
    }

    /// Whether or not the stratum lies beyond the defined range (17-255).
    pub fn is_invalid(&self) -> bool {
        *self > Self::UNSYNCHRONIZED
    }
}

/// A 32-bit code identifying the particular server or reference clock.
///
/// The interpretation depends on the value in the stratum field:
///
/// - Stratum 0 (unspecified): a four-character ASCII "kiss code" used for debugging and
///   monitoring.
/// - Stratum 1 (primary): a four-octet, left-justified, zero-padded ASCII string naming the
///   reference clock, e.g. `GPS` or `PPS`.
/// - Any other stratum: the reference identifier of the upstream server, usually its IPv4
///   address.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ClockSource {
    /// Stratum 0 debugging / kiss code.
    Debug(u32),
    /// Stratum 1 reference clock identifier.
    ReferenceClock(u32),
    /// Upstream server reference identifier.
    ReferenceIdentifier(u32),
}

impl ClockSource {
    /// Classify a raw identifier according to the stratum it arrived with.
    pub fn from_stratum(stratum: Stratum, id: u32) -> Self {
        if stratum == Stratum::UNSPECIFIED {
            ClockSource::Debug(id)
        } else if stratum == Stratum::PRIMARY {
            ClockSource::ReferenceClock(id)
        } else {
            ClockSource::ReferenceIdentifier(id)
        }
    }

    /// The raw 32-bit identifier.
    pub fn id(&self) -> u32 {
        match *self {
            ClockSource::Debug(id)
            | ClockSource::ReferenceClock(id)
            | ClockSource::ReferenceIdentifier(id) => id,
        }
    }

    /// The ASCII code carried by a kiss code or reference clock identifier.
    ///
    /// Trailing NUL padding is dropped and non-printable octets render as `?`.
    /// Returns `None` for upstream server identifiers, which are not text.
    pub fn code(&self) -> Option<String> {
        match *self {
            ClockSource::Debug(id) | ClockSource::ReferenceClock(id) => Some(
                id.to_be_bytes()
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
                    .collect(),
            ),
            ClockSource::ReferenceIdentifier(_) => None,
        }
    }
}

impl Default for ClockSource {
    fn default() -> Self {
        ClockSource::ReferenceIdentifier(0)
    }
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code() {
            Some(code) => f.write_str(&code),
            None => {
                let [a, b, c, d] = self.id().to_be_bytes();
                write!(f, "{}.{}.{}.{}", a, b, c, d)
            }
        }
    }
}

/// **Packet Header** - The 48-byte NTP header exchanged between client and server.
///
/// Any extension fields, key identifier or message digest following the header are ignored.
///
/// ```ignore
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |LI | VN  |Mode |    Stratum     |     Poll      |  Precision   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Root Delay                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Root Dispersion                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          Reference ID                         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                     Reference Timestamp (64)                  +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                      Origin Timestamp (64)                    +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                      Receive Timestamp (64)                   +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                      Transmit Timestamp (64)                  +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Packet {
    /// Leap indicator warning of impending leap second.
    pub leap_indicator: LeapIndicator,
    /// NTP protocol version number.
    pub version: Version,
    /// Association mode (client, server, broadcast, etc.).
    pub mode: Mode,
    /// Stratum level of the time source.
    pub stratum: Stratum,
    /// Maximum interval between successive messages, in log2 seconds.
    pub poll: i8,
    /// Precision of the system clock, in log2 seconds. For instance, a value of -18 corresponds
    /// to a precision of about one microsecond.
    pub precision: i8,
    /// Total round-trip delay to the reference clock, in NTP short format.
    pub root_delay: ShortFormat,
    /// Total dispersion to the reference clock, in NTP short format.
    pub root_dispersion: ShortFormat,
    /// Reference identifier, interpreted according to the stratum.
    pub clock_source: ClockSource,
    /// Time when the system clock was last set or corrected.
    pub reference_timestamp: TimestampFormat,
    /// Time at the client when the request departed for the server.
    pub origin_timestamp: TimestampFormat,
    /// Time at the server when the request arrived from the client.
    pub receive_timestamp: TimestampFormat,
    /// Time at the server when the response left for the client.
    pub transmit_timestamp: TimestampFormat,
}

/// The consecutive types within the first packed byte in the NTP packet.
pub type PacketByte1 = (LeapIndicator, Version, Mode);

impl ShortFormat {
    /// Value in seconds: `seconds + fraction / 2^16`.
    pub fn to_seconds(&self) -> f64 {
        self.seconds as f64 + self.fraction as f64 / 65536.0
    }

    /// Encode a non-negative number of seconds, saturating at the format's range.
    pub fn from_seconds(secs: f64) -> Self {
        let secs = secs.max(0.0);
        ShortFormat {
            seconds: secs.trunc() as u16,
            fraction: (secs.fract() * 65536.0) as u16,
        }
    }

    /// Packed 16.16 representation.
    pub fn to_bits(&self) -> u32 {
        (self.seconds as u32) << 16 | self.fraction as u32
    }

    /// Unpack a 16.16 representation.
    pub fn from_bits(raw: u32) -> Self {
        ShortFormat {
            seconds: (raw >> 16) as u16,
            fraction: (raw & 0xFFFF) as u16,
        }
    }
}

impl TimestampFormat {
    /// Packed `(seconds << 32) | fraction` representation.
    pub fn to_bits(&self) -> u64 {
        (self.seconds as u64) << 32 | self.fraction as u64
    }

    /// Unpack a 64-bit NTP timestamp.
    pub fn from_bits(raw: u64) -> Self {
        TimestampFormat {
            seconds: (raw >> 32) as u32,
            fraction: (raw & 0xFFFF_FFFF) as u32,
        }
    }

    /// Whether both halves are zero (an unset timestamp).
    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.fraction == 0
    }
}

// Size implementations.

impl ConstPackedSizeBytes for ShortFormat {
    const PACKED_SIZE_BYTES: usize = 4;
}

impl ConstPackedSizeBytes for TimestampFormat {
    const PACKED_SIZE_BYTES: usize = 8;
}

impl ConstPackedSizeBytes for Stratum {
    const PACKED_SIZE_BYTES: usize = 1;
}

impl ConstPackedSizeBytes for ClockSource {
    const PACKED_SIZE_BYTES: usize = 4;
}

impl ConstPackedSizeBytes for PacketByte1 {
    const PACKED_SIZE_BYTES: usize = 1;
}

impl ConstPackedSizeBytes for Packet {
    const PACKED_SIZE_BYTES: usize = PacketByte1::PACKED_SIZE_BYTES
        + Stratum::PACKED_SIZE_BYTES
        + 2
        + ShortFormat::PACKED_SIZE_BYTES * 2
        + ClockSource::PACKED_SIZE_BYTES
        + TimestampFormat::PACKED_SIZE_BYTES * 4;
}
