// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Custom error types for the corrected-time client.
//!
//! Failures of a synchronization attempt are published as [`SyncError`]
//! values on the result channel instead of being returned to a caller, so
//! every error type here is `Clone`. Constructors that run synchronously
//! (builders, configuration) return `io::Result`, and [`SyncError`] converts
//! into [`io::Error`] for them.
//!
//! The wrapped error can be recovered with a downcast:
//!
//! ```
//! use ntp_clock::error::{ConfigError, SyncError};
//!
//! let err: std::io::Error = SyncError::Config(ConfigError::ZeroSyncPeriod).into();
//! let inner = err.get_ref().and_then(|e| e.downcast_ref::<SyncError>());
//! assert!(matches!(inner, Some(SyncError::Config(ConfigError::ZeroSyncPeriod))));
//! ```

pub use ntp_clock_proto::error::ParseError;

use std::fmt;
use std::io;

/// Errors produced while synchronizing with the server.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncError {
    /// The reply could not be decoded.
    Decode(ParseError),
    /// The association could not be established or was lost.
    Connection(ConnectionError),
    /// A local clock could not be read.
    Environment(EnvironmentFault),
    /// Invalid configuration.
    Config(ConfigError),
}

/// Connection failures reported by the transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConnectionError {
    /// The server host resolved to no socket addresses.
    NoAddresses {
        /// The host that failed to resolve.
        host: String,
    },
    /// Binding or connecting the socket failed.
    ConnectFailed {
        /// Detail about the failure.
        detail: String,
    },
}

/// Which local clock could not be read.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ClockKind {
    /// The adjustable wall clock.
    WallClock,
    /// The monotonic, suspend-inclusive boot-time counter.
    BootTime,
}

/// A local clock could not be read. Not recoverable by retrying.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvironmentFault {
    /// The clock that failed.
    pub clock: ClockKind,
    /// Detail from the platform.
    pub detail: String,
}

/// Configuration errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The automatic sync period must be positive.
    ZeroSyncPeriod,
    /// No server host was given.
    NoServer,
}

impl EnvironmentFault {
    /// Create a fault for `clock` with the given detail.
    pub fn new(clock: ClockKind, detail: impl Into<String>) -> Self {
        EnvironmentFault {
            clock,
            detail: detail.into(),
        }
    }
}

// ── Display implementations ─────────────────────────────────────────

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Decode(e) => write!(f, "NTP decode error: {e}"),
            SyncError::Connection(e) => write!(f, "NTP connection error: {e}"),
            SyncError::Environment(e) => write!(f, "{e}"),
            SyncError::Config(e) => write!(f, "NTP config error: {e}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::NoAddresses { host } => {
                write!(f, "host resolved to no socket addresses: {host}")
            }
            ConnectionError::ConnectFailed { detail } => write!(f, "connect failed: {detail}"),
        }
    }
}

impl fmt::Display for ClockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockKind::WallClock => write!(f, "wall clock"),
            ClockKind::BootTime => write!(f, "boot-time counter"),
        }
    }
}

impl fmt::Display for EnvironmentFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot read {}: {}", self.clock, self.detail)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroSyncPeriod => write!(f, "auto sync period must be positive"),
            ConfigError::NoServer => write!(f, "a server host is required"),
        }
    }
}

// ── Error trait implementations ─────────────────────────────────────

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Decode(e) => Some(e),
            SyncError::Connection(e) => Some(e),
            SyncError::Environment(e) => Some(e),
            SyncError::Config(e) => Some(e),
        }
    }
}

impl std::error::Error for ConnectionError {}
impl std::error::Error for EnvironmentFault {}
impl std::error::Error for ConfigError {}

// ── From conversions ────────────────────────────────────────────────

impl From<ParseError> for SyncError {
    fn from(err: ParseError) -> SyncError {
        SyncError::Decode(err)
    }
}

impl From<ConnectionError> for SyncError {
    fn from(err: ConnectionError) -> SyncError {
        SyncError::Connection(err)
    }
}

impl From<EnvironmentFault> for SyncError {
    fn from(err: EnvironmentFault) -> SyncError {
        SyncError::Environment(err)
    }
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> SyncError {
        SyncError::Config(err)
    }
}

impl From<SyncError> for io::Error {
    fn from(err: SyncError) -> io::Error {
        let kind = match &err {
            SyncError::Decode(_) => io::ErrorKind::InvalidData,
            SyncError::Connection(ConnectionError::NoAddresses { .. }) => io::ErrorKind::NotFound,
            SyncError::Connection(_) => io::ErrorKind::ConnectionRefused,
            SyncError::Environment(_) => io::ErrorKind::Unsupported,
            SyncError::Config(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}

impl From<ConfigError> for io::Error {
    fn from(err: ConfigError) -> io::Error {
        SyncError::Config(err).into()
    }
}

impl From<EnvironmentFault> for io::Error {
    fn from(err: EnvironmentFault) -> io::Error {
        SyncError::Environment(err).into()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let e = ConnectionError::NoAddresses {
            host: "ntp.invalid".into(),
        };
        assert_eq!(
            e.to_string(),
            "host resolved to no socket addresses: ntp.invalid"
        );
    }

    #[test]
    fn test_environment_fault_display() {
        let e = EnvironmentFault::new(ClockKind::BootTime, "EINVAL");
        assert_eq!(e.to_string(), "cannot read boot-time counter: EINVAL");
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::ZeroSyncPeriod.to_string(),
            "auto sync period must be positive"
        );
    }

    #[test]
    fn test_sync_error_to_io_error_kind() {
        let cases: Vec<(SyncError, io::ErrorKind)> = vec![
            (
                SyncError::Decode(ParseError::BufferTooShort {
                    needed: 48,
                    available: 3,
                }),
                io::ErrorKind::InvalidData,
            ),
            (
                ConnectionError::NoAddresses { host: "x".into() }.into(),
                io::ErrorKind::NotFound,
            ),
            (
                ConnectionError::ConnectFailed {
                    detail: "refused".into(),
                }
                .into(),
                io::ErrorKind::ConnectionRefused,
            ),
            (
                EnvironmentFault::new(ClockKind::WallClock, "x").into(),
                io::ErrorKind::Unsupported,
            ),
            (ConfigError::NoServer.into(), io::ErrorKind::InvalidInput),
        ];
        for (err, expected_kind) in cases {
            let io_err: io::Error = err.into();
            assert_eq!(io_err.kind(), expected_kind);
        }
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err = SyncError::Decode(ParseError::BufferTooShort {
            needed: 48,
            available: 0,
        });
        let source = err.source().unwrap();
        assert!(source.downcast_ref::<ParseError>().is_some());
    }
}
