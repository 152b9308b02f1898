// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Synchronization policy.

use std::time::Duration;

use crate::error::ConfigError;

/// Default period between automatic synchronizations (30 minutes).
pub const DEFAULT_AUTO_SYNC_PERIOD: Duration = Duration::from_secs(1800);

/// How often to resynchronize and whether failed attempts are retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    /// Period of the automatic sync timer. Must be positive.
    pub auto_sync_period: Duration,
    /// Re-issue a request after a failed attempt.
    pub auto_retry_enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            auto_sync_period: DEFAULT_AUTO_SYNC_PERIOD,
            auto_retry_enabled: true,
        }
    }
}

impl ClientConfig {
    /// Create a validated configuration.
    pub fn new(auto_sync_period: Duration, auto_retry_enabled: bool) -> Result<Self, ConfigError> {
        let config = ClientConfig {
            auto_sync_period,
            auto_retry_enabled,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auto_sync_period.is_zero() {
            return Err(ConfigError::ZeroSyncPeriod);
        }
        Ok(())
    }
}
