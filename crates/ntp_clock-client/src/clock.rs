// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Corrected time from one accepted offset sample.
//!
//! A sample pairs the measured offset with the boot time read when the
//! request went out. Later, the corrected time is
//!
//! ```text
//! wall_now + (anchor_boottime - boot_now) + offset
//! ```
//!
//! If the wall clock is stepped after the sample, `wall_now` and `boot_now`
//! move together and the result is unchanged.

use chrono::{DateTime, Utc};

use crate::error::EnvironmentFault;
use crate::time_source::TimeSource;

/// Format used by [`CorrectedTime::format`].
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One accepted synchronization sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrectedTime {
    /// Server minus local clock, in seconds.
    pub offset: f64,
    /// Boot time read when the request was sent, in Unix seconds.
    pub anchor_boottime: f64,
}

impl CorrectedTime {
    /// Create a sample.
    pub fn new(offset: f64, anchor_boottime: f64) -> Self {
        CorrectedTime {
            offset,
            anchor_boottime,
        }
    }

    /// Corrected time in Unix seconds, reading both clocks from `source`.
    pub fn current_time(&self, source: &dyn TimeSource) -> Result<f64, EnvironmentFault> {
        let wall_now = source.wall_clock_now()?;
        let boot_now = source.boot_time()?;
        Ok(self.current_time_at(wall_now, boot_now))
    }

    /// Corrected time for explicit clock readings.
    pub fn current_time_at(&self, wall_now: f64, boot_now: f64) -> f64 {
        wall_now + ((self.anchor_boottime - boot_now) + self.offset)
    }

    /// Corrected time as a UTC date.
    ///
    /// Returns `None` when the value lies outside chrono's range.
    pub fn date_time(
        &self,
        source: &dyn TimeSource,
    ) -> Result<Option<DateTime<Utc>>, EnvironmentFault> {
        Ok(to_date_time(self.current_time(source)?))
    }

    /// Corrected time rendered as `YYYY-MM-DD HH:MM:SS` (UTC).
    pub fn format(&self, source: &dyn TimeSource) -> Result<String, EnvironmentFault> {
        Ok(self
            .date_time(source)?
            .map(|dt| dt.format(DISPLAY_FORMAT).to_string())
            .unwrap_or_default())
    }
}

/// Convert Unix seconds to a UTC date.
pub(crate) fn to_date_time(unix_seconds: f64) -> Option<DateTime<Utc>> {
    let secs = unix_seconds.floor();
    let nanos = ((unix_seconds - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::ManualTimeSource;

    #[test]
    fn one_second_apart() {
        let src = ManualTimeSource::new(1_700_000_000.0, 1_699_990_000.0);
        let sample = CorrectedTime::new(0.0, 1_699_990_000.0);
        let a = sample.current_time(&src).unwrap();
        src.advance(1.0);
        let b = sample.current_time(&src).unwrap();
        assert_eq!(b - a, 1.0);
    }

    #[test]
    fn offset_is_applied() {
        let sample = CorrectedTime::new(2.5, 100.0);
        assert_eq!(sample.current_time_at(1_000.0, 100.0), 1_002.5);
    }

    #[test]
    fn wall_clock_step_is_cancelled() {
        let src = ManualTimeSource::new(5_000.0, 1_000.0);
        let sample = CorrectedTime::new(-3.0, 1_000.0);
        let before = sample.current_time(&src).unwrap();
        src.step_wall_clock(86_400.0);
        let after = sample.current_time(&src).unwrap();
        assert_eq!(before, after);
        assert_eq!(after, 4_997.0);
    }

    #[test]
    fn boot_fault_propagates() {
        let src = ManualTimeSource::new(0.0, 0.0);
        src.set_boot_fault(Some("gone"));
        assert!(CorrectedTime::new(0.0, 0.0).current_time(&src).is_err());
    }

    #[test]
    fn formatted() {
        let src = ManualTimeSource::new(1_700_000_000.0, 0.0);
        let sample = CorrectedTime::new(0.75, 0.0);
        assert_eq!(sample.format(&src).unwrap(), "2023-11-14 22:13:20");
        let dt = sample.date_time(&src).unwrap().unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_millis(), 750);
    }
}
