// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Local clock readings.
//!
//! Corrected time is built from two local clocks:
//!
//! - the **wall clock**, which the user or the OS may change at any moment;
//! - the **boot time**, the wall-clock instant the device booted, derived as
//!   `wall clock - uptime` where uptime comes from a monotonic counter that
//!   keeps running while the device sleeps.
//!
//! A wall clock step moves both readings by the same amount, so their
//! difference is stable. [`CorrectedTime`](crate::clock::CorrectedTime) relies
//! on that.
//!
//! # Platform Support
//!
//! - **Linux / Android**: `clock_gettime(CLOCK_BOOTTIME)`.
//! - **macOS / iOS and other Unix**: `clock_gettime(CLOCK_MONOTONIC)`.
//! - **Other platforms**: a `std::time::Instant` anchored at first use. This
//!   does not survive a restart of the process and may not count suspend.

#![allow(unsafe_code)]

use std::sync::{Mutex, PoisonError};

use crate::error::{ClockKind, EnvironmentFault};
use crate::unix_time;

/// A source of the two local clock readings, in seconds.
pub trait TimeSource: Send + Sync {
    /// Wall clock as seconds since the Unix epoch.
    fn wall_clock_now(&self) -> Result<f64, EnvironmentFault>;

    /// Wall-clock instant of the last boot, in seconds since the Unix epoch.
    fn boot_time(&self) -> Result<f64, EnvironmentFault>;
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn wall_clock_now(&self) -> Result<f64, EnvironmentFault> {
        (**self).wall_clock_now()
    }

    fn boot_time(&self) -> Result<f64, EnvironmentFault> {
        (**self).boot_time()
    }
}

/// The operating system clocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn wall_clock_now(&self) -> Result<f64, EnvironmentFault> {
        Ok(unix_time::now_seconds())
    }

    fn boot_time(&self) -> Result<f64, EnvironmentFault> {
        let uptime = platform::uptime()?;
        Ok(unix_time::now_seconds() - uptime)
    }
}

#[cfg(unix)]
mod platform {
    use super::*;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    const UPTIME_CLOCK: libc::clockid_t = libc::CLOCK_BOOTTIME;

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    const UPTIME_CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC;

    pub(super) fn uptime() -> Result<f64, EnvironmentFault> {
        let mut tp: libc::timespec = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::clock_gettime(UPTIME_CLOCK, &mut tp) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            return Err(EnvironmentFault::new(ClockKind::BootTime, err.to_string()));
        }
        #[allow(clippy::unnecessary_cast)] // tv_sec/tv_nsec types differ across platforms
        Ok(tp.tv_sec as f64 + tp.tv_nsec as f64 / 1e9)
    }
}

#[cfg(not(unix))]
mod platform {
    use super::*;
    use std::sync::OnceLock;
    use std::time::Instant;

    static ANCHOR: OnceLock<Instant> = OnceLock::new();

    pub(super) fn uptime() -> Result<f64, EnvironmentFault> {
        Ok(ANCHOR.get_or_init(Instant::now).elapsed().as_secs_f64())
    }
}

/// Settable clocks for tests and simulations.
///
/// [`advance`](Self::advance) lets time pass (wall clock moves, boot time
/// stays put). [`step_wall_clock`](Self::step_wall_clock) changes the wall
/// clock the way a user would (both readings move).
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    state: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    wall: f64,
    boot: f64,
    boot_fault: Option<String>,
}

impl ManualTimeSource {
    /// Create a source reading `wall` and `boot`.
    pub fn new(wall: f64, boot: f64) -> Self {
        ManualTimeSource {
            state: Mutex::new(ManualState {
                wall,
                boot,
                boot_fault: None,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ManualState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Set the wall clock reading.
    pub fn set_wall_clock(&self, wall: f64) {
        self.with_state(|s| s.wall = wall);
    }

    /// Set the boot time reading.
    pub fn set_boot_time(&self, boot: f64) {
        self.with_state(|s| s.boot = boot);
    }

    /// Let `seconds` of real time pass.
    pub fn advance(&self, seconds: f64) {
        self.with_state(|s| s.wall += seconds);
    }

    /// Step the wall clock by `seconds` without real time passing.
    pub fn step_wall_clock(&self, seconds: f64) {
        self.with_state(|s| {
            s.wall += seconds;
            s.boot += seconds;
        });
    }

    /// Make [`boot_time`](TimeSource::boot_time) fail with `detail`, or
    /// succeed again with `None`.
    pub fn set_boot_fault(&self, detail: Option<&str>) {
        self.with_state(|s| s.boot_fault = detail.map(str::to_owned));
    }
}

impl TimeSource for ManualTimeSource {
    fn wall_clock_now(&self) -> Result<f64, EnvironmentFault> {
        Ok(self.with_state(|s| s.wall))
    }

    fn boot_time(&self) -> Result<f64, EnvironmentFault> {
        self.with_state(|s| match &s.boot_fault {
            Some(detail) => Err(EnvironmentFault::new(ClockKind::BootTime, detail.clone())),
            None => Ok(s.boot),
        })
    }
}
