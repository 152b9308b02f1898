// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/*!
Corrected wall-clock time from a single NTP server.

The device wall clock can be wrong, and it can be changed at any moment by the
user or the OS. This crate measures the offset to an NTP server once and then
anchors it to the boot-time counter, so the corrected time stays right even
after the wall clock is stepped.

# Example

```rust,no_run
# async fn example() -> std::io::Result<()> {
let clock = ntp_clock::NtpClock::builder()
    .server("time.google.com")
    .build()
    .await?;

let (tx, rx) = tokio::sync::oneshot::channel();
clock.start(Some(Box::new(move |sample| {
    let _ = tx.send(sample);
})));
let sample = rx.await.expect("clock dropped");
println!("offset: {:.6} seconds", sample.offset);

let now = clock.current_date_time()?.expect("synchronized");
println!("{}", now.format("%Y-%m-%d %H:%M:%S"));
# Ok(())
# }
```

# Feature Flags

| Feature | Default | Description |
|---------|---------|-------------|
| `tokio` | yes | UDP transport, sync worker and [`NtpClock`] on the tokio runtime. |

Without `tokio` only the clock model, time sources, configuration and error
types are built.
*/

#![warn(missing_docs)]

// Re-export protocol types from ntp_clock_proto for convenience.
pub use ntp_clock_proto::{codec, protocol, unix_time};

/// Error types for synchronization, connection, clock and configuration failures.
pub mod error;

/// Local wall-clock and boot-time readings.
pub mod time_source;

/// Corrected time from one offset sample anchored to boot time.
pub mod clock;

/// Resync period and retry policy.
pub mod config;

/// UDP association with the time server.
#[cfg(feature = "tokio")]
pub mod transport;

/// Serialized synchronization worker with connect backoff.
#[cfg(feature = "tokio")]
pub mod sync;

/// Periodic resync, subscribers, and the last known corrected time.
#[cfg(feature = "tokio")]
pub mod facade;

pub use clock::CorrectedTime;
pub use config::ClientConfig;
pub use error::SyncError;
#[cfg(feature = "tokio")]
pub use facade::{NtpClock, NtpClockBuilder};
pub use time_source::{ManualTimeSource, SystemTimeSource, TimeSource};
