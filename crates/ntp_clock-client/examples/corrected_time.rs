// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

// Synchronize once, then print the corrected time next to the local wall
// clock every few seconds. Try changing the system clock while it runs.
//
// Run with:
//   RUST_LOG=ntp_clock=debug cargo run -p ntp_clock-client --example corrected_time -- time.google.com

use std::time::Duration;

use ntp_clock::{NtpClock, SystemTimeSource};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let server = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "time.google.com".to_string());

    let clock = NtpClock::builder()
        .server(server.as_str())
        .auto_sync_period(Duration::from_secs(300))
        .build()
        .await?;

    clock.listen_continuous(|sample| {
        info!(offset_s = sample.offset, "resynchronized");
    });

    let (tx, rx) = oneshot::channel();
    clock.start(Some(Box::new(move |sample| {
        let _ = tx.send(sample);
    })));

    let sample = match tokio::time::timeout(Duration::from_secs(10), rx).await {
        Ok(Ok(sample)) => sample,
        _ => {
            warn!(server = %server, "no reply within 10 seconds");
            return Ok(());
        }
    };
    info!(server = %server, offset_s = sample.offset, "first sample");

    let local = SystemTimeSource;
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    for _ in 0..12 {
        ticker.tick().await;
        let corrected = sample.format(&local)?;
        let wall = chrono::Utc::now().format(ntp_clock::clock::DISPLAY_FORMAT);
        println!("corrected {corrected}  local {wall}");
    }

    clock.close();
    Ok(())
}
