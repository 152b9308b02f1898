// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Process-level clock: periodic resync, subscribers, and the last known
//! corrected time.
//!
//! # Architecture
//!
//! An [`NtpClock`] owns one [`SyncClient`] and two tasks:
//!
//! - a periodic timer that fires immediately and then every
//!   [`auto_sync_period`](ClientConfig::auto_sync_period), enqueueing a
//!   connect and a request each time;
//! - a dispatcher that consumes sync results. On success it releases the
//!   association, fires the pending one-shot callback, then every continuous
//!   listener. On failure it re-issues the request when
//!   [`auto_retry_enabled`](ClientConfig::auto_retry_enabled) is set, and
//!   otherwise closes the client until the next trigger.
//!
//! Both tasks are aborted when the clock is dropped.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! use std::time::Duration;
//!
//! let clock = ntp_clock::NtpClock::builder()
//!     .server("time.google.com")
//!     .auto_sync_period(Duration::from_secs(600))
//!     .build()
//!     .await?;
//!
//! clock.start(Some(Box::new(|sample| {
//!     println!("synchronized, offset {:.6}s", sample.offset);
//! })));
//!
//! if let Some(now) = clock.current_time()? {
//!     println!("corrected unix time: {now:.3}");
//! }
//! # Ok(())
//! # }
//! ```

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::clock::{self, CorrectedTime};
use crate::config::ClientConfig;
use crate::error::{ConfigError, EnvironmentFault, SyncError};
use crate::sync::{SyncClient, SyncResult};
use crate::time_source::{SystemTimeSource, TimeSource};
use crate::transport::{Transport, UdpTransport};

/// Callback fired once, on the next successful sync.
pub type OneShotCallback = Box<dyn FnOnce(CorrectedTime) + Send + 'static>;

/// Callback fired on every successful sync.
pub type ContinuousCallback = Arc<dyn Fn(CorrectedTime) + Send + Sync + 'static>;

/// Builder for configuring and creating an [`NtpClock`].
pub struct NtpClockBuilder {
    server: Option<String>,
    config: ClientConfig,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl NtpClockBuilder {
    fn new() -> Self {
        NtpClockBuilder {
            server: None,
            config: ClientConfig::default(),
            time_source: None,
        }
    }

    /// Set the NTP server (hostname, hostname:port, ip or ip:port).
    pub fn server(mut self, host: impl Into<String>) -> Self {
        self.server = Some(host.into());
        self
    }

    /// Replace the whole sync policy.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the automatic resync period (default: 30 minutes).
    pub fn auto_sync_period(mut self, period: Duration) -> Self {
        self.config.auto_sync_period = period;
        self
    }

    /// Enable or disable re-issuing requests after a failure (default: enabled).
    pub fn auto_retry(mut self, enabled: bool) -> Self {
        self.config.auto_retry_enabled = enabled;
        self
    }

    /// Read local clocks from `source` instead of the operating system.
    pub fn time_source(mut self, source: impl TimeSource + 'static) -> Self {
        self.time_source = Some(Arc::new(source));
        self
    }

    /// Build the clock. Resolves the server address once.
    ///
    /// A server that resolves to nothing is not an error here; every sync
    /// attempt then fails with a connection error and is retried.
    pub async fn build(self) -> io::Result<NtpClock> {
        self.config.validate()?;
        let server = self.server.ok_or(ConfigError::NoServer)?;
        let transport = UdpTransport::resolve(&server).await;
        let time_source = self
            .time_source
            .unwrap_or_else(|| Arc::new(SystemTimeSource));
        NtpClock::with_transport(Arc::new(transport), self.config, time_source)
    }
}

/// Corrected wall-clock time kept in sync with one NTP server.
///
/// Created via [`NtpClock::builder()`] or [`NtpClock::with_transport`].
pub struct NtpClock {
    sync: SyncClient,
    time_source: Arc<dyn TimeSource>,
    shared: Arc<Mutex<Shared>>,
    dispatcher: JoinHandle<()>,
}

struct Shared {
    config: ClientConfig,
    timer: Option<JoinHandle<()>>,
    one_shot: Option<OneShotCallback>,
    continuous: Vec<ContinuousCallback>,
}

impl NtpClock {
    /// Create a builder for configuring the clock.
    pub fn builder() -> NtpClockBuilder {
        NtpClockBuilder::new()
    }

    /// Create a clock over any transport. Must be called from within a tokio
    /// runtime.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> io::Result<Self> {
        config.validate()?;
        let sync = SyncClient::spawn(transport, time_source.clone());
        let shared = Arc::new(Mutex::new(Shared {
            config,
            timer: None,
            one_shot: None,
            continuous: Vec::new(),
        }));
        let dispatcher = tokio::spawn(dispatch_results(
            sync.subscribe(),
            sync.clone(),
            shared.clone(),
        ));
        Ok(NtpClock {
            sync,
            time_source,
            shared,
            dispatcher,
        })
    }

    /// Replace the sync policy. A running timer restarts at the new period,
    /// firing immediately.
    pub fn configure(&self, config: ClientConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let mut shared = self.lock();
        shared.config = config;
        if let Some(timer) = shared.timer.take() {
            timer.abort();
            shared.timer = Some(spawn_timer(self.sync.clone(), config.auto_sync_period));
            debug!(period_s = config.auto_sync_period.as_secs_f64(), "sync timer restarted");
        }
        Ok(())
    }

    /// Current sync policy.
    pub fn config(&self) -> ClientConfig {
        self.lock().config
    }

    /// Synchronize now and keep resynchronizing periodically.
    ///
    /// `callback` replaces any pending one-shot callback. The periodic timer
    /// is created only if it is not already running.
    pub fn start(&self, callback: Option<OneShotCallback>) {
        let mut shared = self.lock();
        shared.one_shot = callback;
        self.sync_now();
        if shared.timer.is_none() {
            let period = shared.config.auto_sync_period;
            shared.timer = Some(spawn_timer(self.sync.clone(), period));
            debug!(period_s = period.as_secs_f64(), "sync timer started");
        }
    }

    /// Synchronize now, independent of the timer, and call `callback` on
    /// success.
    pub fn force_update(&self, callback: impl FnOnce(CorrectedTime) + Send + 'static) {
        self.lock().one_shot = Some(Box::new(callback));
        self.sync_now();
    }

    /// Call `callback` after every successful sync.
    pub fn listen_continuous(&self, callback: impl Fn(CorrectedTime) + Send + Sync + 'static) {
        self.lock().continuous.push(Arc::new(callback));
    }

    /// Receive every raw sync result, failures included.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncResult> {
        self.sync.subscribe()
    }

    /// The last accepted sample, if any.
    pub fn corrected_time(&self) -> Option<CorrectedTime> {
        self.sync.latest()
    }

    /// Corrected Unix time, or `None` before the first successful sync.
    ///
    /// Returning `None` also kicks off a sync attempt in the background.
    pub fn current_time(&self) -> Result<Option<f64>, EnvironmentFault> {
        match self.sync.latest() {
            Some(sample) => sample.current_time(&*self.time_source).map(Some),
            None => {
                self.sync_now();
                Ok(None)
            }
        }
    }

    /// [`current_time`](Self::current_time) as a UTC date.
    pub fn current_date_time(&self) -> Result<Option<DateTime<Utc>>, EnvironmentFault> {
        Ok(self.current_time()?.and_then(clock::to_date_time))
    }

    /// Stop the timer and close the association. Samples and subscribers are
    /// kept; [`start`](Self::start) resumes.
    pub fn close(&self) {
        if let Some(timer) = self.lock().timer.take() {
            timer.abort();
        }
        self.sync.close();
    }

    fn sync_now(&self) {
        self.sync.start();
        self.sync.send();
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }
}

impl Drop for NtpClock {
    fn drop(&mut self) {
        self.dispatcher.abort();
        if let Some(timer) = self.lock().timer.take() {
            timer.abort();
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_timer(sync: SyncClient, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!("periodic sync");
            sync.start();
            sync.send();
        }
    })
}

async fn dispatch_results(
    mut results: broadcast::Receiver<SyncResult>,
    sync: SyncClient,
    shared: Arc<Mutex<Shared>>,
) {
    loop {
        let result = match results.recv().await {
            Ok(result) => result,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "sync results lagged");
                continue;
            }
            Err(RecvError::Closed) => return,
        };
        match result {
            Ok(sample) => {
                // The association is only held for one exchange.
                sync.close();
                let (one_shot, continuous) = {
                    let mut shared = lock(&shared);
                    (shared.one_shot.take(), shared.continuous.clone())
                };
                if let Some(callback) = one_shot {
                    callback(sample);
                }
                for callback in &continuous {
                    callback(sample);
                }
            }
            Err(err) => {
                let retry = lock(&shared).config.auto_retry_enabled;
                match err {
                    SyncError::Environment(_) => {
                        warn!(error = %err, "sync failed, clocks unreadable");
                        sync.close();
                    }
                    _ if retry => {
                        debug!(error = %err, "sync failed, retrying");
                        sync.send();
                    }
                    _ => {
                        debug!(error = %err, "sync failed, idling");
                        sync.close();
                    }
                }
            }
        }
    }
}
