// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Synchronization worker: connect, send, receive, retry.
//!
//! A [`SyncClient`] is a cheap handle to a single tokio task that owns all
//! synchronization state. Handle methods only enqueue commands, and every
//! transport callback (connect completion, inbound datagram) is re-dispatched
//! onto the same queue before it touches state, so there is never more than
//! one writer.
//!
//! # Retry
//!
//! A failed connect closes the transport and schedules another
//! [`start`](SyncClient::start) after `n * 2 + 1` seconds, where `n` is the
//! number of consecutive failures before this one (1 s, 3 s, 5 s, ...). There
//! is no ceiling. A successful connect resets the count.
//!
//! [`close`](SyncClient::close) advances an epoch counter; retries and connect
//! completions scheduled under an older epoch are discarded when they fire.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! use std::sync::Arc;
//! use ntp_clock::sync::SyncClient;
//! use ntp_clock::time_source::SystemTimeSource;
//! use ntp_clock::transport::UdpTransport;
//!
//! let transport = UdpTransport::resolve("time.google.com").await;
//! let client = SyncClient::spawn(Arc::new(transport), Arc::new(SystemTimeSource));
//! let mut results = client.subscribe();
//! client.start();
//! client.send();
//! if let Ok(Ok(sample)) = results.recv().await {
//!     println!("offset: {:.6}s", sample.offset);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

use crate::clock::CorrectedTime;
use crate::codec;
use crate::error::{ConnectionError, EnvironmentFault, SyncError};
use crate::time_source::TimeSource;
use crate::transport::{ConnectionState, Transport};

/// Outcome of one synchronization attempt.
pub type SyncResult = Result<CorrectedTime, SyncError>;

/// Capacity of the result broadcast channel.
const RESULT_CHANNEL_CAPACITY: usize = 16;

/// Consecutive connect failures and the backoff they imply.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RetryState {
    /// Connect failures since the last successful connect.
    pub consecutive_failures: u32,
}

impl RetryState {
    /// Record a failure and return how long to wait before the next attempt.
    pub fn record_failure(&mut self) -> Duration {
        let delay = Duration::from_secs(u64::from(self.consecutive_failures) * 2 + 1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        delay
    }

    /// Forget past failures.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

enum Command {
    Start,
    Send,
    Close,
    Connected {
        epoch: u64,
        result: Result<(), ConnectionError>,
    },
    Retry {
        epoch: u64,
    },
    Received {
        bytes: Vec<u8>,
        destination: Result<f64, EnvironmentFault>,
    },
}

/// Handle to the synchronization worker.
///
/// Clones share the same worker. The worker stops, closing its transport,
/// once every handle has been dropped.
#[derive(Clone, Debug)]
pub struct SyncClient {
    commands: mpsc::UnboundedSender<Command>,
    results: broadcast::Sender<SyncResult>,
    latest: watch::Receiver<Option<CorrectedTime>>,
}

impl SyncClient {
    /// Spawn the worker for `transport`.
    ///
    /// Registers a receive subscriber on the transport. Must be called from
    /// within a tokio runtime.
    pub fn spawn(transport: Arc<dyn Transport>, time_source: Arc<dyn TimeSource>) -> Self {
        let (commands, queue) = mpsc::unbounded_channel();
        let (results, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);
        let (latest_tx, latest) = watch::channel(None);

        let weak = commands.downgrade();
        let source = time_source.clone();
        transport.listen(Arc::new(move |bytes: &[u8]| {
            let destination = source.wall_clock_now();
            if let Some(commands) = weak.upgrade() {
                let _ = commands.send(Command::Received {
                    bytes: bytes.to_vec(),
                    destination,
                });
            }
        }));

        let worker = Worker {
            transport,
            time_source,
            commands: commands.downgrade(),
            results: results.clone(),
            latest: latest_tx,
            pending_send_requested: false,
            last_anchor_boottime: None,
            retry: RetryState::default(),
            epoch: 0,
        };
        tokio::spawn(worker.run(queue));

        SyncClient {
            commands,
            results,
            latest,
        }
    }

    /// Connect unless already connecting or connected.
    pub fn start(&self) {
        self.command(Command::Start);
    }

    /// Send a request now, or as soon as the next connect succeeds.
    pub fn send(&self) {
        self.command(Command::Send);
    }

    /// Cancel the association and any scheduled retry.
    pub fn close(&self) {
        self.command(Command::Close);
    }

    /// Receive every future result.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncResult> {
        self.results.subscribe()
    }

    /// The most recently accepted sample.
    pub fn latest(&self) -> Option<CorrectedTime> {
        *self.latest.borrow()
    }

    /// Watch accepted samples.
    pub fn watch(&self) -> watch::Receiver<Option<CorrectedTime>> {
        self.latest.clone()
    }

    fn command(&self, command: Command) {
        // The worker only stops once every handle is gone.
        let _ = self.commands.send(command);
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    time_source: Arc<dyn TimeSource>,
    commands: mpsc::WeakUnboundedSender<Command>,
    results: broadcast::Sender<SyncResult>,
    latest: watch::Sender<Option<CorrectedTime>>,
    pending_send_requested: bool,
    last_anchor_boottime: Option<f64>,
    retry: RetryState,
    epoch: u64,
}

impl Worker {
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = queue.recv().await {
            match command {
                Command::Start => self.start(),
                Command::Send => self.send(),
                Command::Close => self.close(),
                Command::Connected { epoch, result } => {
                    if epoch == self.epoch {
                        self.on_connected(result);
                    } else {
                        debug!(epoch, current = self.epoch, "stale connect completion");
                    }
                }
                Command::Retry { epoch } => {
                    if epoch == self.epoch {
                        self.start();
                    } else {
                        debug!(epoch, current = self.epoch, "stale retry");
                    }
                }
                Command::Received { bytes, destination } => self.on_receive(&bytes, destination),
            }
        }
        debug!("sync worker stopping");
        self.transport.close();
    }

    fn start(&mut self) {
        if self.transport.state() != ConnectionState::Disconnected {
            return;
        }
        let commands = self.commands.clone();
        let epoch = self.epoch;
        self.transport.start(Box::new(move |result| {
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::Connected { epoch, result });
            }
        }));
    }

    fn on_connected(&mut self, result: Result<(), ConnectionError>) {
        match result {
            Ok(()) => {
                self.retry.reset();
                if self.pending_send_requested {
                    self.pending_send_requested = false;
                    self.send();
                }
            }
            Err(err) => {
                self.transport.close();
                let delay = self.retry.record_failure();
                warn!(
                    error = %err,
                    failures = self.retry.consecutive_failures,
                    retry_in_s = delay.as_secs(),
                    "connect failed"
                );
                self.publish(Err(SyncError::Connection(err)));
                self.schedule_retry(delay);
            }
        }
    }

    fn schedule_retry(&self, delay: Duration) {
        let commands = self.commands.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::Retry { epoch });
            }
        });
    }

    fn send(&mut self) {
        if !self.transport.is_connected() {
            self.pending_send_requested = true;
            return;
        }
        let readings = self
            .time_source
            .boot_time()
            .and_then(|boot| Ok((boot, self.time_source.wall_clock_now()?)));
        let (boot, wall) = match readings {
            Ok(readings) => readings,
            Err(fault) => {
                warn!(error = %fault, "cannot stamp request");
                self.publish(Err(SyncError::Environment(fault)));
                return;
            }
        };
        self.last_anchor_boottime = Some(boot);
        debug!(wall, "sending request");
        // The transport may hold the request; stamp T1 when it goes out.
        let source = self.time_source.clone();
        self.transport.send(Box::new(move || {
            let transmit = source.wall_clock_now().unwrap_or(wall);
            codec::encode_request(Some(transmit)).to_vec()
        }));
    }

    fn on_receive(&mut self, bytes: &[u8], destination: Result<f64, EnvironmentFault>) {
        let result = destination
            .map_err(SyncError::from)
            .and_then(|destination| Ok(codec::decode_reply(bytes, destination)?))
            .and_then(|reply| {
                let anchor = match self.last_anchor_boottime {
                    Some(anchor) => anchor,
                    None => self.time_source.boot_time()?,
                };
                debug!(
                    stratum = reply.stratum.0,
                    source = %reply.clock_source,
                    offset = reply.offset(),
                    root_delay = reply.root_delay(),
                    "reply received"
                );
                Ok(CorrectedTime::new(reply.offset(), anchor))
            });
        match &result {
            Ok(sample) => {
                self.latest.send_replace(Some(*sample));
            }
            Err(err) => warn!(error = %err, "reply rejected"),
        }
        self.publish(result);
    }

    fn close(&mut self) {
        self.epoch += 1;
        self.pending_send_requested = false;
        self.transport.close();
        debug!(epoch = self.epoch, "sync client closed");
    }

    fn publish(&self, result: SyncResult) {
        // No subscribers is fine.
        let _ = self.results.send(result);
    }
}
