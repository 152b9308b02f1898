// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for integration tests.

// Integration test helpers are `pub` so each `tests/*.rs` file can import them
// via `mod common`, but not every file uses every helper.
#![allow(unreachable_pub, dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use ntp_clock::codec;
use ntp_clock::error::ConnectionError;
use ntp_clock::transport::{
    ConnectionState, PayloadProvider, ReadyHandler, ReceiveHandler, Transport,
};
use ntp_clock::unix_time;

/// How the mock completes a connect.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectMode {
    /// Connect succeeds immediately.
    Succeed,
    /// Connect fails immediately.
    Fail,
    /// Connect stays pending until [`MockTransport::complete_connect`].
    Manual,
}

/// What the mock sends back for each request.
#[derive(Clone, Debug)]
pub enum ReplyMode {
    /// Nothing.
    Silent,
    /// A valid server reply whose clock runs `offset` seconds ahead.
    Offset(f64),
    /// The given datagrams in order, then valid replies at `offset`.
    Script(VecDeque<Vec<u8>>, f64),
}

pub struct MockState {
    pub state: ConnectionState,
    pub connect_mode: ConnectMode,
    pub reply_mode: ReplyMode,
    pub start_calls: Vec<tokio::time::Instant>,
    pub sent: Vec<Vec<u8>>,
    pub closes: usize,
    /// Hold every send as pending, even while connected.
    pub hold_sends: bool,
    pending: Option<PayloadProvider>,
    waiters: Vec<ReadyHandler>,
    handlers: Vec<ReceiveHandler>,
}

/// In-memory [`Transport`] that records every call.
pub struct MockTransport {
    inner: Mutex<MockState>,
}

impl MockTransport {
    pub fn new(connect_mode: ConnectMode, reply_mode: ReplyMode) -> Arc<Self> {
        Arc::new(MockTransport {
            inner: Mutex::new(MockState {
                state: ConnectionState::Disconnected,
                connect_mode,
                reply_mode,
                start_calls: Vec::new(),
                sent: Vec::new(),
                closes: 0,
                hold_sends: false,
                pending: None,
                waiters: Vec::new(),
                handlers: Vec::new(),
            }),
        })
    }

    pub fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap()
    }

    pub fn start_calls(&self) -> Vec<tokio::time::Instant> {
        self.lock().start_calls.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Finish a connect started in [`ConnectMode::Manual`].
    pub fn complete_connect(&self, result: Result<(), ConnectionError>) {
        let (waiters, pending) = {
            let mut inner = self.lock();
            inner.state = if result.is_ok() {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
            let pending = if result.is_ok() {
                inner.pending.take()
            } else {
                None
            };
            (std::mem::take(&mut inner.waiters), pending)
        };
        if let Some(payload) = pending {
            self.transmit(payload());
        }
        for waiter in waiters {
            waiter(result.clone());
        }
    }

    /// Transmit the held send, if any.
    pub fn release_pending(&self) {
        let pending = self.lock().pending.take();
        if let Some(payload) = pending {
            self.transmit(payload());
        }
    }

    /// Hand `bytes` to every receive subscriber.
    pub fn deliver(&self, bytes: &[u8]) {
        let handlers = self.lock().handlers.clone();
        for handler in &handlers {
            handler(bytes);
        }
    }

    fn transmit(&self, bytes: Vec<u8>) {
        let reply = {
            let mut inner = self.lock();
            inner.sent.push(bytes.clone());
            match &mut inner.reply_mode {
                ReplyMode::Silent => None,
                ReplyMode::Offset(offset) => Some(server_reply(&bytes, *offset)),
                ReplyMode::Script(script, offset) => Some(
                    script
                        .pop_front()
                        .unwrap_or_else(|| server_reply(&bytes, *offset)),
                ),
            }
        };
        if let Some(reply) = reply {
            self.deliver(&reply);
        }
    }
}

impl Transport for MockTransport {
    fn start(&self, on_ready: ReadyHandler) {
        let mut inner = self.lock();
        inner.start_calls.push(tokio::time::Instant::now());
        let state = inner.state;
        match state {
            ConnectionState::Connected => {
                drop(inner);
                on_ready(Ok(()));
                return;
            }
            ConnectionState::Connecting => {
                inner.waiters.push(on_ready);
                return;
            }
            ConnectionState::Disconnected => {}
        }
        match inner.connect_mode {
            ConnectMode::Manual => {
                inner.state = ConnectionState::Connecting;
                inner.waiters.push(on_ready);
            }
            ConnectMode::Fail => {
                drop(inner);
                on_ready(Err(ConnectionError::ConnectFailed {
                    detail: "mock refused".into(),
                }));
            }
            ConnectMode::Succeed => {
                inner.state = ConnectionState::Connecting;
                inner.waiters.push(on_ready);
                drop(inner);
                self.complete_connect(Ok(()));
            }
        }
    }

    fn listen(&self, handler: ReceiveHandler) {
        self.lock().handlers.push(handler);
    }

    fn send(&self, payload: PayloadProvider) {
        let mut inner = self.lock();
        if inner.state == ConnectionState::Connected && !inner.hold_sends {
            drop(inner);
            self.transmit(payload());
        } else {
            inner.pending = Some(payload);
        }
    }

    fn close(&self) {
        let mut inner = self.lock();
        inner.state = ConnectionState::Disconnected;
        inner.pending = None;
        inner.waiters.clear();
        inner.closes += 1;
    }

    fn state(&self) -> ConnectionState {
        self.lock().state
    }

    fn has_pending_send(&self) -> bool {
        self.lock().pending.is_some()
    }
}

/// A server reply to `request` from a clock `offset` seconds ahead, with no
/// network delay.
pub fn server_reply(request: &[u8], offset: f64) -> Vec<u8> {
    let t1 = codec::decode_reply(request, 0.0)
        .expect("request is a full header")
        .transmit_time();
    let server_time = unix_time::to_timestamp(t1 + offset).to_bits().to_be_bytes();

    let mut reply = vec![0u8; 48];
    reply[0] = 0x24; // leap 0, version 4, server
    reply[1] = 2;
    reply[2] = 4;
    reply[3] = (-20i8) as u8;
    reply[12..16].copy_from_slice(&[192, 0, 2, 1]);
    reply[16..24].copy_from_slice(&server_time);
    reply[24..32].copy_from_slice(&request[40..48]);
    reply[32..40].copy_from_slice(&server_time);
    reply[40..48].copy_from_slice(&server_time);
    reply
}

/// Yield to the runtime until `cond` holds, up to a bounded number of times.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
