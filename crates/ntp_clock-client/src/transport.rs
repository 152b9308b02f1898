// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! One UDP association with the time server.
//!
//! [`Transport`] is the capability set the sync worker drives; [`UdpTransport`]
//! is the tokio implementation. The transport never retries on its own: a
//! failed connect is reported once through the ready handler, and a receive
//! or send error on an established association only flips the state back to
//! [`ConnectionState::Disconnected`].
//!
//! While not connected, at most one send is held. A later send replaces it,
//! and it goes out exactly once when the association becomes ready.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ConnectionError;
use crate::protocol;

/// Receive buffer size; larger than any reply this client expects.
const RECV_BUFFER_SIZE: usize = 1024;

/// Completion for [`Transport::start`]: `Ok` once ready, `Err` on a definitive failure.
pub type ReadyHandler = Box<dyn FnOnce(Result<(), ConnectionError>) + Send + 'static>;

/// Subscriber for inbound datagrams.
pub type ReceiveHandler = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Produces the datagram to transmit, invoked at the moment it is sent.
pub type PayloadProvider = Box<dyn FnOnce() -> Vec<u8> + Send + 'static>;

/// Connectivity of a [`Transport`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ConnectionState {
    /// No association.
    #[default]
    Disconnected,
    /// A connect is in flight.
    Connecting,
    /// Ready to send and receive.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// A datagram association with a single server.
pub trait Transport: Send + Sync + 'static {
    /// Begin connecting.
    ///
    /// `on_ready` is invoked exactly once: immediately with `Ok` when already
    /// connected, otherwise at the end of the current or new connect attempt.
    /// Handlers still queued when [`close`](Self::close) runs are dropped
    /// without being invoked.
    fn start(&self, on_ready: ReadyHandler);

    /// Register a receive subscriber. Every subscriber sees every datagram.
    fn listen(&self, handler: ReceiveHandler);

    /// Transmit the datagram produced by `payload`, or hold it as the single
    /// pending send until connected.
    fn send(&self, payload: PayloadProvider);

    /// Cancel the association and drop any pending send.
    fn close(&self);

    /// Current connectivity.
    fn state(&self) -> ConnectionState;

    /// Whether a send is held for the next connect.
    fn has_pending_send(&self) -> bool;

    /// Whether the association is ready.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// [`Transport`] over a tokio [`UdpSocket`].
///
/// Addresses are resolved once at construction; connecting always targets the
/// first one. Must be started from within a tokio runtime.
#[derive(Clone)]
pub struct UdpTransport {
    host: Arc<str>,
    addresses: Arc<[SocketAddr]>,
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    socket: Option<Arc<UdpSocket>>,
    pending: Option<PayloadProvider>,
    waiters: Vec<ReadyHandler>,
    handlers: Vec<ReceiveHandler>,
    // Bumped by close(); tasks from an older session leave state alone.
    session: u64,
    connect_task: Option<JoinHandle<()>>,
    recv_task: Option<JoinHandle<()>>,
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpTransport")
            .field("host", &self.host)
            .field("addresses", &self.addresses)
            .field("state", &self.state())
            .finish()
    }
}

impl UdpTransport {
    /// Resolve `host` and build a transport for it.
    ///
    /// Port 123 is used unless `host` names one. A failed lookup is not an
    /// error: the transport is built with no addresses and every
    /// [`start`](Transport::start) fails with
    /// [`ConnectionError::NoAddresses`].
    pub async fn resolve(host: &str) -> Self {
        let target = with_default_port(host);
        let addresses: Vec<SocketAddr> = match tokio::net::lookup_host(target.as_str()).await {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                warn!(host, error = %e, "server lookup failed");
                Vec::new()
            }
        };
        if addresses.is_empty() {
            warn!(host, "server resolved to no addresses");
        } else {
            debug!(host, addresses = ?addresses, "server resolved");
        }
        Self::with_addresses(host, addresses)
    }

    /// Build a transport for already resolved addresses.
    pub fn with_addresses(
        host: impl Into<String>,
        addresses: impl IntoIterator<Item = SocketAddr>,
    ) -> Self {
        let host: String = host.into();
        UdpTransport {
            host: Arc::from(host),
            addresses: addresses.into_iter().collect(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// The host this transport was built for.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolved addresses, in lookup order.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }
}

impl Transport for UdpTransport {
    fn start(&self, on_ready: ReadyHandler) {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            ConnectionState::Connected => {
                drop(inner);
                on_ready(Ok(()));
            }
            ConnectionState::Connecting => inner.waiters.push(on_ready),
            ConnectionState::Disconnected => {
                let Some(&peer) = self.addresses.first() else {
                    drop(inner);
                    debug!(host = %self.host, "no address to connect to");
                    on_ready(Err(ConnectionError::NoAddresses {
                        host: self.host.to_string(),
                    }));
                    return;
                };
                inner.state = ConnectionState::Connecting;
                inner.waiters.push(on_ready);
                let session = inner.session;
                debug!(peer = %peer, "connecting");
                let task = tokio::spawn(connect(self.inner.clone(), peer, session));
                inner.connect_task = Some(task);
            }
        }
    }

    fn listen(&self, handler: ReceiveHandler) {
        self.lock().handlers.push(handler);
    }

    fn send(&self, payload: PayloadProvider) {
        let mut inner = self.lock();
        let socket = match inner.state {
            ConnectionState::Connected => inner.socket.clone(),
            _ => None,
        };
        match socket {
            Some(socket) => {
                let session = inner.session;
                drop(inner);
                let bytes = payload();
                tokio::spawn(transmit(self.inner.clone(), socket, bytes, session));
            }
            None => {
                if inner.pending.replace(payload).is_some() {
                    debug!("replacing pending send");
                }
            }
        }
    }

    fn close(&self) {
        let mut inner = self.lock();
        inner.session += 1;
        inner.state = ConnectionState::Disconnected;
        inner.socket = None;
        inner.pending = None;
        inner.waiters.clear();
        if let Some(task) = inner.connect_task.take() {
            task.abort();
        }
        if let Some(task) = inner.recv_task.take() {
            task.abort();
        }
        debug!(host = %self.host, "association closed");
    }

    fn state(&self) -> ConnectionState {
        self.lock().state
    }

    fn has_pending_send(&self) -> bool {
        self.lock().pending.is_some()
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Append the NTP port unless `host` carries one.
fn with_default_port(host: &str) -> String {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return SocketAddr::new(ip, protocol::PORT).to_string();
    }
    match host.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => host.to_string(),
        _ => format!("{host}:{}", protocol::PORT),
    }
}

/// Wildcard local address of the same family as `target`.
fn bind_addr_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

async fn open_socket(peer: SocketAddr) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(bind_addr_for(&peer)).await?;
    socket.connect(peer).await?;
    Ok(socket)
}

async fn connect(inner: Arc<Mutex<Inner>>, peer: SocketAddr, session: u64) {
    let result = open_socket(peer).await;

    let (waiters, outcome) = {
        let mut guard = lock(&inner);
        if guard.session != session {
            return;
        }
        guard.connect_task = None;
        let waiters = std::mem::take(&mut guard.waiters);
        let outcome = match result {
            Ok(socket) => {
                let socket = Arc::new(socket);
                guard.state = ConnectionState::Connected;
                guard.socket = Some(socket.clone());
                guard.recv_task = Some(tokio::spawn(receive_loop(
                    inner.clone(),
                    socket.clone(),
                    session,
                )));
                Ok((socket, guard.pending.take()))
            }
            Err(e) => {
                guard.state = ConnectionState::Disconnected;
                Err(e)
            }
        };
        (waiters, outcome)
    };

    match outcome {
        Ok((socket, pending)) => {
            debug!(peer = %peer, "connected");
            if let Some(payload) = pending {
                transmit(inner.clone(), socket, payload(), session).await;
            }
            for waiter in waiters {
                waiter(Ok(()));
            }
        }
        Err(e) => {
            warn!(peer = %peer, error = %e, "connect failed");
            let err = ConnectionError::ConnectFailed {
                detail: format!("{peer}: {e}"),
            };
            for waiter in waiters {
                waiter(Err(err.clone()));
            }
        }
    }
}

async fn transmit(
    inner: Arc<Mutex<Inner>>,
    socket: Arc<UdpSocket>,
    bytes: Vec<u8>,
    session: u64,
) {
    match socket.send(&bytes).await {
        Ok(len) => debug!(len, "datagram sent"),
        Err(e) => {
            warn!(error = %e, "send failed");
            mark_disconnected(&inner, session);
        }
    }
}

async fn receive_loop(inner: Arc<Mutex<Inner>>, socket: Arc<UdpSocket>, session: u64) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    loop {
        match socket.recv(&mut buf).await {
            Ok(len) => {
                let handlers = {
                    let guard = lock(&inner);
                    if guard.session != session {
                        return;
                    }
                    guard.handlers.clone()
                };
                debug!(len, subscribers = handlers.len(), "datagram received");
                for handler in &handlers {
                    handler(&buf[..len]);
                }
            }
            Err(e) => {
                warn!(error = %e, "receive failed");
                mark_disconnected(&inner, session);
                return;
            }
        }
    }
}

fn mark_disconnected(inner: &Mutex<Inner>, session: u64) {
    let mut guard = lock(inner);
    if guard.session != session || guard.state != ConnectionState::Connected {
        return;
    }
    guard.session += 1;
    guard.state = ConnectionState::Disconnected;
    guard.socket = None;
    // When the receive task is the caller it is already returning.
    if let Some(task) = guard.recv_task.take() {
        task.abort();
    }
}
