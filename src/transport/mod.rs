//! Chat transport seam and its supervision.
//!
//! The relay never speaks a chat protocol itself. It drives a [`Transport`]
//! and learns about failures and inbound traffic through two side channels:
//!
//! - an error stream: implementations call [`ErrorSink::report`] instead of
//!   returning errors, and the [`Supervisor`] reconnects
//! - a single-slot liveness signal: implementations call
//!   [`LivenessNotifier::notify`] on any inbound message, and the supervisor's
//!   probe drains it once per window
//!
//! Protocol-independent session duties (nick rotation, ping replies) live in
//! [`session`]. [`ConsoleTransport`] is the implementation shipped with the
//! binary: it prints relayed lines to stdout.

mod console;
pub mod session;
mod supervisor;

pub use console::ConsoleTransport;
pub use session::{next_nick, Identity, Reply, ServerEvent, Session};
pub use supervisor::{LivenessPolicy, Supervisor};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffered transport errors. A burst beyond this is collapsed anyway since
/// one reconnect handles all of them.
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// Failures reported asynchronously by a transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("connection lost: {0}")]
    Disconnected(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A chat connection the relay can drive.
///
/// None of the methods return errors. Failures go to the [`ErrorSink`] the
/// implementation was built with so that a single supervisor owns recovery.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self);
    async fn disconnect(&self);
    /// Join `channels`. Called after every `connect`.
    async fn join(&self, channels: &[String]);
    /// Send `message` to every channel in `channels`.
    async fn send_bulk(&self, channels: &[String], message: &str);
    /// Send a liveness probe to the remote end.
    async fn ping(&self);
}

/// Sending half of the transport error stream.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    tx: mpsc::Sender<TransportError>,
}

impl ErrorSink {
    /// Report an error without waiting. When the buffer is full a reconnect
    /// is already pending, so the error is only logged.
    pub fn report(&self, err: TransportError) {
        if let Err(e) = self.tx.try_send(err) {
            tracing::debug!(error = %e, "Transport error not queued");
        }
    }
}

/// Create the transport error stream.
pub fn error_channel() -> (ErrorSink, mpsc::Receiver<TransportError>) {
    let (tx, rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
    (ErrorSink { tx }, rx)
}

/// Records that inbound traffic was seen. Cheap to clone into callbacks.
#[derive(Debug, Clone)]
pub struct LivenessNotifier {
    tx: mpsc::Sender<()>,
}

impl LivenessNotifier {
    /// Set the evidence slot. Setting an already-full slot is a no-op.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Draining side of the liveness slot, owned by the supervisor.
#[derive(Debug)]
pub struct LivenessProbe {
    rx: mpsc::Receiver<()>,
}

impl LivenessProbe {
    /// Consume the evidence. Returns whether any was recorded since the last call.
    pub fn take(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

/// Create the single-slot liveness signal.
pub fn liveness_channel() -> (LivenessNotifier, LivenessProbe) {
    let (tx, rx) = mpsc::channel(1);
    (LivenessNotifier { tx }, LivenessProbe { rx })
}
