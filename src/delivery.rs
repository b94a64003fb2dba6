//! Outbound delivery: a bounded FIFO between the poll controller and the
//! transport, drained by a single paced consumer.
//!
//! Producers wait when the queue is full. Nothing is dropped: a lost entry
//! would be a post that never gets announced.

use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 100;

/// The consumer side is gone; nothing will ever be delivered.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("outbound queue closed")]
pub struct QueueClosed;

/// Producer handle. Dropping every sender closes the queue once it drains.
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<String>,
}

impl QueueSender {
    /// Enqueue a formatted message, waiting for space when the queue is full.
    pub async fn push(&self, message: String) -> Result<(), QueueClosed> {
        self.tx.send(message).await.map_err(|_| QueueClosed)
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer handle.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<String>,
}

impl OutboundQueue {
    /// Next message in FIFO order, or `None` once closed and drained.
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create a bounded outbound queue.
pub fn outbound_queue(capacity: usize) -> (QueueSender, OutboundQueue) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueSender { tx }, OutboundQueue { rx })
}

/// Single consumer that writes queued messages to every channel, pausing
/// between messages to stay under the server's flood limits.
pub struct Printer {
    transport: Arc<dyn Transport>,
    channels: Vec<String>,
    send_delay: Duration,
}

impl Printer {
    pub fn new(transport: Arc<dyn Transport>, channels: Vec<String>, send_delay: Duration) -> Self {
        Self {
            transport,
            channels,
            send_delay,
        }
    }

    /// Deliver until every sender is dropped and the queue is empty.
    ///
    /// Returns the number of messages delivered.
    pub async fn run(self, mut queue: OutboundQueue) -> usize {
        let mut delivered = 0usize;

        while let Some(message) = queue.next().await {
            self.transport.send_bulk(&self.channels, &message).await;
            delivered += 1;
            tracing::debug!(
                pending = queue.len(),
                channels = self.channels.len(),
                "Delivered message"
            );
            tokio::time::sleep(self.send_delay).await;
        }

        tracing::info!(delivered = delivered, "Outbound queue closed, printer stopped");
        delivered
    }
}
