//! Relay new Reddit posts from polled feeds into chat channels.
//!
//! Three long-running tasks cooperate through bounded channels:
//!
//! - the [`relay::PollController`] polls every source on a timer and queues
//!   items above the watermark
//! - the [`delivery::Printer`] drains the queue into the transport at a
//!   fixed pace
//! - the [`transport::Supervisor`] reconnects the transport after errors and
//!   probes its liveness
//!
//! [`Relay`] wires them together from a [`Config`].

pub mod config;
pub mod delivery;
pub mod feed;
pub mod relay;
pub mod transport;
pub mod util;

pub use config::{Config, ConfigError};

use delivery::{outbound_queue, Printer};
use feed::FeedSource;
use relay::{Cancelled, MessageFormat, PollController};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use transport::{LivenessPolicy, LivenessProbe, Supervisor, Transport, TransportError};

/// What a relay run accomplished before shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Messages handed to the transport.
    pub delivered: usize,
}

/// A configured relay, ready to run.
pub struct Relay<F> {
    config: Config,
    fetcher: F,
    transport: Arc<dyn Transport>,
    errors: mpsc::Receiver<TransportError>,
    liveness: LivenessProbe,
}

impl<F: FeedSource> Relay<F> {
    /// `errors` and `liveness` must be the receiving halves of the channels
    /// the transport was built with.
    pub fn new(
        config: Config,
        fetcher: F,
        transport: Arc<dyn Transport>,
        errors: mpsc::Receiver<TransportError>,
        liveness: LivenessProbe,
    ) -> Self {
        Self {
            config,
            fetcher,
            transport,
            errors,
            liveness,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Connects and joins, seeds the watermark (retrying until it succeeds),
    /// then polls. On cancellation the poller stops first, queued messages are still
    /// delivered, and the transport is disconnected last.
    ///
    /// Returns `Err(Cancelled)` if shutdown was requested before the first
    /// run succeeded.
    pub async fn run(self, cancel: CancellationToken) -> Result<RelaySummary, Cancelled> {
        let Relay {
            config,
            fetcher,
            transport,
            errors,
            liveness,
        } = self;

        let (outbound, queue) = outbound_queue(config.queue_capacity);
        let mut poller = PollController::new(
            fetcher,
            config.sources.clone(),
            MessageFormat::from_config(&config),
            outbound,
        );

        // The transport outlives the poller so the queue can drain.
        let transport_cancel = CancellationToken::new();
        let mut supervisor = Supervisor::new(
            transport.clone(),
            config.channels.clone(),
            errors,
            config.reconnect_cooldown(),
        );
        if let Some(interval) = config.liveness_interval() {
            let policy = LivenessPolicy {
                interval,
                reconnect_on_failure: config.liveness_reconnect,
            };
            supervisor = supervisor.with_liveness(policy, liveness);
        }

        tracing::info!(server = %config.server, nick = %config.nick, "Connecting transport");
        transport.connect().await;
        transport.join(&config.channels).await;
        let supervisor_task = tokio::spawn(supervisor.run(transport_cancel.clone()));

        if let Err(cancelled) = poller
            .seed_until_ready(config.first_run_retry(), &cancel)
            .await
        {
            transport_cancel.cancel();
            if let Err(e) = supervisor_task.await {
                tracing::warn!(error = %e, "Supervisor task failed");
            }
            return Err(cancelled);
        }

        let printer = Printer::new(transport, config.channels.clone(), config.send_delay());
        let printer_task = tokio::spawn(printer.run(queue));

        poller
            .run(config.poll_interval(), config.align_interval(), cancel)
            .await;

        let delivered = printer_task.await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Printer task failed");
            0
        });

        transport_cancel.cancel();
        if let Err(e) = supervisor_task.await {
            tracing::warn!(error = %e, "Supervisor task failed");
        }

        Ok(RelaySummary { delivered })
    }
}
