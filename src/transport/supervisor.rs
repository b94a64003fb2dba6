use super::{LivenessProbe, Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Liveness probing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    /// Length of one probe window.
    pub interval: Duration,
    /// Reconnect when a window passes without inbound traffic. When false the
    /// failure is only logged.
    pub reconnect_on_failure: bool,
}

/// Keeps the chat transport alive.
///
/// Two concerns run in one `select!` loop:
///
/// - **Error-driven reconnect**: every error from the transport leads to
///   disconnect, a fixed cooldown, then connect and rejoin. Errors that arrive during
///   the cooldown are folded into the same reconnect.
/// - **Liveness probing** (optional): once per window, if inbound traffic was
///   seen the remote end is pinged, otherwise the window is reported as a
///   liveness failure.
///
/// Nothing escapes this loop. It only returns when cancelled.
pub struct Supervisor {
    transport: Arc<dyn Transport>,
    channels: Vec<String>,
    errors: mpsc::Receiver<TransportError>,
    cooldown: Duration,
    liveness: Option<(LivenessPolicy, LivenessProbe)>,
}

impl Supervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        channels: Vec<String>,
        errors: mpsc::Receiver<TransportError>,
        cooldown: Duration,
    ) -> Self {
        Self {
            transport,
            channels,
            errors,
            cooldown,
            liveness: None,
        }
    }

    /// Enable liveness probing.
    pub fn with_liveness(mut self, policy: LivenessPolicy, probe: LivenessProbe) -> Self {
        self.liveness = Some((policy, probe));
        self
    }

    /// Supervise until `cancel` fires, then disconnect.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut probe_timer = self.liveness.as_ref().map(|(policy, _)| {
            let mut timer = interval_at(Instant::now() + policy.interval, policy.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        let mut errors_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.errors.recv(), if errors_open => match received {
                    Some(err) => {
                        tracing::warn!(error = %err, "Transport error, restarting connection");
                        if !self.restart(&cancel).await {
                            break;
                        }
                        if let Some(timer) = probe_timer.as_mut() {
                            timer.reset();
                        }
                    }
                    None => {
                        errors_open = false;
                        tracing::warn!("Transport error stream closed, error-driven reconnect disabled");
                    }
                },
                _ = next_tick(&mut probe_timer) => {
                    if !self.probe(&cancel).await {
                        break;
                    }
                    if let Some(timer) = probe_timer.as_mut() {
                        timer.reset();
                    }
                }
            }
        }

        self.transport.disconnect().await;
        tracing::info!("Transport supervisor stopped");
    }

    /// Disconnect, wait out the cooldown, reconnect and rejoin. Returns false
    /// when cancelled during the cooldown.
    async fn restart(&mut self, cancel: &CancellationToken) -> bool {
        self.transport.disconnect().await;

        tracing::info!(cooldown_secs = self.cooldown.as_secs(), "Waiting before reconnect");
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(self.cooldown) => {}
        }

        let mut folded = 0usize;
        while let Ok(err) = self.errors.try_recv() {
            tracing::debug!(error = %err, "Transport error folded into pending reconnect");
            folded += 1;
        }

        tracing::info!(folded = folded, "Reconnecting transport");
        self.transport.connect().await;
        self.transport.join(&self.channels).await;
        true
    }

    /// Run one liveness check. Returns false when cancelled mid-reconnect.
    async fn probe(&mut self, cancel: &CancellationToken) -> bool {
        let Some((policy, probe)) = self.liveness.as_mut() else {
            return true;
        };
        let strict = policy.reconnect_on_failure;

        if probe.take() {
            tracing::trace!("Inbound traffic seen, sending liveness probe");
            self.transport.ping().await;
            return true;
        }

        tracing::warn!(
            reconnect = strict,
            "No inbound traffic since last liveness probe"
        );
        if strict {
            return self.restart(cancel).await;
        }
        true
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
