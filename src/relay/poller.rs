use super::message::MessageFormat;
use super::watermark::{decode_key, Watermark};
use crate::delivery::{QueueClosed, QueueSender};
use crate::feed::{FeedSource, FetchError, Item};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Why a poll cycle (or first run) did not complete.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetching {feed}: {error}")]
    Fetch {
        feed: String,
        #[source]
        error: FetchError,
    },
    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),
}

/// Startup was cancelled before a baseline was established.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cancelled before the first run succeeded")]
pub struct Cancelled;

/// Counters from one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items returned by all sources.
    pub fetched: usize,
    /// Items carrying a decodable link id.
    pub eligible: usize,
    /// Eligible items skipped because another source already surfaced them.
    pub duplicates: usize,
    /// Messages queued for delivery.
    pub emitted: usize,
    /// Watermark after the cycle.
    pub watermark: Option<u64>,
}

/// Owns the watermark and turns poll ticks into outbound messages.
///
/// All mutation goes through `&mut self`; the only thing shared with other
/// tasks is the outbound queue.
pub struct PollController<F> {
    fetcher: F,
    sources: Vec<String>,
    watermark: Watermark,
    format: MessageFormat,
    outbound: QueueSender,
}

impl<F: FeedSource> PollController<F> {
    pub fn new(
        fetcher: F,
        sources: Vec<String>,
        format: MessageFormat,
        outbound: QueueSender,
    ) -> Self {
        Self {
            fetcher,
            sources,
            watermark: Watermark::new(),
            format,
            outbound,
        }
    }

    pub fn watermark(&self) -> Option<u64> {
        self.watermark.highest()
    }

    /// Fetch every source in order. The first failure aborts the batch.
    async fn fetch_all(&self) -> Result<Vec<Vec<Item>>, CycleError> {
        let mut batches = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let items = self
                .fetcher
                .fetch(source)
                .await
                .map_err(|error| CycleError::Fetch {
                    feed: source.clone(),
                    error,
                })?;
            batches.push(items);
        }
        Ok(batches)
    }

    /// Establish the baseline: record the highest key currently visible
    /// across all sources without announcing anything.
    ///
    /// On failure the watermark is left untouched.
    pub async fn first_run(&mut self) -> Result<Option<u64>, CycleError> {
        let batches = self.fetch_all().await?;

        let max = batches
            .iter()
            .flatten()
            .filter_map(|item| decode_key(&item.id).map(|(key, _)| key))
            .max();

        self.watermark.seed(max);
        tracing::info!(watermark = ?max, sources = self.sources.len(), "First run succeeded");
        Ok(max)
    }

    /// Repeat [`first_run`](Self::first_run) until it succeeds, waiting
    /// `retry` between attempts.
    ///
    /// Relaying without a baseline would announce every item currently in
    /// the feeds, so there is no attempt limit.
    pub async fn seed_until_ready(
        &mut self,
        retry: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, Cancelled> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled),
                result = self.first_run() => match result {
                    Ok(max) => return Ok(max),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            retry_secs = retry.as_secs(),
                            "First run failed, retrying after cooldown"
                        );
                    }
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep(retry) => {
                    tracing::info!("Retrying first run");
                }
            }
        }
    }

    /// Run one poll cycle.
    ///
    /// Every source is fetched before anything is processed; one failed
    /// fetch aborts the cycle with no messages and no watermark change.
    /// Otherwise items are processed in source order then feed order, each
    /// key at most once per cycle, and anything above the previous watermark
    /// is queued. The watermark then becomes the cycle's maximum key, which
    /// can be lower than before when newer posts disappeared from the feeds.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let batches = self.fetch_all().await?;

        let previous = self.watermark;
        let mut seen = HashSet::new();
        let mut cycle_max: Option<u64> = None;
        let mut report = CycleReport::default();

        for item in batches.iter().flatten() {
            report.fetched += 1;

            let Some((key, suffix)) = decode_key(&item.id) else {
                tracing::trace!(id = %item.id, "Skipping item without link id");
                continue;
            };
            report.eligible += 1;

            if !seen.insert(key) {
                report.duplicates += 1;
                continue;
            }
            cycle_max = cycle_max.max(Some(key));

            if previous.is_new(key) {
                self.outbound.push(self.format.format(item, suffix)).await?;
                report.emitted += 1;
            }
        }

        self.watermark.replace(cycle_max);
        report.watermark = self.watermark.highest();
        Ok(report)
    }

    /// Poll on a timer until cancelled.
    ///
    /// The first cycle runs after [`first_tick_delay`]; later cycles are
    /// strictly periodic. Failed cycles are logged and retried on the next
    /// tick. Returning drops the queue sender so the printer can drain.
    pub async fn run(
        mut self,
        poll_interval: Duration,
        align: Option<Duration>,
        cancel: CancellationToken,
    ) {
        let delay = first_tick_delay(Utc::now(), poll_interval, align);
        tracing::info!(
            first_in_secs = delay.as_secs(),
            interval_secs = poll_interval.as_secs(),
            "Polling scheduled"
        );

        let mut ticker = interval_at(Instant::now() + delay, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.run_cycle() => match result {
                    Ok(report) if report.emitted > 0 => {
                        tracing::info!(
                            emitted = report.emitted,
                            duplicates = report.duplicates,
                            watermark = ?report.watermark,
                            "Poll cycle queued new items"
                        );
                    }
                    Ok(report) => {
                        tracing::debug!(
                            fetched = report.fetched,
                            watermark = ?report.watermark,
                            "Poll cycle found nothing new"
                        );
                    }
                    Err(CycleError::QueueClosed(_)) => {
                        tracing::warn!("Outbound queue closed, stopping poller");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Poll cycle aborted");
                    }
                },
            }
        }

        tracing::info!("Poller stopped");
    }
}

/// Delay until the first poll.
///
/// Without alignment this is one poll interval. With alignment it is the
/// time to the next multiple of `align` since the unix epoch; landing exactly
/// on a boundary waits a full `align`.
pub fn first_tick_delay(
    now: DateTime<Utc>,
    poll_interval: Duration,
    align: Option<Duration>,
) -> Duration {
    let Some(align) = align.filter(|a| a.as_millis() > 0) else {
        return poll_interval;
    };
    let align_ms = i64::try_from(align.as_millis()).unwrap_or(i64::MAX);
    let into_period = now.timestamp_millis().rem_euclid(align_ms);
    Duration::from_millis((align_ms - into_period) as u64)
}
