//! The relay core: watermark tracking, poll cycles and message rendering.
//!
//! # Architecture
//!
//! - [`watermark`] - item id decoding and the "highest seen" threshold
//! - [`message`] - rendering an item into one chat line
//! - [`poller`] - first run, poll cycles and the poll timer
//!
//! A [`PollController`] owns the [`Watermark`] outright. Each cycle fetches
//! every source, deduplicates within the cycle, queues items above the
//! previous watermark and finally replaces the watermark with the cycle's
//! maximum key.

mod message;
mod poller;
mod watermark;

pub use message::MessageFormat;
pub use poller::{first_tick_delay, Cancelled, CycleError, CycleReport, PollController};
pub use watermark::{decode_key, Watermark, LINK_PREFIX};
