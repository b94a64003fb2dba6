//! Feed retrieval: HTTP fetching and RSS/Atom parsing.
//!
//! - [`parser`] - turns a feed document into ordered [`Item`]s using `feed-rs`
//! - [`fetcher`] - one GET per source with a configured user agent; the
//!   [`FeedSource`] trait is the seam the poll controller depends on
//!
//! # Example
//!
//! ```ignore
//! use feedrelay::feed::{FeedSource, HttpFetcher};
//!
//! let fetcher = HttpFetcher::from_config(reqwest::Client::new(), &config);
//! let items = fetcher.fetch("/r/rust/new").await?;
//! ```

mod fetcher;
mod parser;

pub use fetcher::{FeedSource, FetchError, HttpFetcher};
pub use parser::{parse_feed, Item};
