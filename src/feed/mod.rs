//! The ingestion pipeline: fetching RSS feeds and storing their items as posts.
//!
//! - [`time`] - Publish-date parsing across the layouts feeds actually use
//! - [`parser`] - RSS 2.0 decoding with `quick-xml`
//! - [`fetcher`] - HTTP retrieval behind the [`Transport`] seam
//! - [`ingest`] - Item validation and idempotent post creation
//! - [`scrape`] - Scrape cycles and the aggregator loop
//!
//! Persistence goes through the [`FeedStore`] trait, implemented by
//! [`crate::storage::Database`].
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::{build_client, scrape_next_feed, FetchOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = build_client()?;
//! let report = scrape_next_feed(&db, &client, &FetchOptions::default(), &CancellationToken::new()).await?;
//! ```

pub mod fetcher;
pub mod ingest;
pub mod parser;
pub mod scrape;
mod store;
pub mod time;

pub use fetcher::{
    build_client, fetch_feed, FetchError, FetchOptions, Transport, TransportError,
    TransportResponse,
};
pub use ingest::{ingest_item, ingest_items, IngestError, IngestOutcome, IngestReport};
pub use parser::{parse_feed, FetchedFeed, ParseError, RawFeedItem};
pub use scrape::{run_aggregator, scrape_next_feed, AggregatorSummary, ScrapeError, ScrapeReport};
pub use store::FeedStore;
pub use time::{parse_rss_time, RssDateFormat, TimeParseError};
