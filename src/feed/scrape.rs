//! Scrape cycles: pick the stalest feed, fetch it, store its items.
//!
//! A cycle moves through selecting, fetching, ingesting and marking the feed
//! fetched. A failed fetch ends the cycle early and leaves the feed's
//! `last_fetched_at` alone, so the same feed is retried next cycle. Item-level
//! failures never end a cycle.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::feed::fetcher::{fetch_feed, FetchError, FetchOptions, Transport};
use crate::feed::ingest::{ingest_items, IngestReport};
use crate::feed::store::FeedStore;
use crate::storage::DatabaseError;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Selecting the next feed or recording the fetch failed
    #[error("Feed store error: {0}")]
    Store(#[from] DatabaseError),
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    pub feed_id: i64,
    pub feed_name: String,
    pub url: String,
    /// Items present in the fetched document
    pub items: usize,
    pub ingest: IngestReport,
    pub fetched_at: DateTime<Utc>,
}

/// Run one scrape cycle against the feed most in need of it.
///
/// Returns `Ok(None)` when there are no feeds at all.
pub async fn scrape_next_feed<S: FeedStore, T: Transport>(
    store: &S,
    transport: &T,
    options: &FetchOptions,
    cancel: &CancellationToken,
) -> Result<Option<ScrapeReport>, ScrapeError> {
    let Some(feed) = store.next_feed_to_fetch().await? else {
        tracing::debug!("No feeds to scrape");
        return Ok(None);
    };

    tracing::debug!(feed_id = feed.id, url = %feed.url, "Fetching feed");
    let fetched = fetch_feed(transport, &feed.url, options, cancel)
        .await
        .map_err(|source| ScrapeError::Fetch {
            url: feed.url.clone(),
            source,
        })?;

    tracing::debug!(feed_id = feed.id, items = fetched.items.len(), "Ingesting items");
    let ingest = ingest_items(store, feed.id, &fetched.items).await;

    let fetched_at = Utc::now();
    store.mark_feed_fetched(feed.id, fetched_at).await?;

    tracing::info!(
        feed_id = feed.id,
        feed = %feed.name,
        items = fetched.items.len(),
        created = ingest.created,
        duplicate = ingest.duplicate,
        invalid = ingest.invalid,
        failed = ingest.failed,
        "Feed collected"
    );

    Ok(Some(ScrapeReport {
        feed_id: feed.id,
        feed_name: feed.name,
        url: feed.url,
        items: fetched.items.len(),
        ingest,
        fetched_at,
    }))
}

/// Totals for an aggregator run, returned once it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorSummary {
    pub cycles: u64,
    pub failed: u64,
}

/// Run scrape cycles every `interval` until `shutdown` fires.
///
/// The first cycle starts immediately. Cycles never overlap: a cycle that
/// outlasts the interval delays the next tick rather than bunching ticks up.
/// Failed cycles are logged and the loop carries on. Firing `shutdown` also
/// aborts an in-flight fetch.
pub async fn run_aggregator<S, T, F>(
    store: &S,
    transport: &T,
    options: &FetchOptions,
    interval: Duration,
    shutdown: CancellationToken,
    mut on_report: F,
) -> AggregatorSummary
where
    S: FeedStore,
    T: Transport,
    F: FnMut(&ScrapeReport),
{
    // tokio::time::interval panics on a zero period
    let period = interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut summary = AggregatorSummary::default();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        summary.cycles += 1;
        match scrape_next_feed(store, transport, options, &shutdown).await {
            Ok(Some(report)) => on_report(&report),
            Ok(None) => tracing::info!("No feeds to collect"),
            Err(ScrapeError::Fetch {
                source: FetchError::Cancelled,
                ..
            }) => break,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(error = %e, "Scrape cycle failed");
            }
        }
    }

    tracing::info!(
        cycles = summary.cycles,
        failed = summary.failed,
        "Aggregator stopped"
    );
    summary
}
