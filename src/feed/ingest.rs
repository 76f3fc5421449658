//! Turning raw feed items into stored posts.
//!
//! Every item is handled on its own: a bad or unstorable item is counted and
//! logged, and the rest of the batch still goes through. Re-ingesting an item
//! whose link is already stored is a no-op reported as
//! [`IngestOutcome::Duplicate`].

use thiserror::Error;

use crate::feed::parser::RawFeedItem;
use crate::feed::store::FeedStore;
use crate::feed::time::parse_rss_time;
use crate::storage::{CreatePostOutcome, DatabaseError, NewPost};

#[derive(Debug, Error)]
pub enum IngestError {
    /// Item lacks a title or link; nothing was stored
    #[error("Invalid item: {0}")]
    InvalidItem(String),
    /// The store rejected the insert for a reason other than a duplicate URL
    #[error("Failed to store post: {0}")]
    Persistence(#[from] DatabaseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Created(i64),
    /// A post with this URL already exists
    Duplicate,
}

/// Per-batch tallies from [`ingest_items`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub created: usize,
    pub duplicate: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.created + self.duplicate + self.invalid + self.failed
    }

    fn record(&mut self, result: &Result<IngestOutcome, IngestError>) {
        match result {
            Ok(IngestOutcome::Created(_)) => self.created += 1,
            Ok(IngestOutcome::Duplicate) => self.duplicate += 1,
            Err(IngestError::InvalidItem(_)) => self.invalid += 1,
            Err(IngestError::Persistence(_)) => self.failed += 1,
        }
    }
}

/// Validate one item and store it as a post of `feed_id`.
///
/// Title and link must be non-empty after trimming. An empty or unparseable
/// `pubDate` stores the post without a publish time; an empty description is
/// stored as absent.
pub async fn ingest_item<S: FeedStore>(
    store: &S,
    feed_id: i64,
    item: &RawFeedItem,
) -> Result<IngestOutcome, IngestError> {
    let post = new_post(feed_id, item)?;

    match store.create_post(&post).await? {
        CreatePostOutcome::Created(id) => Ok(IngestOutcome::Created(id)),
        CreatePostOutcome::DuplicateUrl => Ok(IngestOutcome::Duplicate),
    }
}

fn new_post(feed_id: i64, item: &RawFeedItem) -> Result<NewPost, IngestError> {
    let title = item.title.trim();
    let url = item.link.trim();
    if title.is_empty() {
        return Err(IngestError::InvalidItem(format!("missing title (link {url:?})")));
    }
    if url.is_empty() {
        return Err(IngestError::InvalidItem(format!("missing link (title {title:?})")));
    }

    let published_at = match parse_rss_time(&item.pub_date) {
        Ok(instant) => Some(instant.timestamp()),
        Err(e) => {
            if !item.pub_date.trim().is_empty() {
                tracing::debug!(url = %url, error = %e, "Storing post without publish time");
            }
            None
        }
    };

    let description = item.description.trim();

    Ok(NewPost {
        feed_id,
        title: title.to_string(),
        url: url.to_string(),
        description: (!description.is_empty()).then(|| description.to_string()),
        published_at,
    })
}

/// Ingest a batch in order. Failures are logged and counted, never returned.
pub async fn ingest_items<S: FeedStore>(
    store: &S,
    feed_id: i64,
    items: &[RawFeedItem],
) -> IngestReport {
    let mut report = IngestReport::default();

    for item in items {
        let result = ingest_item(store, feed_id, item).await;
        match &result {
            Err(IngestError::InvalidItem(reason)) => {
                tracing::warn!(feed_id, reason = %reason, "Skipping invalid item");
            }
            Err(e @ IngestError::Persistence(_)) => {
                tracing::warn!(feed_id, link = %item.link, error = %e, "Failed to store post");
            }
            Ok(_) => {}
        }
        report.record(&result);
    }

    report
}
