use chrono::{DateTime, Utc};

use crate::storage::{CreatePostOutcome, Database, DatabaseError, Feed, NewPost};

/// Persistence operations the scrape pipeline depends on.
///
/// [`Database`] is the real implementation. Keeping the pipeline generic over
/// this trait lets tests inject stores that fail on demand.
#[allow(async_fn_in_trait)]
pub trait FeedStore {
    /// The feed most in need of a scrape, or `None` when there are no feeds.
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError>;

    async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Insert a post; an existing URL is reported as
    /// [`CreatePostOutcome::DuplicateUrl`], not as an error.
    async fn create_post(&self, post: &NewPost) -> Result<CreatePostOutcome, DatabaseError>;
}

impl FeedStore for Database {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError> {
        Database::next_feed_to_fetch(self).await
    }

    async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        Database::mark_feed_fetched(self, feed_id, fetched_at).await
    }

    async fn create_post(&self, post: &NewPost) -> Result<CreatePostOutcome, DatabaseError> {
        Database::create_post(self, post).await
    }
}
