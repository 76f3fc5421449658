use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedWithOwner};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed owned by `user_id`. Feed URLs are globally unique.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, DatabaseError> {
        let now = Utc::now().timestamp();
        sqlx::query_as::<_, Feed>(&format!(
            r#"
                INSERT INTO feeds (name, url, user_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                RETURNING {FEED_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::on_conflict(e, "feed", url))
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Every feed with the name of the user who added it, oldest first
    pub async fn list_feeds_with_owners(&self) -> Result<Vec<FeedWithOwner>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
                SELECT f.id, f.name, f.url, f.created_at, u.name AS user_name
                FROM feeds f
                JOIN users u ON u.id = f.user_id
                ORDER BY f.created_at, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// The feed most in need of a scrape.
    ///
    /// Never-fetched feeds come first, then the stalest `last_fetched_at`.
    /// Ties break on id so the choice is deterministic.
    pub async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
                SELECT {FEED_COLUMNS}
                FROM feeds
                ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
                LIMIT 1
            "#
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Record a scrape of `feed_id` at `fetched_at`
    pub async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let ts = fetched_at.timestamp();
        sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(ts)
            .bind(ts)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
