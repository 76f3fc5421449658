use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, FeedFollow};

impl Database {
    // ========================================================================
    // Feed Follow Operations
    // ========================================================================

    /// Subscribe `user_id` to `feed_id`.
    ///
    /// Each call gets a fresh follow id. Following the same feed twice is
    /// reported as [`DatabaseError::AlreadyExists`].
    pub async fn create_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> Result<FeedFollow, DatabaseError> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let (follow_id,): (i64,) = sqlx::query_as(
            r#"
                INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::on_conflict(e, "feed follow", &feed_id.to_string()))?;

        let follow = sqlx::query_as::<_, FeedFollow>(
            r#"
                SELECT ff.id, ff.user_id, ff.feed_id, ff.created_at,
                       u.name AS user_name, f.name AS feed_name, f.url AS feed_url
                FROM feed_follows ff
                JOIN users u ON u.id = ff.user_id
                JOIN feeds f ON f.id = ff.feed_id
                WHERE ff.id = ?
            "#,
        )
        .bind(follow_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(follow)
    }

    /// Unsubscribe `user_id` from the feed at `feed_url`.
    ///
    /// Returns `false` when there was no such follow.
    pub async fn delete_feed_follow(
        &self,
        user_id: i64,
        feed_url: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
                DELETE FROM feed_follows
                WHERE user_id = ?
                  AND feed_id = (SELECT id FROM feeds WHERE url = ?)
            "#,
        )
        .bind(user_id)
        .bind(feed_url)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Feeds `user_id` follows, in the order they were followed
    pub async fn feed_follows_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<FeedFollow>, DatabaseError> {
        let follows = sqlx::query_as::<_, FeedFollow>(
            r#"
                SELECT ff.id, ff.user_id, ff.feed_id, ff.created_at,
                       u.name AS user_name, f.name AS feed_name, f.url AS feed_url
                FROM feed_follows ff
                JOIN users u ON u.id = ff.user_id
                JOIN feeds f ON f.id = ff.feed_id
                WHERE ff.user_id = ?
                ORDER BY ff.created_at, ff.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(follows)
    }
}
