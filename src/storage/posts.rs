use chrono::Utc;

use super::schema::Database;
use super::types::{is_unique_violation, CreatePostOutcome, DatabaseError, NewPost, Post, PostWithFeed};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post. A URL that is already stored yields
    /// [`CreatePostOutcome::DuplicateUrl`] and leaves the existing row untouched.
    pub async fn create_post(&self, post: &NewPost) -> Result<CreatePostOutcome, DatabaseError> {
        let now = Utc::now().timestamp();
        let result: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
                INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                RETURNING id
            "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok((id,)) => Ok(CreatePostOutcome::Created(id)),
            Err(e) if is_unique_violation(&e) => Ok(CreatePostOutcome::DuplicateUrl),
            Err(e) => Err(DatabaseError::Other(e)),
        }
    }

    /// Newest posts across every feed `user_id` follows.
    ///
    /// Posts without a publication date sort after dated ones.
    pub async fn posts_for_user(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<PostWithFeed>, DatabaseError> {
        let posts = sqlx::query_as::<_, PostWithFeed>(
            r#"
                SELECT p.id, p.title, p.url, p.description, p.published_at,
                       f.name AS feed_name
                FROM posts p
                JOIN feed_follows ff ON ff.feed_id = p.feed_id
                JOIN feeds f ON f.id = p.feed_id
                WHERE ff.user_id = ?
                ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC, p.id DESC
                LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Every stored post of one feed, in insertion order
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
                SELECT id, feed_id, title, url, description, published_at, created_at
                FROM posts
                WHERE feed_id = ?
                ORDER BY id
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}
