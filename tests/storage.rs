//! Integration tests for the storage layer: users, feeds, follows and posts
//! composed the way the commands use them.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use gator::storage::{CreatePostOutcome, Database, DatabaseError, NewPost};
use pretty_assertions::assert_eq;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn post(feed_id: i64, url: &str, published_at: Option<i64>) -> NewPost {
    NewPost {
        feed_id,
        title: url.rsplit('/').next().unwrap_or(url).to_string(),
        url: url.to_string(),
        description: None,
        published_at,
    }
}

#[tokio::test]
async fn test_user_names_are_unique() {
    let db = test_db().await;
    db.create_user("alice").await.unwrap();
    assert!(matches!(
        db.create_user("alice").await,
        Err(DatabaseError::AlreadyExists { .. })
    ));
    assert_eq!(db.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reset_cascades_to_posts() {
    let db = test_db().await;
    let alice = db.create_user("alice").await.unwrap();
    let feed = db
        .create_feed("Blog", "https://example.com/rss", alice.id)
        .await
        .unwrap();
    db.create_feed_follow(alice.id, feed.id).await.unwrap();
    db.create_post(&post(feed.id, "https://example.com/a", Some(1)))
        .await
        .unwrap();

    db.delete_all_users().await.unwrap();

    assert!(db.get_posts_for_feed(feed.id).await.unwrap().is_empty());
    assert!(db.next_feed_to_fetch().await.unwrap().is_none());

    // Same names and URLs are free again
    let alice = db.create_user("alice").await.unwrap();
    db.create_feed("Blog", "https://example.com/rss", alice.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_browse_merges_followed_feeds() {
    let db = test_db().await;
    let alice = db.create_user("alice").await.unwrap();
    let bob = db.create_user("bob").await.unwrap();
    let a = db
        .create_feed("A", "https://a.example/rss", alice.id)
        .await
        .unwrap();
    let b = db
        .create_feed("B", "https://b.example/rss", bob.id)
        .await
        .unwrap();
    let c = db
        .create_feed("C", "https://c.example/rss", bob.id)
        .await
        .unwrap();

    db.create_feed_follow(alice.id, a.id).await.unwrap();
    db.create_feed_follow(alice.id, b.id).await.unwrap();

    db.create_post(&post(a.id, "https://a.example/1", Some(100)))
        .await
        .unwrap();
    db.create_post(&post(b.id, "https://b.example/1", Some(300)))
        .await
        .unwrap();
    db.create_post(&post(c.id, "https://c.example/1", Some(500)))
        .await
        .unwrap();
    db.create_post(&post(a.id, "https://a.example/2", Some(200)))
        .await
        .unwrap();

    let posts = db.posts_for_user(alice.id, 10).await.unwrap();
    let seen: Vec<(&str, &str)> = posts
        .iter()
        .map(|p| (p.feed_name.as_str(), p.url.as_str()))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("B", "https://b.example/1"),
            ("A", "https://a.example/2"),
            ("A", "https://a.example/1"),
        ]
    );

    // Unfollowing hides the feed's posts without deleting them
    assert!(db
        .delete_feed_follow(alice.id, "https://b.example/rss")
        .await
        .unwrap());
    assert_eq!(db.posts_for_user(alice.id, 10).await.unwrap().len(), 2);
    assert_eq!(db.get_posts_for_feed(b.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_post_urls_are_unique_across_feeds() {
    let db = test_db().await;
    let alice = db.create_user("alice").await.unwrap();
    let a = db
        .create_feed("A", "https://a.example/rss", alice.id)
        .await
        .unwrap();
    let b = db
        .create_feed("B", "https://b.example/rss", alice.id)
        .await
        .unwrap();

    let shared = "https://shared.example/post";
    assert!(matches!(
        db.create_post(&post(a.id, shared, None)).await.unwrap(),
        CreatePostOutcome::Created(_)
    ));
    assert_eq!(
        db.create_post(&post(b.id, shared, None)).await.unwrap(),
        CreatePostOutcome::DuplicateUrl
    );
    assert!(db.get_posts_for_feed(b.id).await.unwrap().is_empty());
}
