use std::io::Write;

use super::{format_timestamp, CommandError, Context};
use crate::util::{strip_control_chars, truncate_with_ellipsis};

const DESCRIPTION_WIDTH: usize = 100;

/// Newest posts across the current user's feeds; `limit` defaults to
/// `browse_limit` from the config.
pub(super) async fn browse<W: Write>(
    ctx: &Context,
    limit: Option<u32>,
    out: &mut W,
) -> Result<(), CommandError> {
    let user = ctx.require_user().await?;
    let limit = limit.unwrap_or(ctx.config.browse_limit);

    let posts = ctx.db.posts_for_user(user.id, limit).await?;
    if posts.is_empty() {
        writeln!(out, "No posts found in your followed feeds")?;
        return Ok(());
    }

    writeln!(out, "Found {} posts from your followed feeds:", posts.len())?;
    writeln!(out)?;
    for (i, post) in posts.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, strip_control_chars(&post.title))?;
        writeln!(out, "   Feed: {}", strip_control_chars(&post.feed_name))?;
        writeln!(out, "   URL: {}", strip_control_chars(&post.url))?;
        if let Some(published_at) = post.published_at {
            writeln!(out, "   Published: {}", format_timestamp(published_at))?;
        }
        if let Some(description) = &post.description {
            let clean = strip_control_chars(description);
            writeln!(
                out,
                "   Description: {}",
                truncate_with_ellipsis(&clean, DESCRIPTION_WIDTH)
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{logged_in, run_ok};
    use super::super::Command;
    use crate::storage::NewPost;
    use pretty_assertions::assert_eq;

    async fn seed(ctx: &mut super::Context) -> i64 {
        run_ok(
            ctx,
            Command::AddFeed {
                name: "Blog".to_string(),
                url: "https://example.com/rss".to_string(),
            },
        )
        .await;
        ctx.db
            .get_feed_by_url("https://example.com/rss")
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_browse_empty() {
        let mut ctx = logged_in("posts_browse_empty").await;
        let out = run_ok(&mut ctx, Command::Browse { limit: None }).await;
        assert_eq!(out, "No posts found in your followed feeds\n");
    }

    #[tokio::test]
    async fn test_browse_formats_posts() {
        let mut ctx = logged_in("posts_browse_format").await;
        let feed_id = seed(&mut ctx).await;
        ctx.db
            .create_post(&NewPost {
                feed_id,
                title: "Dated".to_string(),
                url: "https://example.com/dated".to_string(),
                description: Some("x".repeat(120)),
                published_at: Some(1_136_239_445),
            })
            .await
            .unwrap();
        ctx.db
            .create_post(&NewPost {
                feed_id,
                title: "Undated".to_string(),
                url: "https://example.com/undated".to_string(),
                description: None,
                published_at: None,
            })
            .await
            .unwrap();

        let out = run_ok(&mut ctx, Command::Browse { limit: None }).await;
        let expected = format!(
            "Found 2 posts from your followed feeds:\n\n\
             1. Dated\n   Feed: Blog\n   URL: https://example.com/dated\n   \
             Published: 2006-01-02 22:04:05\n   Description: {}...\n\n\
             2. Undated\n   Feed: Blog\n   URL: https://example.com/undated\n\n",
            "x".repeat(100)
        );
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn test_browse_limit() {
        let mut ctx = logged_in("posts_browse_limit").await;
        let feed_id = seed(&mut ctx).await;
        for i in 0..15 {
            ctx.db
                .create_post(&NewPost {
                    feed_id,
                    title: format!("Post {i}"),
                    url: format!("https://example.com/{i}"),
                    description: None,
                    published_at: Some(1_700_000_000 + i),
                })
                .await
                .unwrap();
        }

        let out = run_ok(&mut ctx, Command::Browse { limit: None }).await;
        assert!(out.starts_with("Found 10 posts"));
        assert!(out.contains("1. Post 14\n"));

        let out = run_ok(&mut ctx, Command::Browse { limit: Some(2) }).await;
        assert!(out.starts_with("Found 2 posts"));

        ctx.config.browse_limit = 4;
        let out = run_ok(&mut ctx, Command::Browse { limit: None }).await;
        assert!(out.starts_with("Found 4 posts"));
    }

    #[tokio::test]
    async fn test_browse_strips_control_chars_from_url() {
        let mut ctx = logged_in("posts_browse_url_escape").await;
        let feed_id = seed(&mut ctx).await;
        ctx.db
            .create_post(&NewPost {
                feed_id,
                title: "Sneaky".to_string(),
                url: "https://example.com/\x1b[2Jpost".to_string(),
                description: None,
                published_at: None,
            })
            .await
            .unwrap();

        let out = run_ok(&mut ctx, Command::Browse { limit: None }).await;
        assert!(!out.contains('\x1b'));
        assert!(out.contains("   URL: https://example.com/"));
    }
}
