use std::io::Write;

use super::{format_timestamp, CommandError, Context};
use crate::storage::{DatabaseError, FeedFollow};
use crate::util::{strip_control_chars, validate_feed_url};

fn follow_error(e: DatabaseError) -> CommandError {
    match e {
        DatabaseError::AlreadyExists { .. } => CommandError::AlreadyFollowing,
        other => CommandError::Database(other),
    }
}

/// Register a feed (or reuse the one already stored under this URL) and
/// follow it as the current user.
pub(super) async fn add<W: Write>(
    ctx: &Context,
    name: &str,
    url: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let user = ctx.require_user().await?;
    let url = url.trim();
    validate_feed_url(url)?;

    let feed = match ctx.db.get_feed_by_url(url).await? {
        Some(existing) => {
            writeln!(
                out,
                "Feed already exists, using existing feed: {}",
                existing.name
            )?;
            existing
        }
        None => {
            let feed = ctx.db.create_feed(name, url, user.id).await?;
            tracing::info!(feed_id = feed.id, url = %feed.url, "Added feed");
            writeln!(out, "Feed added successfully:")?;
            writeln!(out, "  ID: {}", feed.id)?;
            writeln!(out, "  Name: {}", feed.name)?;
            writeln!(out, "  URL: {}", strip_control_chars(&feed.url))?;
            writeln!(out, "  Created: {}", format_timestamp(feed.created_at))?;
            feed
        }
    };

    let follow = ctx
        .db
        .create_feed_follow(user.id, feed.id)
        .await
        .map_err(follow_error)?;
    writeln!(out)?;
    writeln!(
        out,
        "You are now following this feed as user {}",
        follow.user_name
    )?;
    Ok(())
}

pub(super) async fn list<W: Write>(ctx: &Context, out: &mut W) -> Result<(), CommandError> {
    let feeds = ctx.db.list_feeds_with_owners().await?;
    if feeds.is_empty() {
        writeln!(out, "No feeds found")?;
        return Ok(());
    }

    writeln!(out, "Found {} feeds:", feeds.len())?;
    writeln!(out)?;
    for (i, feed) in feeds.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, strip_control_chars(&feed.name))?;
        writeln!(out, "   URL: {}", strip_control_chars(&feed.url))?;
        writeln!(out, "   Added by: {}", feed.user_name)?;
        writeln!(out, "   Added on: {}", format_timestamp(feed.created_at))?;
        writeln!(out)?;
    }
    Ok(())
}

pub(super) async fn follow<W: Write>(
    ctx: &Context,
    url: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let user = ctx.require_user().await?;
    let url = url.trim();
    let feed = ctx
        .db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| CommandError::FeedNotFound(url.to_string()))?;

    let follow = ctx
        .db
        .create_feed_follow(user.id, feed.id)
        .await
        .map_err(follow_error)?;
    writeln!(
        out,
        "You are now following feed \"{}\" as user {}",
        follow.feed_name, follow.user_name
    )?;
    Ok(())
}

pub(super) async fn unfollow<W: Write>(
    ctx: &Context,
    url: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let user = ctx.require_user().await?;
    let url = url.trim();
    if ctx.db.get_feed_by_url(url).await?.is_none() {
        return Err(CommandError::FeedNotFound(url.to_string()));
    }

    if !ctx.db.delete_feed_follow(user.id, url).await? {
        return Err(CommandError::NotFollowing(url.to_string()));
    }
    writeln!(out, "You have unfollowed feed with URL: {}", strip_control_chars(url))?;
    Ok(())
}

pub(super) async fn following<W: Write>(ctx: &Context, out: &mut W) -> Result<(), CommandError> {
    let user = ctx.require_user().await?;
    let follows: Vec<FeedFollow> = ctx.db.feed_follows_for_user(user.id).await?;
    if follows.is_empty() {
        writeln!(out, "User {} is not following any feeds", user.name)?;
        return Ok(());
    }

    writeln!(
        out,
        "User {} is following {} feeds:",
        user.name,
        follows.len()
    )?;
    writeln!(out)?;
    for (i, follow) in follows.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, strip_control_chars(&follow.feed_name))?;
        writeln!(out, "   URL: {}", strip_control_chars(&follow.feed_url))?;
        writeln!(
            out,
            "   Following since: {}",
            format_timestamp(follow.created_at)
        )?;
        writeln!(out)?;
    }
    Ok(())
}
