use std::io::Write;

use super::{CommandError, Context};
use crate::storage::DatabaseError;

pub(super) async fn register<W: Write>(
    ctx: &mut Context,
    name: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let user = ctx.db.create_user(name).await.map_err(|e| match e {
        DatabaseError::AlreadyExists { .. } => CommandError::UserExists(name.to_string()),
        other => CommandError::Database(other),
    })?;
    tracing::info!(user_id = user.id, user = %user.name, "Registered user");
    writeln!(out, "User {} created", user.name)?;

    login(ctx, name, out).await
}

pub(super) async fn login<W: Write>(
    ctx: &mut Context,
    name: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let user = ctx
        .db
        .get_user_by_name(name)
        .await?
        .ok_or_else(|| CommandError::UnknownUser(name.to_string()))?;

    ctx.session.login(&user.name);
    ctx.save_session()?;

    writeln!(out, "User {} logged in", user.name)?;
    Ok(())
}

pub(super) async fn list<W: Write>(ctx: &Context, out: &mut W) -> Result<(), CommandError> {
    let users = ctx.db.list_users().await?;
    if users.is_empty() {
        writeln!(out, "No users found")?;
        return Ok(());
    }

    for user in users {
        if ctx.session.is_current(&user.name) {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}

/// Delete every user. Cascades take feeds, follows and posts with them, and
/// the session is cleared since its user no longer exists.
pub(super) async fn reset<W: Write>(ctx: &mut Context, out: &mut W) -> Result<(), CommandError> {
    let removed = ctx.db.delete_all_users().await?;
    tracing::info!(users = removed, "Deleted all users");

    ctx.session.logout();
    ctx.save_session()?;

    writeln!(out, "All users deleted")?;
    Ok(())
}
