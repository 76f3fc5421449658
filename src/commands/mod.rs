//! Command-line surface: argument parsing, shared state and the handlers.
//!
//! Handlers write their output to a caller-supplied [`Write`] so `main`
//! can hand them stdout while tests capture a buffer. Diagnostics go through
//! `tracing` to stderr.

mod agg;
mod feeds;
mod posts;
mod users;

use chrono::DateTime;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::session::{Session, SessionError};
use crate::storage::{Database, DatabaseError, User};
use crate::util::UrlValidationError;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("you must be logged in to use this command")]
    NotLoggedIn,

    #[error("user {0} does not exist")]
    UnknownUser(String),

    #[error("user {0} already exists")]
    UserExists(String),

    #[error("feed with URL {0} not found")]
    FeedNotFound(String),

    #[error("you are already following this feed")]
    AlreadyFollowing,

    #[error("you are not following {0}")]
    NotFollowing(String),

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to set up HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "gator",
    version,
    about = "RSS aggregator: follow feeds, collect their posts, browse them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Log in as an existing user
    Login { name: String },
    /// List all users
    Users,
    /// Delete every user, along with their feeds, follows and posts
    Reset,
    /// Add a feed and follow it
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },
    /// List all feeds
    Feeds,
    /// Follow an existing feed
    Follow { url: String },
    /// Stop following a feed
    Unfollow { url: String },
    /// List the feeds you follow
    Following,
    /// Show the newest posts from the feeds you follow
    Browse { limit: Option<u32> },
    /// Collect feeds every INTERVAL (e.g. 30s, 1m, 1h30m) until Ctrl-C
    Agg {
        #[arg(value_parser = parse_interval)]
        interval: Duration,
    },
}

// ============================================================================
// Context
// ============================================================================

/// Everything a handler may touch.
pub struct Context {
    pub db: Database,
    pub config: Config,
    pub session: Session,
    pub session_path: PathBuf,
    /// Fired on Ctrl-C; stops `agg`
    pub shutdown: CancellationToken,
}

impl Context {
    pub fn new(db: Database, config: Config, session: Session, session_path: PathBuf) -> Self {
        Self {
            db,
            config,
            session,
            session_path,
            shutdown: CancellationToken::new(),
        }
    }

    fn save_session(&self) -> Result<(), CommandError> {
        self.session.save(&self.session_path)?;
        Ok(())
    }

    /// Resolve the logged-in user, for commands that need one.
    async fn require_user(&self) -> Result<User, CommandError> {
        let name = self
            .session
            .current_user
            .as_deref()
            .ok_or(CommandError::NotLoggedIn)?;
        self.db
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| CommandError::UnknownUser(name.to_string()))
    }
}

/// Run one command to completion.
pub async fn run<W: Write>(
    ctx: &mut Context,
    command: Command,
    out: &mut W,
) -> Result<(), CommandError> {
    tracing::debug!(?command, "Running command");
    match command {
        Command::Register { name } => users::register(ctx, &name, out).await,
        Command::Login { name } => users::login(ctx, &name, out).await,
        Command::Users => users::list(ctx, out).await,
        Command::Reset => users::reset(ctx, out).await,
        Command::AddFeed { name, url } => feeds::add(ctx, &name, &url, out).await,
        Command::Feeds => feeds::list(ctx, out).await,
        Command::Follow { url } => feeds::follow(ctx, &url, out).await,
        Command::Unfollow { url } => feeds::unfollow(ctx, &url, out).await,
        Command::Following => feeds::following(ctx, out).await,
        Command::Browse { limit } => posts::browse(ctx, limit, out).await,
        Command::Agg { interval } => agg::run(ctx, interval, out).await,
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse an interval such as `30s`, `1m`, `1h30m`, `500ms` or `1.5h`.
///
/// Units: `ns`, `us`, `ms`, `s`, `m`, `h`. Every number needs a unit and the
/// total must be greater than zero.
pub fn parse_interval(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("interval is empty".to_string());
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let num_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        if num_end == 0 {
            return Err(format!("invalid interval {input:?}: expected a number"));
        }
        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| format!("invalid number in interval {input:?}"))?;
        rest = &rest[num_end..];

        let unit_end = rest.find(is_number).unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => {
                return Err(format!(
                    "missing unit in interval {input:?} (use ms, s, m or h)"
                ))
            }
            other => return Err(format!("unknown unit {other:?} in interval {input:?}")),
        };
        rest = &rest[unit_end..];

        total += Duration::from_nanos((value * nanos_per_unit).round() as u64);
    }

    if total.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(total)
}

/// Render a stored Unix timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh in-memory database and a session file in its own scratch dir.
    pub async fn context(name: &str) -> Context {
        let dir = std::env::temp_dir().join(format!("gator_cmd_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let db = Database::open(":memory:").await.unwrap();
        Context::new(
            db,
            Config::default(),
            Session::default(),
            dir.join("session.json"),
        )
    }

    pub async fn run_ok(ctx: &mut Context, command: Command) -> String {
        let mut out = Vec::new();
        run(ctx, command, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    pub async fn run_err(ctx: &mut Context, command: Command) -> CommandError {
        let mut out = Vec::new();
        run(ctx, command, &mut out).await.unwrap_err()
    }

    pub async fn logged_in(name: &str) -> Context {
        let mut ctx = context(name).await;
        run_ok(
            &mut ctx,
            Command::Register {
                name: "alice".to_string(),
            },
        )
        .await;
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_interval("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_interval("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_interval("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval(" 2m "), Ok(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_interval_rejects_bad_input() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("30").is_err());
        assert!(parse_interval("s").is_err());
        assert!(parse_interval("10d").is_err());
        assert!(parse_interval("-5s").is_err());
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("0h0m").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["gator", "addfeed", "Blog", "https://example.com/rss"])
            .unwrap();
        assert_eq!(
            cli.command,
            Command::AddFeed {
                name: "Blog".to_string(),
                url: "https://example.com/rss".to_string(),
            }
        );

        let cli = Cli::try_parse_from(["gator", "browse"]).unwrap();
        assert_eq!(cli.command, Command::Browse { limit: None });

        let cli = Cli::try_parse_from(["gator", "browse", "3"]).unwrap();
        assert_eq!(cli.command, Command::Browse { limit: Some(3) });

        let cli = Cli::try_parse_from(["gator", "agg", "1m"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Agg {
                interval: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn test_cli_rejects_bad_args() {
        assert!(Cli::try_parse_from(["gator", "agg", "soon"]).is_err());
        assert!(Cli::try_parse_from(["gator", "browse", "many"]).is_err());
        assert!(Cli::try_parse_from(["gator", "login"]).is_err());
        assert!(Cli::try_parse_from(["gator"]).is_err());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_136_239_445), "2006-01-02 22:04:05");
    }

    #[tokio::test]
    async fn test_logged_in_guard() {
        let ctx = test_support::context("guard").await;
        assert!(matches!(
            ctx.require_user().await,
            Err(CommandError::NotLoggedIn)
        ));

        let mut ctx = ctx;
        ctx.session.login("ghost");
        assert!(matches!(
            ctx.require_user().await,
            Err(CommandError::UnknownUser(name)) if name == "ghost"
        ));
    }
}
