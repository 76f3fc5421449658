//! gator: a command-line RSS aggregator.
//!
//! Users follow RSS feeds; `gator agg` repeatedly fetches the stalest feed
//! and stores its items as posts; `gator browse` shows the newest posts.
//!
//! - [`feed`] - Date parsing, fetching, ingestion and the scrape loop
//! - [`storage`] - SQLite persistence via sqlx
//! - [`commands`] - CLI argument parsing and command handlers
//! - [`config`] / [`session`] - On-disk settings and the logged-in user

pub mod commands;
pub mod config;
pub mod feed;
pub mod session;
pub mod storage;
pub mod util;
