mod feeds;
mod follows;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{
    CreatePostOutcome, DatabaseError, Feed, FeedFollow, FeedWithOwner, NewPost, Post,
    PostWithFeed, User,
};
