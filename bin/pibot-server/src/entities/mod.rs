//! Persistence layer.
//!
//! Each concern (messages, sessions, users, ratings, feedback, config,
//! exports) is a trait implemented by [`SqliteStore`]. Handlers and the
//! generation pipeline depend on the traits, so tests can substitute
//! in-memory fakes.
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required.

pub mod chat;
pub mod config;
pub mod dao;
pub mod export;
pub mod feedback;
pub mod rating;
pub mod session;
pub mod user;

pub use dao::{
    ChatMessage, ChatSession, Feedback, FeedbackPriority, FeedbackStatus, FeedbackType, MessageRole,
    ModelRating, SessionParameters, User,
};

pub use chat::ChatStore;
pub use config::ConfigStore;
pub use export::ExportStore;
pub use feedback::FeedbackStore;
pub use rating::RatingStore;
pub use session::SessionStore;
pub use user::UserStore;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// SQLite-backed store shared by every handler.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://pibot.db?mode=rwc"`.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database. A single long-lived connection keeps
    /// the schema alive for the lifetime of the pool.
    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

/// Parse an RFC 3339 column, logging and substituting "now" on corruption.
pub(crate) fn parse_timestamp(raw: &str, column: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, column, error = %e, "failed to parse timestamp; using now");
        Utc::now()
    })
}
