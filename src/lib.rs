//! # Emoji Atlas - reaction leaderboards for chat workspaces
//!
//! Records emoji reactions with lightweight sentiment analysis and serves
//! leaderboards back to users.
//!
//! Emoji Atlas provides:
//! - SQLite-backed reaction store with a fixed catalog of named operations
//! - Single-writer dispatcher thread serializing every storage command
//! - Cloneable `Database` handle for concurrent event-handling workers
//! - Event recording (find-then-insert) and Block Kit leaderboard views
//! - Interruptible JSON-lines ingestion

pub mod storage;
pub mod model;
pub mod dispatch;
pub mod event;
pub mod atlas;
pub mod ingest;
pub mod view;
pub mod config;
pub mod ui;


// Re-exports for convenient access
pub use storage::AtlasStore;
pub use dispatch::{Database, Dispatcher, DispatcherState, ShutdownHandle};
pub use model::{EmojiCount, RecentEmoji, Sentiment, SentimentScores};
pub use atlas::{Atlas, MessageSource, SentimentAnalyzer};
pub use event::PlatformEvent;

/// Result type alias for Emoji Atlas operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Emoji Atlas operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("Dispatcher is closed")]
    DispatcherClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event error: {0}")]
    Event(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => Error::Constraint(err.to_string()),
            _ => Error::Storage(err),
        }
    }
}
