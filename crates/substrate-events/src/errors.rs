//! Storage-level error hierarchy.

use thiserror::Error;

/// Errors surfaced by the event store and its repositories.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session already ended: {0}")]
    SessionEnded(String),

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("parent event does not belong to session: {0}")]
    ParentNotFound(String),

    #[error("invalid event type: {0}")]
    InvalidEventType(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("migration failed at version {version}: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },
}

/// Convenience alias for `Result<T, EventStoreError>`.
pub type Result<T> = std::result::Result<T, EventStoreError>;
