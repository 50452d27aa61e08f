//! Session orchestrator error types.

use serde::{Deserialize, Serialize};

/// Errors that can occur in the session orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session is busy (another run is already in flight).
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// Session has ended; no further appends or runs are permitted.
    #[error("Session ended: {0}")]
    SessionEnded(String),

    /// An explicit parent event id does not belong to the target session.
    #[error("Parent event not found in session: {0}")]
    ParentNotFound(String),

    /// The process is already at its configured concurrent-run ceiling.
    #[error("Server busy: at concurrency limit ({0})")]
    ServerBusy(usize),

    /// Operation was cancelled via abort/interruption.
    #[error("Operation cancelled")]
    Cancelled,

    /// Event persistence error.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the error is recoverable (caller can retry).
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Cancelled | Self::SessionBusy(_) | Self::ServerBusy(_) => true,
            Self::SessionNotFound(_)
            | Self::SessionEnded(_)
            | Self::ParentNotFound(_)
            | Self::Persistence(_)
            | Self::Internal(_) => false,
        }
    }

    /// Error category string for event emission.
    pub fn category(&self) -> &str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionBusy(_) => "session_busy",
            Self::SessionEnded(_) => "session_ended",
            Self::ParentNotFound(_) => "parent_not_found",
            Self::ServerBusy(_) => "server_busy",
            Self::Cancelled => "cancelled",
            Self::Persistence(_) => "persistence",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<substrate_events::EventStoreError> for RuntimeError {
    fn from(err: substrate_events::EventStoreError) -> Self {
        use substrate_events::EventStoreError as E;
        // Taxonomy that callers can match on passes through transparently;
        // everything else collapses into the generic persistence bucket.
        match err {
            E::SessionNotFound(id) => Self::SessionNotFound(id),
            E::SessionEnded(id) => Self::SessionEnded(id),
            E::ParentNotFound(id) => Self::ParentNotFound(id),
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Why a session's active run stopped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Completed normally.
    EndTurn,
    /// Unrecoverable error.
    Error,
    /// Interrupted via `notification.interrupted`.
    Interrupted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndTurn => write!(f, "end_turn"),
            Self::Error => write!(f, "error"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}
