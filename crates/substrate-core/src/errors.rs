//! Core error hierarchy shared across the workspace.

use thiserror::Error;

/// Top-level error type for crates built on `substrate-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid payload for event type {event_type}: {reason}")]
    InvalidPayload { event_type: String, reason: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Machine-readable error codes surfaced across process boundaries.
///
/// Kept distinct from [`CoreError`]'s `Display` text so that error
/// *identity* (for client-side branching) is stable even if messages
/// change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidId,
    InvalidPayload,
    Validation,
    Internal,
}

impl CoreError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidId(_) => ErrorCode::InvalidId,
            Self::InvalidPayload { .. } => ErrorCode::InvalidPayload,
            Self::Validation(_) => ErrorCode::Validation,
            Self::Serde(_) | Self::Io(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_code() {
        let err = CoreError::Validation("bad".into());
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[test]
    fn invalid_payload_message_includes_fields() {
        let err = CoreError::InvalidPayload {
            event_type: "message.user".into(),
            reason: "missing content".into(),
        };
        assert!(err.to_string().contains("message.user"));
        assert!(err.to_string().contains("missing content"));
    }
}
