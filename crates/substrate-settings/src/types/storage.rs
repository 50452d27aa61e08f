//! Event store settings: database location and connection pool sizing.

use serde::{Deserialize, Serialize};

/// Storage engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Path to the SQLite database file, relative to the data directory
    /// unless absolute.
    pub database_path: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Number of `SQLITE_BUSY` retry attempts before giving up on a write.
    pub busy_retry_attempts: u32,
    /// Base delay in milliseconds between busy retries (doubles each
    /// attempt, capped at `busy_retry_max_delay_ms`).
    pub busy_retry_base_delay_ms: u64,
    /// Cap on the busy-retry backoff delay in milliseconds.
    pub busy_retry_max_delay_ms: u64,
    /// Content larger than this (bytes) is moved to blob storage.
    pub blob_inline_threshold_bytes: usize,
    /// A `tool.result` payload larger than this (bytes) is truncated before
    /// being appended; truncation is noted in the stored payload.
    pub tool_result_truncation_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: "events.db".to_string(),
            pool_size: 8,
            busy_retry_attempts: 5,
            busy_retry_base_delay_ms: 20,
            busy_retry_max_delay_ms: 1000,
            blob_inline_threshold_bytes: 1024 * 1024,
            tool_result_truncation_bytes: 64 * 1024,
        }
    }
}
