//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON
//! wire format used on disk. Each type implements [`Default`] with
//! production default values, and is marked `#[serde(default)]` so a
//! partial settings file only needs to specify the fields it overrides.

mod logging;
mod orchestrator;
mod search;
mod storage;

pub use logging::*;
pub use orchestrator::*;
pub use search::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the event store and session orchestrator.
///
/// Loaded from `~/.substrate/settings.json` with defaults applied for
/// missing fields; environment variables can override specific values.
///
/// # JSON Format
///
/// All field names are camelCase. Example:
///
/// ```json
/// {
///   "version": "0.1.0",
///   "storage": { "poolSize": 16 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Event store storage configuration.
    pub storage: StorageSettings,
    /// Orchestrator concurrency and lifecycle configuration.
    pub orchestrator: OrchestratorSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Retry configuration for fallible IO.
    pub retry: RetrySettings,
    /// Full-text search result limits.
    pub search: SearchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "substrate".to_string(),
            storage: StorageSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            logging: LoggingSettings::default(),
            retry: RetrySettings::default(),
            search: SearchSettings::default(),
        }
    }
}

impl Settings {
    /// Clamp ratio fields to `[0.0, 1.0]` and correct invalid invariants.
    ///
    /// Called automatically during loading. Out-of-range values are
    /// clamped with a warning rather than rejected, so a typo in a
    /// settings file degrades gracefully instead of failing startup.
    pub fn validate(&mut self) {
        if self.retry.jitter_factor < 0.0 || self.retry.jitter_factor > 1.0 {
            let clamped = self.retry.jitter_factor.clamp(0.0, 1.0);
            tracing::warn!(
                "retry.jitterFactor out of range ({}), clamped to {clamped}",
                self.retry.jitter_factor
            );
            self.retry.jitter_factor = clamped;
        }

        if self.storage.busy_retry_max_delay_ms < self.storage.busy_retry_base_delay_ms {
            tracing::warn!(
                "storage.busyRetryMaxDelayMs ({}) < busyRetryBaseDelayMs ({}), correcting",
                self.storage.busy_retry_max_delay_ms,
                self.storage.busy_retry_base_delay_ms
            );
            self.storage.busy_retry_max_delay_ms = self.storage.busy_retry_base_delay_ms;
        }

        if self.orchestrator.max_concurrent_runs > self.orchestrator.max_concurrent_sessions {
            tracing::warn!(
                "orchestrator.maxConcurrentRuns ({}) > maxConcurrentSessions ({}), correcting",
                self.orchestrator.max_concurrent_runs,
                self.orchestrator.max_concurrent_sessions
            );
            self.orchestrator.max_concurrent_runs = self.orchestrator.max_concurrent_sessions;
        }

        if self.search.max_result_limit < self.search.default_result_limit {
            tracing::warn!(
                "search.maxResultLimit ({}) < defaultResultLimit ({}), correcting",
                self.search.max_result_limit,
                self.search.default_result_limit
            );
            self.search.max_result_limit = self.search.default_result_limit;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
