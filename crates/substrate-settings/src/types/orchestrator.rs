//! Orchestrator settings: concurrency limits and idle-session sweeping.

use serde::{Deserialize, Serialize};

/// Orchestrator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorSettings {
    /// Maximum number of agent runs active at once across all sessions.
    pub max_concurrent_runs: usize,
    /// Maximum number of sessions that can be active (resumed, not ended)
    /// at once.
    pub max_concurrent_sessions: usize,
    /// How often the idle-session sweep checks for sessions with no
    /// activity for longer than `idle_session_timeout_secs`.
    pub idle_sweep_interval_secs: u64,
    /// A session idle for longer than this is ended automatically.
    pub idle_session_timeout_secs: u64,
    /// Broadcast channel capacity for live event fan-out per session.
    pub event_channel_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 16,
            max_concurrent_sessions: 64,
            idle_sweep_interval_secs: 60,
            idle_session_timeout_secs: 3600,
            event_channel_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = OrchestratorSettings::default();
        assert!(s.max_concurrent_runs <= s.max_concurrent_sessions);
        assert!(s.idle_sweep_interval_secs > 0);
    }
}
