//! Orchestrator — wraps the session manager with run tracking, tool-call
//! tracking, and broadcast notifications. The top-level entry point for
//! callers outside this crate.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use substrate_events::sqlite::row_types::EventRow;
use substrate_events::{AppendOptions, EventType, ReconstructionResult, SessionState};

use crate::broadcast::{BroadcastEvent, EventEmitter};
use crate::errors::RuntimeError;
use crate::session_manager::{ActiveSession, SessionFilter, SessionManager};
use crate::tool_call_tracker::ToolCallTracker;

/// Tracks an in-flight run against a session.
struct ActiveRun {
    run_id: String,
    cancel: CancellationToken,
}

/// Multi-session orchestrator: the gateway callers outside this crate use.
pub struct Orchestrator {
    session_manager: Arc<SessionManager>,
    broadcast: Arc<EventEmitter>,
    max_concurrent_sessions: usize,
    max_concurrent_runs: usize,
    active_runs: Mutex<HashMap<String, ActiveRun>>,
    tool_tracker: Mutex<ToolCallTracker>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given session and run concurrency ceilings.
    pub fn new(
        session_manager: Arc<SessionManager>,
        max_concurrent_sessions: usize,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            session_manager,
            broadcast: Arc::new(EventEmitter::new()),
            max_concurrent_sessions,
            max_concurrent_runs,
            active_runs: Mutex::new(HashMap::new()),
            tool_tracker: Mutex::new(ToolCallTracker::new()),
        }
    }

    /// Create an orchestrator using the concurrency ceilings and broadcast
    /// channel capacity from the given settings.
    pub fn from_settings(session_manager: Arc<SessionManager>, settings: &substrate_settings::Settings) -> Self {
        Self {
            session_manager,
            broadcast: Arc::new(EventEmitter::with_capacity(settings.orchestrator.event_channel_capacity)),
            max_concurrent_sessions: settings.orchestrator.max_concurrent_sessions,
            max_concurrent_runs: settings.orchestrator.max_concurrent_runs,
            active_runs: Mutex::new(HashMap::new()),
            tool_tracker: Mutex::new(ToolCallTracker::new()),
        }
    }

    /// The underlying session manager.
    pub fn session_manager(&self) -> &Arc<SessionManager> {
        &self.session_manager
    }

    /// The broadcast emitter.
    pub fn broadcast(&self) -> &Arc<EventEmitter> {
        &self.broadcast
    }

    /// Subscribe to orchestrator notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BroadcastEvent> {
        self.broadcast.subscribe()
    }

    // ── Read-through / append ──────────────────────────────────────────

    /// Append an event: delegate to the session's context if active, otherwise
    /// write straight to the event store. Broadcasts `event_new` on success.
    pub async fn append_event(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: Value,
    ) -> Result<EventRow, RuntimeError> {
        let event = if let Some(active) = self.active_session(session_id) {
            active
                .context
                .persister
                .append(session_id, event_type, payload)
                .await?
        } else {
            self.session_manager
                .event_store()
                .append(&AppendOptions {
                    session_id,
                    event_type,
                    payload,
                    parent_id: None,
                })
                .map_err(RuntimeError::from)?
        };

        let _ = self.broadcast.emit(BroadcastEvent::EventNew {
            event: Box::new(event.clone()),
            session_id: session_id.to_owned(),
        });
        Ok(event)
    }

    /// Read session state, flushing any pending events first if the session is active.
    pub async fn get_session_state(&self, session_id: &str) -> Result<SessionState, RuntimeError> {
        self.flush_pending(session_id).await?;
        self.session_manager
            .event_store()
            .get_state_at_head(session_id)
            .map_err(RuntimeError::from)
    }

    /// Read the message transcript at head, flushing pending events first.
    pub async fn get_session_messages(
        &self,
        session_id: &str,
    ) -> Result<ReconstructionResult, RuntimeError> {
        self.flush_pending(session_id).await?;
        self.session_manager
            .event_store()
            .get_messages_at_head(session_id)
            .map_err(RuntimeError::from)
    }

    /// Read the raw event log for a session, flushing pending events first.
    pub async fn get_session_events(
        &self,
        session_id: &str,
        opts: &substrate_events::sqlite::repositories::event::ListEventsOptions,
    ) -> Result<Vec<EventRow>, RuntimeError> {
        self.flush_pending(session_id).await?;
        self.session_manager
            .event_store()
            .get_events_by_session(session_id, opts)
            .map_err(RuntimeError::from)
    }

    /// Walk an event's ancestor chain back to its session root (and across a
    /// fork boundary into the parent session, if any), flushing first.
    pub async fn get_ancestors(&self, session_id: &str, event_id: &str) -> Result<Vec<EventRow>, RuntimeError> {
        self.flush_pending(session_id).await?;
        self.session_manager
            .event_store()
            .get_ancestors(event_id)
            .map_err(RuntimeError::from)
    }

    fn active_session(&self, session_id: &str) -> Option<Arc<ActiveSession>> {
        self.session_manager.get_active(session_id)
    }

    async fn flush_pending(&self, session_id: &str) -> Result<(), RuntimeError> {
        if let Some(active) = self.active_session(session_id) {
            active.context.persister.flush().await?;
        }
        Ok(())
    }

    // ── Run tracking ───────────────────────────────────────────────────

    /// Start tracking a run for a session, returning its `CancellationToken`.
    ///
    /// Fails `SessionBusy` if the session already has a run in flight, and
    /// `ServerBusy` if the process is already at its configured run ceiling.
    pub fn start_run(&self, session_id: &str, run_id: &str) -> Result<CancellationToken, RuntimeError> {
        let mut runs = self.active_runs.lock();
        if runs.contains_key(session_id) {
            return Err(RuntimeError::SessionBusy(session_id.to_owned()));
        }
        if runs.len() >= self.max_concurrent_runs {
            return Err(RuntimeError::ServerBusy(self.max_concurrent_runs));
        }
        let cancel = CancellationToken::new();
        let _ = runs.insert(
            session_id.to_owned(),
            ActiveRun {
                run_id: run_id.to_owned(),
                cancel: cancel.clone(),
            },
        );
        Ok(cancel)
    }

    /// Complete a run, releasing its concurrency slot.
    pub fn complete_run(&self, session_id: &str) {
        let _ = self.active_runs.lock().remove(session_id);
    }

    /// The run id currently active for a session, if any.
    pub fn get_run_id(&self, session_id: &str) -> Option<String> {
        self.active_runs.lock().get(session_id).map(|r| r.run_id.clone())
    }

    /// Whether a session has an active run.
    pub fn has_active_run(&self, session_id: &str) -> bool {
        self.active_runs.lock().contains_key(session_id)
    }

    /// Number of active runs across all sessions.
    pub fn active_run_count(&self) -> usize {
        self.active_runs.lock().len()
    }

    /// Abort a session's active run by tripping its cancellation token.
    /// Returns whether a run was found and cancelled.
    pub fn abort(&self, session_id: &str) -> bool {
        let runs = self.active_runs.lock();
        if let Some(run) = runs.get(session_id) {
            run.cancel.cancel();
            true
        } else {
            false
        }
    }

    /// Whether a session is busy: has an active run, or is otherwise active.
    pub fn is_session_busy(&self, session_id: &str) -> bool {
        self.has_active_run(session_id) || self.session_manager.is_active(session_id)
    }

    /// Number of currently active sessions.
    pub fn active_session_count(&self) -> usize {
        self.session_manager.active_count()
    }

    /// Configured session concurrency ceiling.
    pub fn max_concurrent_sessions(&self) -> usize {
        self.max_concurrent_sessions
    }

    /// Configured run concurrency ceiling.
    pub fn max_concurrent_runs(&self) -> usize {
        self.max_concurrent_runs
    }

    /// Whether another concurrent session can be accepted.
    pub fn can_accept_session(&self) -> bool {
        self.session_manager.active_count() < self.max_concurrent_sessions
    }

    // ── Tool call tracking ─────────────────────────────────────────────

    /// Register a tool call, returning a receiver for its eventual result.
    pub fn register_tool_call(&self, tool_call_id: &str) -> tokio::sync::oneshot::Receiver<Value> {
        self.tool_tracker.lock().register(tool_call_id)
    }

    /// Resolve a pending tool call. Returns whether it was found.
    pub fn resolve_tool_call(&self, tool_call_id: &str, value: Value) -> bool {
        self.tool_tracker.lock().resolve(tool_call_id, value)
    }

    /// Whether a tool call is pending.
    pub fn has_pending_tool_call(&self, tool_call_id: &str) -> bool {
        self.tool_tracker.lock().has_pending(tool_call_id)
    }

    // ── Idle sweep ──────────────────────────────────────────────────────

    /// Spawn the idle-session sweep using the interval and threshold from settings.
    pub fn spawn_idle_sweep_from_settings(
        self: &Arc<Self>,
        settings: &substrate_settings::Settings,
    ) -> tokio::task::JoinHandle<()> {
        self.spawn_idle_sweep(
            std::time::Duration::from_secs(settings.orchestrator.idle_sweep_interval_secs),
            chrono::Duration::seconds(settings.orchestrator.idle_session_timeout_secs as i64),
        )
    }

    /// Spawn a background task that sweeps idle sessions on a fixed interval
    /// until the orchestrator is dropped.
    pub fn spawn_idle_sweep(
        self: &Arc<Self>,
        interval: std::time::Duration,
        threshold: chrono::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let orch = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(orch) = orch.upgrade() else {
                    return;
                };
                let ended = orch.sweep_idle_sessions(threshold).await;
                if ended > 0 {
                    tracing::debug!(ended, "idle sweep ended sessions");
                }
            }
        })
    }

    /// End any active session whose `last_activity_at` is older than `threshold`.
    /// Called periodically by the idle-sweep background task.
    pub async fn sweep_idle_sessions(&self, threshold: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - threshold;
        let sessions = self
            .session_manager
            .list_sessions(&SessionFilter::default())
            .unwrap_or_default();

        let mut ended = 0;
        for session in sessions {
            let Ok(last_activity) = chrono::DateTime::parse_from_rfc3339(&session.last_activity_at) else {
                continue;
            };
            if last_activity < cutoff {
                if self.session_manager.end_session(&session.id).await.is_ok() {
                    ended += 1;
                }
            }
        }
        ended
    }

    // ── Shutdown ─────────────────────────────────────────────────────────

    /// Graceful shutdown: cancel all runs and pending tool calls, end all active sessions.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        {
            let runs = self.active_runs.lock();
            for run in runs.values() {
                run.cancel.cancel();
            }
        }
        self.tool_tracker.lock().cancel_all();

        let sessions = self
            .session_manager
            .list_sessions(&SessionFilter::default())
            .unwrap_or_default();
        for session in sessions {
            let _ = self.session_manager.end_session(&session.id).await;
        }
        Ok(())
    }
}
