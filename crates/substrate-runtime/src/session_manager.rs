//! Session manager — create, resume, end, fork, archive, list sessions.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tracing::{debug, instrument};

use substrate_events::sqlite::repositories::session::ListSessionsOptions;
use substrate_events::sqlite::row_types::SessionRow;
use substrate_events::{AppendOptions, EventStore, EventType, ForkOptions, SessionState};

use crate::errors::RuntimeError;
use crate::session_context::SessionContext;
use crate::session_reconstructor;

/// Result of a session fork operation.
pub struct ForkSessionResult {
    /// The new forked session ID.
    pub new_session_id: String,
    /// The root event in the new session (the fork event).
    pub root_event_id: String,
    /// The event ID from which the fork was created.
    pub forked_from_event_id: String,
}

/// Active session wrapper.
pub struct ActiveSession {
    /// Session context with persister and state.
    pub context: SessionContext,
    /// Reconstructed state (messages, model, etc.).
    pub state: SessionState,
}

/// Filter for listing sessions.
#[derive(Clone, Debug, Default)]
pub struct SessionFilter {
    /// Filter by workspace path.
    pub workspace_path: Option<String>,
    /// Include archived (ended) sessions.
    pub include_archived: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// Tracks active sessions, plan mode, and delegates persistence to the event store.
///
/// This is the sole gateway through which callers start, resume, fork, and
/// end sessions; it guarantees at most one `ActiveSession` (and therefore one
/// linearizing `EventPersister`) exists per session ID at a time.
pub struct SessionManager {
    event_store: Arc<EventStore>,
    active_sessions: DashMap<String, Arc<ActiveSession>>,
    plan_mode: DashMap<String, bool>,
    tool_result_truncation_bytes: usize,
}

impl SessionManager {
    /// Create a new session manager using the default tool-result truncation limit.
    pub fn new(event_store: Arc<EventStore>) -> Self {
        Self {
            event_store,
            active_sessions: DashMap::new(),
            plan_mode: DashMap::new(),
            tool_result_truncation_bytes: crate::event_persister::DEFAULT_TRUNCATION_BYTES,
        }
    }

    /// Create a session manager using storage settings (tool-result truncation limit).
    pub fn from_settings(event_store: Arc<EventStore>, settings: &substrate_settings::Settings) -> Self {
        Self {
            event_store,
            active_sessions: DashMap::new(),
            plan_mode: DashMap::new(),
            tool_result_truncation_bytes: settings.storage.tool_result_truncation_bytes,
        }
    }

    /// Create a new session.
    #[instrument(skip(self), fields(model, working_dir = workspace_path))]
    pub fn create_session(
        &self,
        model: &str,
        workspace_path: &str,
        title: Option<&str>,
    ) -> Result<String, RuntimeError> {
        let result = self
            .event_store
            .create_session(model, workspace_path, title, None)
            .map_err(RuntimeError::from)?;

        let session_id = result.session.id.clone();

        let state = session_reconstructor::reconstruct(&self.event_store, &session_id)?;

        let ctx = SessionContext::with_truncation_limit(
            session_id.clone(),
            self.event_store.clone(),
            self.tool_result_truncation_bytes,
        );
        let active = Arc::new(ActiveSession { context: ctx, state });

        let _ = self.active_sessions.insert(session_id.clone(), active);
        debug!(session_id, "session created");
        Ok(session_id)
    }

    /// Resume an existing session (reconstruct from events if not already active).
    ///
    /// Fails with `SessionNotFound` if the session does not exist, and with
    /// `SessionEnded` if it has already been ended — an ended session must be
    /// unarchived or forked, not resumed in place.
    #[instrument(skip(self), fields(session_id))]
    pub fn resume_session(&self, session_id: &str) -> Result<Arc<ActiveSession>, RuntimeError> {
        if let Some(existing) = self.active_sessions.get(session_id) {
            return Ok(existing.clone());
        }

        let session = self
            .event_store
            .get_session(session_id)
            .map_err(RuntimeError::from)?
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_owned()))?;
        if session.ended_at.is_some() {
            return Err(RuntimeError::SessionEnded(session_id.to_owned()));
        }

        let state = session_reconstructor::reconstruct(&self.event_store, session_id)?;

        let ctx = SessionContext::with_truncation_limit(
            session_id.to_owned(),
            self.event_store.clone(),
            self.tool_result_truncation_bytes,
        );
        let active = Arc::new(ActiveSession { context: ctx, state });

        let _ = self.active_sessions.insert(session_id.to_owned(), active.clone());
        debug!(session_id, "session resumed");
        Ok(active)
    }

    /// End a session: flush pending events, persist `session.end`, remove from the active map.
    pub async fn end_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        if let Some((_, active)) = self.active_sessions.remove(session_id) {
            active.context.persister.flush().await?;
        }
        let _ = self
            .event_store
            .append(&AppendOptions {
                session_id,
                event_type: EventType::SessionEnd,
                payload: json!({"reason": "completed"}),
                parent_id: None,
            })
            .map_err(RuntimeError::from)?;
        let _ = self.event_store.end_session(session_id).map_err(RuntimeError::from)?;
        Ok(())
    }

    /// Mark an in-flight session as interrupted (e.g. client disconnect, user abort)
    /// without ending it.
    ///
    /// If a turn was in progress, composes its accumulated partial content
    /// into a `message.assistant` (`stopReason: "interrupted"`) and a
    /// `message.user` carrying any completed tool results, then appends
    /// `notification.interrupted`. With no active session (or no turn in
    /// progress) only the notification is appended.
    pub async fn interrupt_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        if let Some(active) = self.active_sessions.get(session_id) {
            active.context.persister.flush().await?;
            active.context.interrupt().await?;
        } else {
            let _ = self
                .event_store
                .append(&AppendOptions {
                    session_id,
                    event_type: EventType::NotificationInterrupted,
                    payload: json!({"turn": 0}),
                    parent_id: None,
                })
                .map_err(RuntimeError::from)?;
        }
        self.invalidate_session(session_id);
        Ok(())
    }

    /// Fork a session from its current head.
    pub fn fork_session(
        &self,
        session_id: &str,
        model: Option<&str>,
        title: Option<&str>,
    ) -> Result<ForkSessionResult, RuntimeError> {
        let session = self
            .event_store
            .get_session(session_id)
            .map_err(RuntimeError::from)?
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_owned()))?;

        let head_event_id = session
            .head_event_id
            .as_deref()
            .ok_or_else(|| RuntimeError::Persistence("Session has no head event".into()))?;

        let forked_from_event_id = head_event_id.to_owned();

        let result = self
            .event_store
            .fork(head_event_id, &ForkOptions { model, title })
            .map_err(RuntimeError::from)?;

        Ok(ForkSessionResult {
            new_session_id: result.session.id,
            root_event_id: result.fork_event.id,
            forked_from_event_id,
        })
    }

    /// Archive a session: remove from active map and mark ended in storage.
    pub fn archive_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        let _ = self.active_sessions.remove(session_id);
        let _ = self.event_store.end_session(session_id).map_err(RuntimeError::from)?;
        Ok(())
    }

    /// Unarchive a session (clears its ended marker; does not re-activate it).
    pub fn unarchive_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        let _ = self
            .event_store
            .clear_session_ended(session_id)
            .map_err(RuntimeError::from)?;
        Ok(())
    }

    /// Delete a session permanently.
    pub fn delete_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        let _ = self.active_sessions.remove(session_id);
        let _ = self.event_store.delete_session(session_id).map_err(RuntimeError::from)?;
        Ok(())
    }

    /// Get session row.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>, RuntimeError> {
        self.event_store.get_session(session_id).map_err(RuntimeError::from)
    }

    /// List sessions.
    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRow>, RuntimeError> {
        let workspace_id = filter
            .workspace_path
            .as_deref()
            .map(|path| self.event_store.get_or_create_workspace(path, None))
            .transpose()
            .map_err(RuntimeError::from)?
            .map(|ws| ws.id);

        let opts = ListSessionsOptions {
            workspace_id: workspace_id.as_deref(),
            ended: if filter.include_archived { None } else { Some(false) },
            #[allow(clippy::cast_possible_wrap)]
            limit: filter.limit.map(|l| l as i64),
            offset: None,
        };
        self.event_store.list_sessions(&opts).map_err(RuntimeError::from)
    }

    /// Check if a session is active.
    pub fn is_active(&self, session_id: &str) -> bool {
        self.active_sessions.contains_key(session_id)
    }

    /// Get the `ActiveSession` handle if the session is already active, without
    /// reconstructing or activating it as a side effect.
    pub fn get_active(&self, session_id: &str) -> Option<Arc<ActiveSession>> {
        self.active_sessions.get(session_id).map(|entry| entry.clone())
    }

    /// Number of active sessions.
    pub fn active_count(&self) -> usize {
        self.active_sessions.len()
    }

    /// Invalidate cached session state, forcing re-reconstruction on next `resume_session`.
    pub fn invalidate_session(&self, session_id: &str) {
        let _ = self.active_sessions.remove(session_id);
    }

    /// Get the event store.
    pub fn event_store(&self) -> &Arc<EventStore> {
        &self.event_store
    }

    // ── Plan mode ──────────────────────────────────────────────────────

    /// Set plan mode for a session.
    pub fn set_plan_mode(&self, session_id: &str, enabled: bool) {
        let _ = self.plan_mode.insert(session_id.to_owned(), enabled);
    }

    /// Check if a session is in plan mode.
    pub fn is_plan_mode(&self, session_id: &str) -> bool {
        self.plan_mode.get(session_id).is_some_and(|v| *v)
    }
}
