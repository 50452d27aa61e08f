//! High-level transactional `EventStore` API.
//!
//! Composes all repository operations into atomic, session-centric methods.
//! Every write method runs inside a single `SQLite` transaction — callers
//! never observe partial state.

use rusqlite::OptionalExtension;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use crate::errors::{EventStoreError, Result};
use crate::reconstruct::{ReconstructionResult, reconstruct_from_events};
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::repositories::blob::BlobRepo;
use crate::sqlite::repositories::branch::BranchRepo;
use crate::sqlite::repositories::device_token::{DeviceTokenRepo, RegisterTokenResult};
use crate::sqlite::repositories::event::{EventRepo, ListEventsOptions, TokenUsageSummary};
use crate::sqlite::repositories::search::{SearchOptions, SearchRepo};
use crate::sqlite::repositories::session::{
    CreateSessionOptions, IncrementCounters, ListSessionsOptions, MessagePreview, SessionRepo,
};
use crate::sqlite::repositories::workspace::WorkspaceRepo;
use crate::sqlite::row_types::{BlobRow, DeviceTokenRow, EventRow, SessionRow, WorkspaceRow};
use crate::types::EventType;
use crate::types::base::SessionEvent;
use crate::types::state::{SearchResult, SessionState};

/// Result of creating a new session.
#[derive(Debug)]
pub struct CreateSessionResult {
    /// The created session.
    pub session: SessionRow,
    /// The root `session.start` event.
    pub root_event: EventRow,
}

/// Result of forking a session.
#[derive(Debug)]
pub struct ForkResult {
    /// The newly created (forked) session.
    pub session: SessionRow,
    /// The root `session.fork` event.
    pub fork_event: EventRow,
}

/// Options for appending an event.
pub struct AppendOptions<'a> {
    /// Session to append to.
    pub session_id: &'a str,
    /// Event type.
    pub event_type: EventType,
    /// Event payload (JSON).
    pub payload: Value,
    /// Explicit parent. If `None`, chains from session head.
    pub parent_id: Option<&'a str>,
}

/// Options for forking a session.
#[derive(Default)]
pub struct ForkOptions<'a> {
    /// Optional model override for the fork.
    pub model: Option<&'a str>,
    /// Optional title for the forked session.
    pub title: Option<&'a str>,
}

/// High-level `EventStore` wrapping a connection pool and all repositories.
///
/// All write methods are transactional — they run inside `SAVEPOINT`/`RELEASE`
/// blocks so callers never see partial state.
///
/// INVARIANT: session writes are serialized per-session via in-process mutex
/// locks (`with_session_write_lock`). Global mutations use a separate global
/// lock. SQLite `UNIQUE(session_id, sequence)` enforces ordering at the DB level.
pub struct EventStore {
    pool: ConnectionPool,
    global_write_lock: Mutex<()>,
    session_write_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl EventStore {
    const SQLITE_BUSY_MAX_RETRIES: u32 = 32;
    /// Create a new `EventStore` with the given connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            global_write_lock: Mutex::new(()),
            session_write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_global_write(&self) -> Result<MutexGuard<'_, ()>> {
        self.global_write_lock
            .lock()
            .map_err(|_| EventStoreError::Internal("global write lock poisoned".into()))
    }

    fn acquire_session_write_lock(&self, session_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .session_write_locks
            .lock()
            .map_err(|_| EventStoreError::Internal("session lock map poisoned".into()))?;

        // Opportunistically prune dead weak refs when the map grows.
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(session_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        let _ = locks.insert(session_id.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    fn with_session_write_lock<T>(
        &self,
        session_id: &str,
        f: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let session_lock = self.acquire_session_write_lock(session_id)?;
        let _guard = session_lock
            .lock()
            .map_err(|_| EventStoreError::Internal("session write lock poisoned".into()))?;
        self.retry_on_sqlite_busy(f)
    }

    fn with_global_write_lock<T>(&self, f: impl FnMut() -> Result<T>) -> Result<T> {
        let _guard = self.lock_global_write()?;
        self.retry_on_sqlite_busy(f)
    }

    /// Retry an operation on `SQLite` BUSY/LOCKED with linear backoff + jitter.
    ///
    /// Backoff: base = min(attempts * 10, 500) ms, jitter ±25% to prevent
    /// thundering herd when multiple writers contend on the same database.
    #[allow(clippy::unused_self)]
    fn retry_on_sqlite_busy<T>(&self, mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;

        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err)
                    if Self::is_sqlite_busy_or_locked(&err)
                        && attempts < Self::SQLITE_BUSY_MAX_RETRIES =>
                {
                    attempts += 1;
                    let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                    let jitter_range = base_ms / 4;
                    let jitter = if jitter_range > 0 {
                        rand::random::<u64>() % (jitter_range * 2 + 1)
                    } else {
                        0
                    };
                    let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_sqlite_busy_or_locked(err: &EventStoreError) -> bool {
        match err {
            EventStoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => {
                matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
            }
            _ => false,
        }
    }

    fn remove_session_write_lock(&self, session_id: &str) -> Result<()> {
        let mut locks = self
            .session_write_locks
            .lock()
            .map_err(|_| EventStoreError::Internal("session lock map poisoned".into()))?;
        let _ = locks.remove(session_id);
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a new session with a root `session.start` event.
    ///
    /// Atomic: workspace creation (get-or-create), session insertion, root event
    /// insertion, head/root pointer updates, and counter increments all happen
    /// in a single transaction.
    #[instrument(skip(self), fields(model, workspace_path))]
    pub fn create_session(
        &self,
        model: &str,
        workspace_path: &str,
        title: Option<&str>,
        provider: Option<&str>,
    ) -> Result<CreateSessionResult> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;

            // 1. Get or create workspace
            let ws = WorkspaceRepo::get_or_create(&tx, workspace_path, None)?;

            // 2. Create session
            let session = SessionRepo::create(
                &tx,
                &CreateSessionOptions {
                    workspace_id: &ws.id,
                    model,
                    working_directory: workspace_path,
                    title,
                    tags: None,
                    parent_session_id: None,
                    fork_from_event_id: None,
                },
            )?;

            // 3. Create root session.start event
            let event_id = format!("evt_{}", Uuid::now_v7());
            let now = chrono::Utc::now().to_rfc3339();
            let provider = provider.unwrap_or_else(|| {
                if model.starts_with("claude-") {
                    "anthropic"
                } else if model.starts_with("gpt-")
                    || model.starts_with("o1-")
                    || model.starts_with("o3-")
                {
                    "openai"
                } else if model.starts_with("gemini-") {
                    "google"
                } else {
                    "anthropic"
                }
            });
            let payload = serde_json::json!({
                "workingDirectory": workspace_path,
                "model": model,
                "provider": provider,
            });
            let event = SessionEvent {
                id: event_id,
                session_id: session.id.clone(),
                parent_id: None,
                workspace_id: ws.id.clone(),
                timestamp: now,
                event_type: EventType::SessionStart,
                sequence: 0,
                checksum: None,
                payload,
            };
            EventRepo::insert(&tx, &event)?;

            // 4. Update session root and head
            let _ = SessionRepo::update_root(&tx, &session.id, &event.id)?;
            let _ = SessionRepo::update_head(&tx, &session.id, &event.id)?;

            // 5. Increment event count
            let _ = SessionRepo::increment_counters(
                &tx,
                &session.id,
                &IncrementCounters {
                    event_count: Some(1),
                    ..Default::default()
                },
            )?;

            tx.commit()?;

            // Re-fetch session to get updated head/root/counters
            let updated_session = SessionRepo::get_by_id(&conn, &session.id)?
                .ok_or(EventStoreError::SessionNotFound(session.id))?;

            // Re-read the event row to get denormalized fields
            let root_event = EventRepo::get_by_id(&conn, &event.id)?
                .ok_or(EventStoreError::EventNotFound(event.id))?;

            debug!(session_id = %updated_session.id, "session created");

            Ok(CreateSessionResult {
                session: updated_session,
                root_event,
            })
        })
    }

    /// Append an event to a session.
    ///
    /// Atomic: sequence generation, event insertion, head update, and counter
    /// increments all happen in a single transaction.
    #[instrument(skip(self, opts), fields(session_id = opts.session_id, event_type = %opts.event_type))]
    pub fn append(&self, opts: &AppendOptions<'_>) -> Result<EventRow> {
        self.with_session_write_lock(opts.session_id, || self.append_inner(opts))
    }

    /// Inner append without acquiring the write lock.
    /// Called by `append` (which holds the lock) and by `delete_message`
    /// (which acquires the lock once at its own level).
    fn append_inner(&self, opts: &AppendOptions<'_>) -> Result<EventRow> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        // 1. Fetch session (must exist and not have ended)
        let session = SessionRepo::get_by_id(&tx, opts.session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(opts.session_id.to_string()))?;
        if session.ended_at.is_some() {
            return Err(EventStoreError::SessionEnded(opts.session_id.to_string()));
        }

        // 2. Resolve parent. An explicit parent_id must belong to this session.
        let parent_event = match opts.parent_id {
            Some(pid) => {
                let parent = EventRepo::get_by_id(&tx, pid)?
                    .ok_or_else(|| EventStoreError::EventNotFound(pid.to_string()))?;
                if parent.session_id != opts.session_id {
                    return Err(EventStoreError::ParentNotFound(pid.to_string()));
                }
                Some(parent)
            }
            None => match &session.head_event_id {
                Some(hid) => EventRepo::get_by_id(&tx, hid)?,
                None => None,
            },
        };
        let parent_id = parent_event.as_ref().map(|e| e.id.clone());

        // 3. Sequence is parent.sequence + 1 on the canonical chain — this is
        // what keeps "sequence monotone along the ancestor chain" true even
        // when that chain crosses a fork into a different session's table.
        let sequence = parent_event.map(|e| e.sequence + 1).unwrap_or(0);

        // 4. Build event (depth is computed by EventRepo::insert)
        let event_id = format!("evt_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();

        let event = SessionEvent {
            id: event_id,
            session_id: opts.session_id.to_string(),
            parent_id,
            workspace_id: session.workspace_id.clone(),
            timestamp: now,
            event_type: opts.event_type,
            sequence,
            checksum: None,
            payload: opts.payload.clone(),
        };

        // 6. Insert (repo extracts denormalized fields from payload)
        EventRepo::insert(&tx, &event)?;

        // 7. Update session head
        let _ = SessionRepo::update_head(&tx, opts.session_id, &event.id)?;

        // 8. Build counter increments
        let mut counters = IncrementCounters {
            event_count: Some(1),
            ..Default::default()
        };

        // Message count
        if matches!(
            opts.event_type,
            EventType::MessageUser | EventType::MessageAssistant
        ) {
            counters.message_count = Some(1);
        }

        // Turn count: increment on each assistant message (one assistant message = one turn)
        if opts.event_type == EventType::MessageAssistant {
            counters.turn_count = Some(1);
        }

        // Token usage from payload
        if let Some(tu) = opts.payload.get("tokenUsage") {
            counters.input_tokens = tu.get("inputTokens").and_then(Value::as_i64);
            counters.output_tokens = tu.get("outputTokens").and_then(Value::as_i64);
            counters.cache_read_tokens = tu.get("cacheReadTokens").and_then(Value::as_i64);
            counters.cache_creation_tokens = tu.get("cacheCreationTokens").and_then(Value::as_i64);

            // Last turn context window: prefer tokenRecord.computed.contextWindowTokens
            // (includes cache reads for Anthropic), fall back to raw inputTokens
            if opts.event_type == EventType::MessageAssistant {
                counters.last_turn_input_tokens = opts
                    .payload
                    .get("tokenRecord")
                    .and_then(|r| r.get("computed"))
                    .and_then(|c| c.get("contextWindowTokens"))
                    .and_then(Value::as_i64)
                    .or_else(|| tu.get("inputTokens").and_then(Value::as_i64));
            }
        }

        // Cost from payload
        if let Some(cost) = opts.payload.get("cost").and_then(Value::as_f64) {
            counters.cost = Some(cost);
        }

        let _ = SessionRepo::increment_counters(&tx, opts.session_id, &counters)?;

        // Model switches update the session's latest_model so
        // get_state_at_head reflects the switch immediately.
        if opts.event_type == EventType::ConfigModelSwitch {
            if let Some(model) = opts.payload.get("model").and_then(Value::as_str) {
                let _ = SessionRepo::update_latest_model(&tx, opts.session_id, model)?;
            }
        }

        tx.commit()?;

        // Re-read the event to get denormalized fields set by insert
        let inserted = EventRepo::get_by_id(&conn, &event.id)?
            .ok_or(EventStoreError::EventNotFound(event.id))?;
        Ok(inserted)
    }

    /// Fork a session from a specific event.
    ///
    /// Creates a new session whose root `session.fork` event has its `parent_id`
    /// pointing into the source session's event tree. Ancestor walks from the
    /// fork event traverse back through the shared history.
    #[instrument(skip(self, opts), fields(from_event_id))]
    pub fn fork(&self, from_event_id: &str, opts: &ForkOptions<'_>) -> Result<ForkResult> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;

            // 1. Fetch source event
            let source_event = EventRepo::get_by_id(&tx, from_event_id)?
                .ok_or_else(|| EventStoreError::EventNotFound(from_event_id.to_string()))?;

            // 2. Fetch source session
            let source_session = SessionRepo::get_by_id(&tx, &source_event.session_id)?
                .ok_or_else(|| EventStoreError::SessionNotFound(source_event.session_id.clone()))?;

            // 3. Create forked session (inherits origin from source)
            let model = opts.model.unwrap_or(&source_session.latest_model);
            let session = SessionRepo::create(
                &tx,
                &CreateSessionOptions {
                    workspace_id: &source_session.workspace_id,
                    model,
                    working_directory: &source_session.working_directory,
                    title: opts.title,
                    tags: None,
                    parent_session_id: Some(&source_session.id),
                    fork_from_event_id: Some(from_event_id),
                },
            )?;

            // 4. Create fork event (parentId points into source tree)
            let event_id = format!("evt_{}", Uuid::now_v7());
            let now = chrono::Utc::now().to_rfc3339();
            let payload = serde_json::json!({
                "sourceSessionId": source_session.id,
                "sourceEventId": from_event_id,
            });

            let fork_event = SessionEvent {
                id: event_id,
                session_id: session.id.clone(),
                parent_id: Some(from_event_id.to_string()),
                workspace_id: source_session.workspace_id.clone(),
                timestamp: now,
                event_type: EventType::SessionFork,
                // parent.sequence + 1, same as a regular append — the fork
                // event's ancestor chain continues into the source session,
                // so it must keep counting up from the source event rather
                // than restarting at 0 in the new session's own table.
                sequence: source_event.sequence + 1,
                checksum: None,
                payload,
            };
            EventRepo::insert(&tx, &fork_event)?;

            // 5. Set root and head
            let _ = SessionRepo::update_root(&tx, &session.id, &fork_event.id)?;
            let _ = SessionRepo::update_head(&tx, &session.id, &fork_event.id)?;

            // 6. Increment event count
            let _ = SessionRepo::increment_counters(
                &tx,
                &session.id,
                &IncrementCounters {
                    event_count: Some(1),
                    ..Default::default()
                },
            )?;

            tx.commit()?;

            let updated_session = SessionRepo::get_by_id(&conn, &session.id)?
                .ok_or(EventStoreError::SessionNotFound(session.id))?;

            let fork_event_row = EventRepo::get_by_id(&conn, &fork_event.id)?
                .ok_or(EventStoreError::EventNotFound(fork_event.id))?;

            debug!(
                new_session_id = %updated_session.id,
                source_session_id = %source_session.id,
                "session forked"
            );

            Ok(ForkResult {
                session: updated_session,
                fork_event: fork_event_row,
            })
        })
    }

    /// Delete a message by appending a `message.deleted` event.
    ///
    /// The target event must be a message event (`message.user`, `message.assistant`,
    /// or `tool.result`). The original event is never modified — deletion is recorded
    /// as a new event and applied during message reconstruction.
    #[instrument(skip(self), fields(session_id, target_event_id))]
    pub fn delete_message(
        &self,
        session_id: &str,
        target_event_id: &str,
        reason: Option<&str>,
    ) -> Result<EventRow> {
        self.with_session_write_lock(session_id, || {
            // Validate target exists and is a message type
            let conn = self.conn()?;
            let target = EventRepo::get_by_id(&conn, target_event_id)?
                .ok_or_else(|| EventStoreError::EventNotFound(target_event_id.to_string()))?;

            let target_type: EventType =
                target
                    .event_type
                    .parse()
                    .map_err(|_| EventStoreError::InvalidOperation("Unknown event type".to_string()))?;

            if !matches!(
                target_type,
                EventType::MessageUser | EventType::MessageAssistant | EventType::ToolResult
            ) {
                return Err(EventStoreError::InvalidOperation(format!(
                    "Cannot delete event of type '{}' — only message and tool result events can be deleted",
                    target.event_type
                )));
            }

            // message_count only tracks message.user/message.assistant (§8 invariant
            // 5); only decrement once per target, on the first tombstone.
            let already_tombstoned = matches!(
                target_type,
                EventType::MessageUser | EventType::MessageAssistant
            ) && EventRepo::get_by_types(&conn, session_id, &["message.deleted"], None)?
                .iter()
                .any(|e| {
                    serde_json::from_str::<Value>(&e.payload)
                        .ok()
                        .and_then(|p| p.get("targetEventId").and_then(Value::as_str).map(str::to_owned))
                        .as_deref()
                        == Some(target_event_id)
                });

            // Append message.deleted event (uses append_inner to avoid re-acquiring lock)
            let event = self.append_inner(&AppendOptions {
                session_id,
                event_type: EventType::MessageDeleted,
                payload: serde_json::json!({
                    "targetEventId": target_event_id,
                    "targetType": target.event_type,
                    "reason": reason.unwrap_or("user_request"),
                }),
                parent_id: None,
            })?;

            if matches!(
                target_type,
                EventType::MessageUser | EventType::MessageAssistant
            ) && !already_tombstoned
            {
                let conn = self.conn()?;
                let _ = SessionRepo::increment_counters(
                    &conn,
                    session_id,
                    &IncrementCounters {
                        message_count: Some(-1),
                        ..Default::default()
                    },
                )?;
            }

            Ok(event)
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event retrieval
    // ─────────────────────────────────────────────────────────────────────

    /// Get a single event by ID.
    pub fn get_event(&self, event_id: &str) -> Result<Option<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_id(&conn, event_id)
    }

    /// Get all events for a session, ordered by sequence.
    pub fn get_events_by_session(
        &self,
        session_id: &str,
        opts: &ListEventsOptions,
    ) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_session(&conn, session_id, opts)
    }

    /// Get ancestor chain from root to the given event (inclusive).
    pub fn get_ancestors(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_ancestors(&conn, event_id)
    }

    /// Get direct children of an event.
    pub fn get_children(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_children(&conn, event_id)
    }

    /// Get all descendants of an event (recursive).
    pub fn get_descendants(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_descendants(&conn, event_id)
    }

    /// Get events inserted after a specific sequence number.
    pub fn get_events_since(&self, session_id: &str, after_sequence: i64) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_since(&conn, session_id, after_sequence)
    }

    /// Get token usage summary for a session.
    pub fn get_token_usage_summary(&self, session_id: &str) -> Result<TokenUsageSummary> {
        let conn = self.conn()?;
        EventRepo::get_token_usage_summary(&conn, session_id)
    }

    /// Batch-fetch events by IDs.
    ///
    /// Returns a map of `event_id → EventRow`. IDs that don't match any event
    /// are silently omitted.
    pub fn get_events_by_ids(&self, event_ids: &[&str]) -> Result<HashMap<String, EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_ids(&conn, event_ids)
    }

    /// Get events of specific types within a session.
    pub fn get_events_by_type(
        &self,
        session_id: &str,
        types: &[&str],
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_types(&conn, session_id, types, limit)
    }

    /// Get events by workspace and types (cross-session query).
    pub fn get_events_by_workspace_and_types(
        &self,
        workspace_id: &str,
        types: &[&str],
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_workspace_and_types(&conn, workspace_id, types, limit, offset)
    }

    /// Count events by workspace and types.
    pub fn count_events_by_workspace_and_types(
        &self,
        workspace_id: &str,
        types: &[&str],
    ) -> Result<i64> {
        let conn = self.conn()?;
        EventRepo::count_by_workspace_and_types(&conn, workspace_id, types)
    }

    /// Count total events in a session.
    pub fn count_events(&self, session_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        EventRepo::count_by_session(&conn, session_id)
    }

    /// Check if a session was interrupted (last turn didn't complete).
    ///
    /// A session is considered interrupted if the last `message.assistant` event
    /// has a higher sequence than the last `stream.turn_end` event, meaning the
    /// turn started but never finished.
    pub fn was_session_interrupted(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let last_assistant_seq: Option<i64> = conn
            .query_row(
                "SELECT MAX(sequence) FROM events WHERE session_id = ?1 AND type = 'message.assistant'",
                rusqlite::params![session_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        let last_turn_end_seq: Option<i64> = conn
            .query_row(
                "SELECT MAX(sequence) FROM events WHERE session_id = ?1 AND type = 'stream.turn_end'",
                rusqlite::params![session_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        match (last_assistant_seq, last_turn_end_seq) {
            // No assistant messages → not interrupted
            (None, _) => Ok(false),
            // Assistant message but no turn_end → interrupted
            (Some(_), None) => Ok(true),
            // Both exist → interrupted if assistant is after turn_end
            (Some(a), Some(t)) => Ok(a > t),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // State projection (message reconstruction)
    // ─────────────────────────────────────────────────────────────────────

    /// Reconstruct messages at the session head.
    ///
    /// Walks ancestors from root to head event, converts to `SessionEvent`s,
    /// and runs the two-pass reconstruction algorithm.
    pub fn get_messages_at_head(&self, session_id: &str) -> Result<ReconstructionResult> {
        let conn = self.conn()?;
        let session = SessionRepo::get_by_id(&conn, session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(session_id.to_string()))?;
        let head_id = session
            .head_event_id
            .as_deref()
            .ok_or_else(|| EventStoreError::InvalidOperation("Session has no head event".into()))?;
        let ancestors = EventRepo::get_ancestors(&conn, head_id)?;
        let events = rows_to_session_events(&ancestors);
        Ok(reconstruct_from_events(&events))
    }

    /// Reconstruct messages at a specific event.
    ///
    /// Walks ancestors from root to the given event, converts to `SessionEvent`s,
    /// and runs the two-pass reconstruction algorithm.
    pub fn get_messages_at(&self, event_id: &str) -> Result<ReconstructionResult> {
        let conn = self.conn()?;
        let ancestors = EventRepo::get_ancestors(&conn, event_id)?;
        if ancestors.is_empty() {
            return Err(EventStoreError::EventNotFound(event_id.to_string()));
        }
        let events = rows_to_session_events(&ancestors);
        Ok(reconstruct_from_events(&events))
    }

    /// Build full session state at the head event.
    ///
    /// Combines session metadata with reconstructed messages.
    pub fn get_state_at_head(&self, session_id: &str) -> Result<SessionState> {
        let conn = self.conn()?;
        let session = SessionRepo::get_by_id(&conn, session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(session_id.to_string()))?;
        let head_id = session
            .head_event_id
            .as_deref()
            .ok_or_else(|| EventStoreError::InvalidOperation("Session has no head event".into()))?;
        let ancestors = EventRepo::get_ancestors(&conn, head_id)?;
        let events = rows_to_session_events(&ancestors);
        let reconstruction = reconstruct_from_events(&events);
        Ok(build_session_state(&session, head_id, reconstruction))
    }

    /// Build full session state at a specific event.
    pub fn get_state_at(&self, session_id: &str, event_id: &str) -> Result<SessionState> {
        let conn = self.conn()?;
        let session = SessionRepo::get_by_id(&conn, session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(session_id.to_string()))?;
        let ancestors = EventRepo::get_ancestors(&conn, event_id)?;
        if ancestors.is_empty() {
            return Err(EventStoreError::EventNotFound(event_id.to_string()));
        }
        let events = rows_to_session_events(&ancestors);
        let reconstruction = reconstruct_from_events(&events);
        Ok(build_session_state(&session, event_id, reconstruction))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session management
    // ─────────────────────────────────────────────────────────────────────

    /// Get session by ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::get_by_id(&conn, session_id)
    }

    /// List sessions with filtering.
    pub fn list_sessions(&self, opts: &ListSessionsOptions<'_>) -> Result<Vec<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::list(&conn, opts)
    }

    /// Mark a session as ended.
    pub fn end_session(&self, session_id: &str) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::mark_ended(&conn, session_id)
        })
    }

    /// Reactivate an ended session.
    pub fn clear_session_ended(&self, session_id: &str) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::clear_ended(&conn, session_id)
        })
    }

    /// Update the latest model for a session.
    pub fn update_latest_model(&self, session_id: &str, model: &str) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::update_latest_model(&conn, session_id, model)
        })
    }

    /// Update session title.
    pub fn update_session_title(&self, session_id: &str, title: Option<&str>) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::update_title(&conn, session_id, title)
        })
    }

    /// Delete a session and all its events.
    #[instrument(skip(self), fields(session_id))]
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let deleted = self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;

            // Delete events first (foreign key constraint)
            let _ = EventRepo::delete_by_session(&tx, session_id)?;
            let _ = BranchRepo::delete_by_session(&tx, session_id)?;
            let deleted = SessionRepo::delete(&tx, session_id)?;

            tx.commit()?;
            Ok(deleted)
        })?;

        if deleted {
            self.remove_session_write_lock(session_id)?;
        }
        Ok(deleted)
    }

    /// Batch-fetch sessions by IDs.
    ///
    /// Returns a map of `session_id → SessionRow`. IDs not found are omitted.
    pub fn get_sessions_by_ids(&self, session_ids: &[&str]) -> Result<HashMap<String, SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::get_by_ids(&conn, session_ids)
    }

    /// Get message previews for a list of sessions.
    ///
    /// Returns the last user prompt and last assistant response per session.
    pub fn get_session_message_previews(
        &self,
        session_ids: &[&str],
    ) -> Result<HashMap<String, MessagePreview>> {
        let conn = self.conn()?;
        SessionRepo::get_message_previews(&conn, session_ids)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Workspace management
    // ─────────────────────────────────────────────────────────────────────

    /// Get workspace by path.
    pub fn get_workspace_by_path(&self, path: &str) -> Result<Option<WorkspaceRow>> {
        let conn = self.conn()?;
        WorkspaceRepo::get_by_path(&conn, path)
    }

    /// Get or create workspace by path.
    pub fn get_or_create_workspace(&self, path: &str, name: Option<&str>) -> Result<WorkspaceRow> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            WorkspaceRepo::get_or_create(&conn, path, name)
        })
    }

    /// List all workspaces.
    pub fn list_workspaces(&self) -> Result<Vec<WorkspaceRow>> {
        let conn = self.conn()?;
        WorkspaceRepo::list(&conn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Blob storage
    // ─────────────────────────────────────────────────────────────────────

    /// Store blob content (SHA-256 deduplicated).
    pub fn store_blob(&self, content: &[u8], mime_type: &str) -> Result<String> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            BlobRepo::store(&conn, content, mime_type)
        })
    }

    /// Get blob content by ID.
    pub fn get_blob_content(&self, blob_id: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        BlobRepo::get_content(&conn, blob_id)
    }

    /// Get full blob metadata.
    pub fn get_blob(&self, blob_id: &str) -> Result<Option<BlobRow>> {
        let conn = self.conn()?;
        BlobRepo::get_by_id(&conn, blob_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────

    /// Full-text search across all events.
    pub fn search(&self, query: &str, opts: &SearchOptions<'_>) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        SearchRepo::search(&conn, query, opts)
    }

    /// Search within a specific session.
    pub fn search_in_session(
        &self,
        session_id: &str,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        SearchRepo::search_in_session(&conn, session_id, query, limit)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Branch management (delegated)
    // ─────────────────────────────────────────────────────────────────────

    /// Get branches for a session.
    pub fn get_branches(
        &self,
        session_id: &str,
    ) -> Result<Vec<crate::sqlite::row_types::BranchRow>> {
        let conn = self.conn()?;
        BranchRepo::get_by_session(&conn, session_id)
    }

    /// Get the raw connection pool (for advanced/custom queries).
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // ─────────────────────────────────────────────────────────────────────
    // Device tokens
    // ─────────────────────────────────────────────────────────────────────

    /// Register or update a device token. Returns `{id, created}`.
    pub fn register_device_token(
        &self,
        device_token: &str,
        session_id: Option<&str>,
        workspace_id: Option<&str>,
        environment: &str,
    ) -> Result<RegisterTokenResult> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            DeviceTokenRepo::register(&conn, device_token, session_id, workspace_id, environment)
        })
    }

    /// Unregister (deactivate) a device token.
    pub fn unregister_device_token(&self, device_token: &str) -> Result<bool> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            DeviceTokenRepo::unregister(&conn, device_token)
        })
    }

    /// Get all active device tokens.
    pub fn get_all_active_device_tokens(&self) -> Result<Vec<DeviceTokenRow>> {
        let conn = self.conn()?;
        DeviceTokenRepo::get_all_active(&conn)
    }

    /// Mark a device token as invalid (e.g., after APNS 410 response).
    pub fn mark_device_token_invalid(&self, device_token: &str) -> Result<bool> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            DeviceTokenRepo::mark_invalid(&conn, device_token)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Convert `EventRow`s to `SessionEvent`s for reconstruction.
///
/// Each `EventRow.payload` is a JSON string; this parses it into `serde_json::Value`.
/// Invalid JSON falls back to `Value::Null`.
fn rows_to_session_events(rows: &[EventRow]) -> Vec<SessionEvent> {
    rows.iter()
        .map(|row| SessionEvent {
            id: row.id.clone(),
            parent_id: row.parent_id.clone(),
            session_id: row.session_id.clone(),
            workspace_id: row.workspace_id.clone(),
            timestamp: row.timestamp.clone(),
            event_type: row.event_type.parse().unwrap_or(EventType::SessionStart),
            sequence: row.sequence,
            checksum: row.checksum.clone(),
            payload: serde_json::from_str(&row.payload).unwrap_or_else(|e| {
                tracing::warn!(event_id = %row.id, error = %e, "corrupt event payload, defaulting to null");
                Value::Null
            }),
        })
        .collect()
}

/// Build `SessionState` from a `SessionRow` and `ReconstructionResult`.
fn build_session_state(
    session: &SessionRow,
    head_event_id: &str,
    reconstruction: ReconstructionResult,
) -> SessionState {
    use crate::types::payloads::TokenUsage;

    SessionState {
        session_id: session.id.clone(),
        workspace_id: session.workspace_id.clone(),
        head_event_id: head_event_id.to_string(),
        model: session.latest_model.clone(),
        working_directory: session.working_directory.clone(),
        messages_with_event_ids: reconstruction.messages_with_event_ids,
        token_usage: TokenUsage {
            input_tokens: session.total_input_tokens,
            output_tokens: session.total_output_tokens,
            cache_read_tokens: Some(session.total_cache_read_tokens),
            cache_creation_tokens: Some(session.total_cache_creation_tokens),
            ..Default::default()
        },
        turn_count: reconstruction.turn_count,
        provider: None,
        system_prompt: reconstruction.system_prompt,
        reasoning_level: reconstruction.reasoning_level,
        metadata: None,
        is_ended: session.ended_at.as_ref().map(|_| true),
        branch: None,
        timestamp: Some(session.last_activity_at.clone()),
        plan_mode: reconstruction.plan_mode,
        blocked_tools: reconstruction.blocked_tools,
        skills: reconstruction.skills,
        todos: reconstruction.todos,
        was_interrupted: reconstruction.was_interrupted,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
