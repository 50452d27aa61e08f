//! Event persister — linearized event writes via MPSC serialization.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use substrate_events::sqlite::row_types::EventRow;
use substrate_events::{AppendOptions, EventStore, EventType};

use crate::errors::RuntimeError;

/// Default truncation budget when a persister isn't built with an explicit one.
pub(crate) const DEFAULT_TRUNCATION_BYTES: usize = 64 * 1024;

/// If `event_type` is `tool.result` and its `content` string exceeds
/// `max_bytes`, truncate it in place and mark `truncated: true`.
///
/// Non-string content (arrays, objects) is left untouched — truncation only
/// applies to the common case of a large plain-text tool result.
fn truncate_tool_result(event_type: EventType, mut payload: Value, max_bytes: usize) -> Value {
    if event_type != EventType::ToolResult {
        return payload;
    }
    let Some(obj) = payload.as_object_mut() else {
        return payload;
    };
    let Some(content) = obj.get("content").and_then(|v| v.as_str()) else {
        return payload;
    };
    if content.len() <= max_bytes {
        return payload;
    }
    let truncated = substrate_core::text::truncate_with_suffix(content, max_bytes, "...[truncated]");
    obj.insert("content".to_owned(), Value::String(truncated));
    let _ = obj.insert("truncated".to_owned(), Value::Bool(true));
    payload
}

/// Request sent to the persist worker.
enum PersistRequest {
    /// Append an event for a session.
    Append {
        session_id: String,
        event_type: EventType,
        payload: Value,
        reply: Option<oneshot::Sender<Result<EventRow, RuntimeError>>>,
    },
    /// Drain marker — replied to once every prior request has been processed.
    Flush { reply: oneshot::Sender<()> },
}

/// Linearized event persister.
///
/// All events for a session are serialized through an MPSC channel to a
/// single consumer task, guaranteeing linear `parent_id` threading even
/// when callers append concurrently.
pub struct EventPersister {
    tx: mpsc::Sender<PersistRequest>,
    worker_handle: tokio::task::JoinHandle<()>,
}

impl EventPersister {
    /// Create a new persister backed by the given event store.
    ///
    /// Spawns a background task that processes events sequentially. Tool
    /// result payloads larger than [`DEFAULT_TRUNCATION_BYTES`] are truncated
    /// before storage; use [`EventPersister::with_truncation_limit`] to
    /// configure a different threshold.
    pub fn new(event_store: Arc<EventStore>, session_id: String) -> Self {
        Self::with_truncation_limit(event_store, session_id, DEFAULT_TRUNCATION_BYTES)
    }

    /// Create a new persister with an explicit tool-result truncation threshold.
    pub fn with_truncation_limit(
        event_store: Arc<EventStore>,
        session_id: String,
        truncation_bytes: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(256);

        let worker_handle = tokio::spawn(persist_worker(rx, event_store, session_id, truncation_bytes));

        Self { tx, worker_handle }
    }

    /// Append an event and wait for persistence.
    pub async fn append(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: Value,
    ) -> Result<EventRow, RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(PersistRequest::Append {
                session_id: session_id.to_owned(),
                event_type,
                payload,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| self.closed_error())?;

        reply_rx
            .await
            .map_err(|_| RuntimeError::Persistence("Persist reply dropped".into()))?
    }

    /// Append an event without waiting for persistence.
    pub fn append_fire_and_forget(&self, session_id: &str, event_type: EventType, payload: Value) {
        if let Err(e) = self.tx.try_send(PersistRequest::Append {
            session_id: session_id.to_owned(),
            event_type,
            payload,
            reply: None,
        }) {
            tracing::warn!(?event_type, error = %e, "fire-and-forget persist dropped: channel full");
        }
    }

    /// Flush all pending events (waits for the queue to drain).
    pub async fn flush(&self) -> Result<(), RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PersistRequest::Flush { reply: reply_tx })
            .await
            .map_err(|_| self.closed_error())?;

        let _ = reply_rx.await;
        Ok(())
    }

    fn closed_error(&self) -> RuntimeError {
        if self.worker_handle.is_finished() {
            RuntimeError::Persistence("Persist worker panicked or exited".into())
        } else {
            RuntimeError::Persistence("Persist channel closed".into())
        }
    }
}

/// Background worker that processes persist requests sequentially.
async fn persist_worker(
    mut rx: mpsc::Receiver<PersistRequest>,
    event_store: Arc<EventStore>,
    _session_id: String,
    truncation_bytes: usize,
) {
    while let Some(req) = rx.recv().await {
        match req {
            PersistRequest::Append {
                session_id,
                event_type,
                payload,
                reply,
            } => {
                let payload = truncate_tool_result(event_type, payload, truncation_bytes);
                let result = event_store.append(&AppendOptions {
                    session_id: &session_id,
                    event_type,
                    payload,
                    parent_id: None,
                });

                if let Some(reply) = reply {
                    let mapped = result.map_err(RuntimeError::from);
                    let _ = reply.send(mapped);
                }
            }
            PersistRequest::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }
}
