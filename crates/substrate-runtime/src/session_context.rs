//! Per-session mutable state holder.
//!
//! Owns the linearized persister plus the turn-accumulation state needed to
//! honor the turn contract: a `message.assistant` covering everything before
//! the first tool execution, `tool.call`/`tool.result` pairs per tool, a
//! `message.user` re-serializing the completed `tool_result` blocks, and a
//! second `message.assistant` for anything produced after the tools ran. On
//! interruption the same accumulated state is composed into whatever partial
//! messages fit instead of being discarded.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use substrate_events::sqlite::row_types::EventRow;
use substrate_events::types::TokenUsage;
use substrate_events::types::payloads::{
    AssistantMessagePayload, NotificationInterruptedPayload, ToolCallPayload, ToolResultPayload,
    UserMessagePayload,
};
use substrate_events::{EventStore, EventType};

use crate::errors::{RuntimeError, StopReason};
use crate::event_persister::EventPersister;

/// Accumulated state for the turn currently in flight.
#[derive(Debug, Default)]
struct TurnState {
    turn: i64,
    model: String,
    /// Content blocks (text/thinking/`tool_use`) produced before the first
    /// tool execution of the turn.
    pre_tool_content: Vec<Value>,
    /// Content blocks produced after the pre-tool flush, pending the
    /// end-of-turn `message.assistant`.
    post_tool_content: Vec<Value>,
    /// Whether `pre_tool_content` has already been flushed.
    flushed_pre_tool: bool,
    /// Completed `tool_result` content blocks, pending their `message.user`.
    pending_tool_results: Vec<Value>,
}

impl TurnState {
    fn current_content_mut(&mut self) -> &mut Vec<Value> {
        if self.flushed_pre_tool {
            &mut self.post_tool_content
        } else {
            &mut self.pre_tool_content
        }
    }
}

fn to_value(payload: impl serde::Serialize) -> Result<Value, RuntimeError> {
    serde_json::to_value(payload).map_err(|e| RuntimeError::Internal(e.to_string()))
}

/// Per-session runtime state.
pub struct SessionContext {
    /// Session identifier.
    pub session_id: String,
    /// Event persister for this session (Arc-shared so callers can clone it).
    pub persister: Arc<EventPersister>,
    turn: Mutex<TurnState>,
}

impl SessionContext {
    /// Create a new session context using the default tool-result truncation limit.
    pub fn new(session_id: String, event_store: Arc<EventStore>) -> Self {
        let persister = Arc::new(EventPersister::new(event_store, session_id.clone()));
        Self {
            session_id,
            persister,
            turn: Mutex::new(TurnState::default()),
        }
    }

    /// Create a new session context with an explicit tool-result truncation limit.
    pub fn with_truncation_limit(
        session_id: String,
        event_store: Arc<EventStore>,
        truncation_bytes: usize,
    ) -> Self {
        let persister = Arc::new(EventPersister::with_truncation_limit(
            event_store,
            session_id.clone(),
            truncation_bytes,
        ));
        Self {
            session_id,
            persister,
            turn: Mutex::new(TurnState::default()),
        }
    }

    /// Start a new turn, discarding any (already-flushed) state from the previous one.
    pub async fn begin_turn(&self, turn: i64, model: &str) {
        let mut state = self.turn.lock().await;
        *state = TurnState {
            turn,
            model: model.to_owned(),
            ..Default::default()
        };
    }

    /// Accumulate a text/thinking/`tool_use` content block for the turn in flight.
    pub async fn push_content_block(&self, block: Value) {
        let mut state = self.turn.lock().await;
        state.current_content_mut().push(block);
    }

    /// Flush accumulated pre-tool content as a `message.assistant` with
    /// `stop_reason: "tool_use"`. Called on the first tool execution of a
    /// turn; a no-op (returns `Ok(None)`) on later calls within the same turn
    /// or if no content was accumulated.
    pub async fn on_tool_execution_start(
        &self,
        token_usage: TokenUsage,
    ) -> Result<Option<EventRow>, RuntimeError> {
        let flushed = {
            let mut state = self.turn.lock().await;
            if state.flushed_pre_tool || state.pre_tool_content.is_empty() {
                state.flushed_pre_tool = true;
                None
            } else {
                state.flushed_pre_tool = true;
                Some((state.turn, state.model.clone(), std::mem::take(&mut state.pre_tool_content)))
            }
        };
        let Some((turn, model, content)) = flushed else {
            return Ok(None);
        };

        let payload = AssistantMessagePayload {
            content: Value::Array(content),
            turn,
            token_usage,
            token_record: None,
            stop_reason: "tool_use".to_owned(),
            latency: None,
            model,
            has_thinking: None,
        };
        let event = self
            .persister
            .append(&self.session_id, EventType::MessageAssistant, to_value(payload)?)
            .await?;
        Ok(Some(event))
    }

    /// Record a `tool.call` for the turn in flight.
    pub async fn record_tool_call(
        &self,
        tool_call_id: &str,
        name: &str,
        arguments: Value,
    ) -> Result<EventRow, RuntimeError> {
        let turn = self.turn.lock().await.turn;
        let payload = ToolCallPayload {
            tool_call_id: tool_call_id.to_owned(),
            name: name.to_owned(),
            arguments,
            turn,
        };
        self.persister
            .append(&self.session_id, EventType::ToolCall, to_value(payload)?)
            .await
    }

    /// Record a `tool.result` and queue its content for the next `message.user`.
    pub async fn record_tool_result(
        &self,
        tool_call_id: &str,
        content: Value,
        is_error: bool,
        duration: Option<i64>,
    ) -> Result<EventRow, RuntimeError> {
        let payload = ToolResultPayload {
            tool_call_id: tool_call_id.to_owned(),
            content: content.clone(),
            is_error,
            duration,
            truncated: None,
            affected_files: None,
        };
        let event = self
            .persister
            .append(&self.session_id, EventType::ToolResult, to_value(payload)?)
            .await?;

        let mut state = self.turn.lock().await;
        state.pending_tool_results.push(serde_json::json!({
            "type": "tool_result",
            "toolCallId": tool_call_id,
            "content": content,
            "isError": is_error,
        }));
        Ok(event)
    }

    /// Flush completed `tool_result` blocks as a `message.user`, if any are pending.
    pub async fn flush_tool_results(&self) -> Result<Option<EventRow>, RuntimeError> {
        let (turn, results) = {
            let mut state = self.turn.lock().await;
            if state.pending_tool_results.is_empty() {
                return Ok(None);
            }
            (state.turn, std::mem::take(&mut state.pending_tool_results))
        };
        let payload = UserMessagePayload {
            content: Value::Array(results),
            turn,
            image_count: None,
            skills: None,
            spells: None,
        };
        let event = self
            .persister
            .append(&self.session_id, EventType::MessageUser, to_value(payload)?)
            .await?;
        Ok(Some(event))
    }

    /// End the turn: flush any unflushed tool results, then emit a
    /// `message.assistant` for whatever content remains (pre-tool content if
    /// no tool ran this turn, post-tool content otherwise). Returns `None`
    /// for a component that had nothing to emit.
    pub async fn end_turn(
        &self,
        model: &str,
        token_usage: TokenUsage,
        stop_reason: &str,
    ) -> Result<(Option<EventRow>, Option<EventRow>), RuntimeError> {
        let user_event = self.flush_tool_results().await?;

        let (turn, content) = {
            let mut state = self.turn.lock().await;
            (state.turn, std::mem::take(state.current_content_mut()))
        };
        if content.is_empty() {
            return Ok((user_event, None));
        }
        let payload = AssistantMessagePayload {
            content: Value::Array(content),
            turn,
            token_usage,
            token_record: None,
            stop_reason: stop_reason.to_owned(),
            latency: None,
            model: model.to_owned(),
            has_thinking: None,
        };
        let assistant_event = self
            .persister
            .append(&self.session_id, EventType::MessageAssistant, to_value(payload)?)
            .await?;
        Ok((user_event, Some(assistant_event)))
    }

    /// Compose whatever partial content has accumulated this turn into an
    /// interrupted `message.assistant` (and a `message.user` for any
    /// completed tool results), then append `notification.interrupted`.
    ///
    /// Safe to call with no turn in progress: both compositions are skipped
    /// and only the notification is appended.
    pub async fn interrupt(&self) -> Result<EventRow, RuntimeError> {
        let (turn, model, content, pending_results) = {
            let mut state = self.turn.lock().await;
            let content = std::mem::take(state.current_content_mut());
            let pending = std::mem::take(&mut state.pending_tool_results);
            (state.turn, state.model.clone(), content, pending)
        };

        if !content.is_empty() {
            let payload = AssistantMessagePayload {
                content: Value::Array(content),
                turn,
                token_usage: TokenUsage::default(),
                token_record: None,
                stop_reason: StopReason::Interrupted.to_string(),
                latency: None,
                model,
                has_thinking: None,
            };
            let _ = self
                .persister
                .append(&self.session_id, EventType::MessageAssistant, to_value(payload)?)
                .await?;
        }

        if !pending_results.is_empty() {
            let payload = UserMessagePayload {
                content: Value::Array(pending_results),
                turn,
                image_count: None,
                skills: None,
                spells: None,
            };
            let _ = self
                .persister
                .append(&self.session_id, EventType::MessageUser, to_value(payload)?)
                .await?;
        }

        let notif_payload = NotificationInterruptedPayload { turn, reason: None };
        self.persister
            .append(&self.session_id, EventType::NotificationInterrupted, to_value(notif_payload)?)
            .await
    }
}
