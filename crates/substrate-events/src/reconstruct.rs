//! Two-pass state reconstruction from an ancestor chain of events.
//!
//! Pass 1 walks the chain root→target accumulating messages, config, and
//! extension state. Pass 2 applies `message.deleted` tombstones collected
//! during pass 1, so a deletion can reference any earlier event regardless
//! of how far back it occurred.

use std::collections::BTreeSet;

use crate::types::base::SessionEvent;
use crate::types::generated::EventType;
use crate::types::payloads::{
    AssistantMessagePayload, MessageDeletedPayload, Todo, TodoWritePayload, UserMessagePayload,
};
use crate::types::state::{Message, MessageWithEventId};

/// Output of walking one ancestor chain.
#[derive(Debug, Default)]
pub struct ReconstructionResult {
    pub messages_with_event_ids: Vec<MessageWithEventId>,
    pub turn_count: i64,
    pub system_prompt: Option<String>,
    pub reasoning_level: Option<String>,
    pub plan_mode: bool,
    pub blocked_tools: BTreeSet<String>,
    pub skills: BTreeSet<String>,
    pub todos: Vec<Todo>,
    pub was_interrupted: bool,
}

/// Reconstruct messages and ancillary state from an ordered (root→target)
/// slice of events.
///
/// `events` must already be in root-to-descendant order — callers get this
/// for free from `EventRepo::get_ancestors`.
#[must_use]
pub fn reconstruct_from_events(events: &[SessionEvent]) -> ReconstructionResult {
    let mut messages: Vec<MessageWithEventId> = Vec::new();
    let mut tombstones: Vec<MessageDeletedPayload> = Vec::new();
    let mut result = ReconstructionResult::default();
    let mut turn_ended_since_interrupt = true;

    for event in events {
        match event.event_type {
            EventType::SessionStart | EventType::SessionFork => {
                if let Some(sp) = event.payload.get("systemPrompt").and_then(|v| v.as_str()) {
                    result.system_prompt = Some(sp.to_string());
                }
            }
            EventType::MessageUser => {
                if let Ok(payload) =
                    serde_json::from_value::<UserMessagePayload>(event.payload.clone())
                {
                    messages.push(MessageWithEventId {
                        message: Message {
                            role: "user".to_string(),
                            content: payload.content,
                            tool_call_id: None,
                            is_error: None,
                        },
                        event_ids: vec![Some(event.id.clone())],
                    });
                }
            }
            EventType::MessageAssistant => {
                if let Ok(payload) =
                    serde_json::from_value::<AssistantMessagePayload>(event.payload.clone())
                {
                    result.turn_count += 1;
                    messages.push(MessageWithEventId {
                        message: Message {
                            role: "assistant".to_string(),
                            content: payload.content,
                            tool_call_id: None,
                            is_error: None,
                        },
                        event_ids: vec![Some(event.id.clone())],
                    });
                }
            }
            EventType::ToolCall | EventType::ToolResult => {
                // Not emitted as standalone messages: the result is re-persisted
                // inside a subsequent `message.user`'s `tool_result` content block,
                // which is what actually drives the reconstructed transcript.
            }
            EventType::MessageDeleted => {
                if let Ok(payload) =
                    serde_json::from_value::<MessageDeletedPayload>(event.payload.clone())
                {
                    tombstones.push(payload);
                }
            }
            EventType::ConfigReasoningLevel => {
                if let Some(level) = event.payload.get("newLevel").and_then(|v| v.as_str()) {
                    result.reasoning_level = Some(level.to_string());
                }
            }
            EventType::PlanModeEntered => {
                result.plan_mode = true;
                result.blocked_tools = event
                    .payload
                    .get("blockedTools")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
            }
            EventType::PlanModeExited => {
                result.plan_mode = false;
                result.blocked_tools.clear();
            }
            EventType::SkillAdded => {
                if let Some(name) = event.payload.get("skillName").and_then(|v| v.as_str()) {
                    let _ = result.skills.insert(name.to_string());
                }
            }
            EventType::SkillRemoved => {
                if let Some(name) = event.payload.get("skillName").and_then(|v| v.as_str()) {
                    let _ = result.skills.remove(name);
                }
            }
            EventType::TodoWrite => {
                if let Ok(payload) =
                    serde_json::from_value::<TodoWritePayload>(event.payload.clone())
                {
                    result.todos = payload.todos;
                }
            }
            EventType::NotificationInterrupted => {
                result.was_interrupted = true;
                turn_ended_since_interrupt = false;
            }
            EventType::StreamTurnEnd | EventType::SessionEnd => {
                turn_ended_since_interrupt = true;
            }
            _ => {}
        }
    }

    result.was_interrupted = result.was_interrupted && !turn_ended_since_interrupt;

    apply_tombstones(&mut messages, &tombstones);
    result.messages_with_event_ids = messages;
    result
}

fn apply_tombstones(messages: &mut Vec<MessageWithEventId>, tombstones: &[MessageDeletedPayload]) {
    if tombstones.is_empty() {
        return;
    }
    let deleted: BTreeSet<&str> = tombstones.iter().map(|t| t.target_event_id.as_str()).collect();
    messages.retain(|m| {
        !m.event_ids
            .iter()
            .any(|id| id.as_deref().is_some_and(|id| deleted.contains(id)))
    });
}
