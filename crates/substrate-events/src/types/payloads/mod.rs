//! Typed payload shapes, one module per event-kind family.
//!
//! Every [`super::base::SessionEvent`] stores its payload as an opaque
//! `serde_json::Value`; these types exist for producers/consumers that want
//! a typed view and are not enforced by the store itself (payloads are
//! validated only against the required fields each operation reads).

mod compact;
mod config;
mod context;
mod error;
mod extensions;
mod message;
mod message_ops;
mod session;
mod stream;
mod token_usage;
mod tool;

pub use compact::{CompactBoundaryPayload, CompactRange, CompactSummaryPayload};
pub use config::{ModelSwitchPayload, ReasoningLevelPayload};
pub use context::ContextClearedPayload;
pub use error::{ErrorAgentPayload, ErrorProviderPayload};
pub use extensions::{
    NotificationInterruptedPayload, PlanModeEnteredPayload, PlanModeExitedPayload, SkillPayload,
    Todo, TodoWritePayload,
};
pub use message::{AssistantMessagePayload, SystemMessagePayload, UserMessagePayload};
pub use message_ops::MessageDeletedPayload;
pub use session::{ForkSource, SessionEndPayload, SessionForkPayload, SessionStartPayload};
pub use stream::{TurnEndPayload, TurnStartPayload};
pub use token_usage::{TokenRecord, TokenRecordComputed, TokenTotals, TokenUsage};
pub use tool::{ErrorToolPayload, ToolCallPayload, ToolResultPayload};
