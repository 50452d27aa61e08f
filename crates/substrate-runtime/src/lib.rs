//! # substrate-runtime
//!
//! Session orchestrator core sitting on top of `substrate-events`.
//!
//! - **Event persister**: MPSC-serialized writer guaranteeing linear
//!   `parent_id` threading for a single session's appends.
//! - **Session context**: per-session holder of the persister.
//! - **Session reconstructor**: gateway to point-in-time state reconstruction
//!   used when resuming a session.
//! - **Session manager**: active session lifecycle (create/resume/end/fork/
//!   archive/delete), plan-mode tracking, interruption handling.
//! - **Orchestrator**: multi-session coordinator sitting above the session
//!   manager — run tracking with `SessionBusy`/`ServerBusy` ceilings, tool-call
//!   tracking, broadcast notifications, and the idle-session sweep.
//!
//! Event producers (LLM provider calls, tool execution, browser automation,
//! tmux subagents, worktree management) live outside this crate; this crate
//! only records and replays what they emit.
//!
//! ## Crate Position
//!
//! Depends on: substrate-events.
//! Depended on by: the RPC/UI layer (out of scope here).

#![deny(unsafe_code)]

pub mod broadcast;
pub mod errors;
pub mod event_persister;
pub mod orchestrator;
pub mod session_context;
pub mod session_manager;
pub mod session_reconstructor;
pub mod tool_call_tracker;
pub mod types;

pub use broadcast::{BroadcastEvent, EventEmitter};
pub use errors::{RuntimeError, StopReason};
pub use event_persister::EventPersister;
pub use orchestrator::Orchestrator;
pub use session_context::SessionContext;
pub use session_manager::{ActiveSession, ForkSessionResult, SessionFilter, SessionManager};
pub use tool_call_tracker::ToolCallTracker;
pub use types::ReasoningLevel;
