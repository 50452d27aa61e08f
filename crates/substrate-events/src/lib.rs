//! Durable event store and session substrate for the agent platform.
//!
//! Every user message, assistant turn, tool call, and lifecycle transition is
//! appended as an immutable [`types::SessionEvent`] in a tree keyed by
//! `parent_id`. [`store::EventStore`] is the single transactional gateway
//! onto that tree: append, fork, reconstruct, search.

pub mod errors;
pub mod reconstruct;
pub mod sqlite;
pub mod store;
pub mod types;

pub use errors::{EventStoreError, Result};
pub use reconstruct::{ReconstructionResult, reconstruct_from_events};
pub use sqlite::{ConnectionConfig, ConnectionPool};
pub use store::{AppendOptions, CreateSessionResult, EventStore, ForkOptions, ForkResult};
pub use types::{EventType, SessionEvent, SessionState};
