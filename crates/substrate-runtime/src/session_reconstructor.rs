//! Session reconstructor — rebuild session state from event history for resume.

use substrate_events::{EventStore, SessionState};

use crate::errors::RuntimeError;

/// Reconstruct a session's current state from its event history.
///
/// This is the gateway the orchestrator calls on `resume_session`: it
/// delegates entirely to the event store's point-in-time reconstruction
/// rather than re-deriving state from raw events itself.
pub fn reconstruct(event_store: &EventStore, session_id: &str) -> Result<SessionState, RuntimeError> {
    event_store
        .get_state_at_head(session_id)
        .map_err(RuntimeError::from)
}
