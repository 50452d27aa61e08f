//! Broadcast-based event emitter for orchestrator-level notifications.
//!
//! Separate from the event store itself: these are ephemeral, in-process
//! notifications for connected clients, not persisted history.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use substrate_events::sqlite::row_types::EventRow;
use tokio::sync::broadcast;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Notifications pushed to subscribers (UI/RPC layer) outside the event log itself.
/// Outbound only: consumers observe these, nothing constructs them from JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum BroadcastEvent {
    /// A new event was appended to a session's log.
    #[serde(rename = "event_new")]
    EventNew {
        event: Box<EventRow>,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    /// The todo list for a session changed.
    #[serde(rename = "todos_updated")]
    TodosUpdated { session_id: String },
    /// A session's context was cleared.
    #[serde(rename = "context_cleared")]
    ContextCleared { session_id: String },
    /// A compaction run completed for a session.
    #[serde(rename = "compaction_completed")]
    CompactionCompleted { session_id: String },
    /// A session entered plan mode.
    #[serde(rename = "plan.mode_entered")]
    PlanModeEntered { session_id: String },
    /// A session exited plan mode.
    #[serde(rename = "plan.mode_exited")]
    PlanModeExited { session_id: String },
}

impl BroadcastEvent {
    /// The session this notification concerns.
    pub fn session_id(&self) -> &str {
        match self {
            Self::EventNew { session_id, .. }
            | Self::TodosUpdated { session_id }
            | Self::ContextCleared { session_id }
            | Self::CompactionCompleted { session_id }
            | Self::PlanModeEntered { session_id }
            | Self::PlanModeExited { session_id } => session_id,
        }
    }
}

/// Broadcast-based event emitter. Non-blocking: `emit` never awaits.
/// Slow receivers lag and drop missed events rather than stalling the sender.
pub struct EventEmitter {
    tx: broadcast::Sender<BroadcastEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create a new emitter with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit a notification to all subscribers. Returns the number of receivers reached.
    pub fn emit(&self, event: BroadcastEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to notifications emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of notifications emitted.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn todos(session_id: &str) -> BroadcastEvent {
        BroadcastEvent::TodosUpdated {
            session_id: session_id.to_owned(),
        }
    }

    #[test]
    fn emit_with_no_subscribers() {
        let emitter = EventEmitter::new();
        let count = emitter.emit(todos("s1"));
        assert_eq!(count, 0);
        assert_eq!(emitter.emit_count(), 1);
    }

    #[tokio::test]
    async fn emit_and_receive() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        let count = emitter.emit(todos("s1"));
        assert_eq!(count, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id(), "s1");
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let emitter = EventEmitter::new();
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();

        assert_eq!(emitter.subscriber_count(), 2);
        let count = emitter.emit(todos("s1"));
        assert_eq!(count, 2);

        assert_eq!(rx1.recv().await.unwrap().session_id(), "s1");
        assert_eq!(rx2.recv().await.unwrap().session_id(), "s1");
    }

    #[tokio::test]
    async fn dropped_slow_receiver() {
        let emitter = EventEmitter::with_capacity(2);
        let mut rx = emitter.subscribe();

        let _ = emitter.emit(todos("s1"));
        let _ = emitter.emit(todos("s2"));
        let _ = emitter.emit(todos("s3"));

        assert!(rx.recv().await.is_err());
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.subscriber_count(), 0);

        let rx1 = emitter.subscribe();
        assert_eq!(emitter.subscriber_count(), 1);
        drop(rx1);
        assert_eq!(emitter.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn receives_various_event_types() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        let _ = emitter.emit(BroadcastEvent::PlanModeEntered {
            session_id: "s1".into(),
        });
        let _ = emitter.emit(BroadcastEvent::ContextCleared {
            session_id: "s1".into(),
        });

        assert_matches!(rx.recv().await.unwrap(), BroadcastEvent::PlanModeEntered { .. });
        assert_matches!(rx.recv().await.unwrap(), BroadcastEvent::ContextCleared { .. });
    }

    #[test]
    fn serde_tag_roundtrip() {
        let event = BroadcastEvent::CompactionCompleted {
            session_id: "s1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "compaction_completed");
        assert_eq!(json["session_id"], "s1");
    }
}
