//! Plain row structs returned by the `sqlite` repositories.
//!
//! These mirror table columns directly (including denormalized fields used
//! for search and aggregation) rather than the wire-facing types in
//! [`crate::types::state`].

/// A workspace row, with a computed session count.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceRow {
    pub id: String,
    pub path: String,
    pub name: Option<String>,
    pub created_at: String,
    pub last_activity_at: String,
    pub session_count: Option<i64>,
}

/// A session row.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRow {
    pub id: String,
    pub workspace_id: String,
    pub latest_model: String,
    pub latest_reasoning_level: Option<String>,
    pub working_directory: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub root_event_id: Option<String>,
    pub head_event_id: Option<String>,
    pub event_count: i64,
    pub message_count: i64,
    pub turn_count: i64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub last_turn_input_tokens: i64,
    pub total_cache_read_tokens: i64,
    pub total_cache_creation_tokens: i64,
    pub total_cost: f64,
    pub parent_session_id: Option<String>,
    pub fork_from_event_id: Option<String>,
    pub ended_at: Option<String>,
    pub created_at: String,
    pub last_activity_at: String,
}

/// An event row, including denormalized fields extracted from the payload
/// for use by search, filtering, and aggregation queries without a JSON parse.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct EventRow {
    pub id: String,
    pub session_id: String,
    pub workspace_id: String,
    pub parent_id: Option<String>,
    pub sequence: i64,
    pub depth: i64,
    pub event_type: String,
    pub timestamp: String,
    pub payload: String,
    pub checksum: Option<String>,
    pub content_blob_id: Option<String>,
    pub role: Option<String>,
    pub tool_name: Option<String>,
    pub tool_call_id: Option<String>,
    pub turn: Option<i64>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cache_read_tokens: Option<i64>,
    pub cache_creation_tokens: Option<i64>,
    pub model: Option<String>,
    pub latency_ms: Option<i64>,
    pub stop_reason: Option<String>,
    pub has_thinking: Option<bool>,
    pub provider_type: Option<String>,
    pub cost: Option<f64>,
}

/// A branch row (named position within one session's event tree).
#[derive(Clone, Debug, PartialEq)]
pub struct BranchRow {
    pub id: String,
    pub session_id: String,
    pub name: String,
    pub description: Option<String>,
    pub root_event_id: String,
    pub head_event_id: String,
    pub is_default: bool,
    pub created_at: String,
    pub last_activity_at: String,
}

/// A content-addressed blob row.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobRow {
    pub id: String,
    pub hash: String,
    pub content: Vec<u8>,
    pub mime_type: String,
    pub size_original: i64,
    pub size_compressed: i64,
    pub compression: String,
    pub created_at: String,
    pub ref_count: i64,
}

/// A registered push-notification device token.
///
/// The store treats the token as an opaque string — it neither sends
/// notifications nor interprets the token's contents.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceTokenRow {
    pub id: String,
    pub device_token: String,
    pub session_id: Option<String>,
    pub workspace_id: Option<String>,
    pub platform: String,
    pub environment: String,
    pub created_at: String,
    pub last_used_at: String,
    pub is_active: bool,
}
