//! Payload shape for `context.cleared`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextClearedPayload {
    pub tokens_before: i64,
    pub tokens_after: i64,
    pub reason: String,
}
