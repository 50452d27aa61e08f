//! Payload shapes for mid-session configuration changes.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSwitchPayload {
    pub previous_model: String,
    pub new_model: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningLevelPayload {
    pub previous_level: String,
    pub new_level: String,
}
