//! Payload shapes for turn stream boundaries: `stream.turn_start`, `stream.turn_end`.

use serde::{Deserialize, Serialize};

use super::token_usage::TokenUsage;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStartPayload {
    pub turn: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnEndPayload {
    pub turn: i64,
    pub token_usage: TokenUsage,
}
