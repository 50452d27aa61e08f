//! Token accounting types shared across message and session-end payloads.

use serde::{Deserialize, Serialize};

/// Token counts for a single turn or aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<i64>,
}

impl TokenUsage {
    #[must_use]
    pub fn total(&self) -> i64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_read_tokens.unwrap_or(0)
            + self.cache_creation_tokens.unwrap_or(0)
    }

    #[must_use]
    pub fn add(&self, other: &TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            cache_read_tokens: Some(
                self.cache_read_tokens.unwrap_or(0) + other.cache_read_tokens.unwrap_or(0),
            ),
            cache_creation_tokens: Some(
                self.cache_creation_tokens.unwrap_or(0) + other.cache_creation_tokens.unwrap_or(0),
            ),
        }
    }
}

/// Computed, derived token figures attached to a message payload.
///
/// `context_window_tokens` is the provider's reported size of the context
/// window actually consumed by this turn, which for providers with cache
/// reads can differ from raw `inputTokens` (cache reads count toward the
/// window but are billed separately).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecordComputed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub usage: TokenUsage,
    #[serde(default)]
    pub computed: TokenRecordComputed,
}

/// Running totals attached to session summaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTotals {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_creation_tokens: i64,
}
