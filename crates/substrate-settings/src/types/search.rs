//! Full-text search result limits.

use serde::{Deserialize, Serialize};

/// Search configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSettings {
    /// Result limit applied when a search request does not specify one.
    pub default_result_limit: i64,
    /// Hard ceiling on the result limit a caller may request.
    pub max_result_limit: i64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_result_limit: 20,
            max_result_limit: 200,
        }
    }
}
