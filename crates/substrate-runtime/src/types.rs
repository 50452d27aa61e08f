//! Orchestrator-level configuration and result types.

use serde::{Deserialize, Serialize};

/// Reasoning level attached to a session, mirrored into
/// `config.reasoning_level` events and `SessionRow::latest_reasoning_level`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningLevel {
    /// No reasoning.
    None,
    /// Low reasoning effort.
    Low,
    /// Medium reasoning effort.
    Medium,
    /// High reasoning effort.
    High,
    /// Extra-high reasoning effort.
    #[serde(alias = "xhigh", alias = "x_high")]
    XHigh,
    /// Maximum reasoning effort.
    Max,
}

impl ReasoningLevel {
    /// Parse from a string, case-insensitive.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "xhigh" | "x_high" | "x-high" => Some(Self::XHigh),
            "max" => Some(Self::Max),
            _ => Option::None,
        }
    }
}

impl std::fmt::Display for ReasoningLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::XHigh => "xhigh",
            Self::Max => "max",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_level_loose_parse() {
        assert_eq!(ReasoningLevel::from_str_loose("HIGH"), Some(ReasoningLevel::High));
        assert_eq!(ReasoningLevel::from_str_loose("x-high"), Some(ReasoningLevel::XHigh));
        assert_eq!(ReasoningLevel::from_str_loose("bogus"), None);
    }

    #[test]
    fn reasoning_level_display_roundtrip() {
        for (level, text) in [
            (ReasoningLevel::None, "none"),
            (ReasoningLevel::Low, "low"),
            (ReasoningLevel::Medium, "medium"),
            (ReasoningLevel::High, "high"),
            (ReasoningLevel::XHigh, "xhigh"),
            (ReasoningLevel::Max, "max"),
        ] {
            assert_eq!(level.to_string(), text);
            assert_eq!(ReasoningLevel::from_str_loose(text), Some(level));
        }
    }

    #[test]
    fn reasoning_level_serde() {
        let json = serde_json::to_string(&ReasoningLevel::XHigh).unwrap();
        assert_eq!(json, "\"x_high\"");
        let back: ReasoningLevel = serde_json::from_str("\"xhigh\"").unwrap();
        assert_eq!(back, ReasoningLevel::XHigh);
    }
}
