//! Token and cost counters.

use serde::{Deserialize, Serialize};

/// Cumulative token usage for a loop (or one phase's delta).
///
/// `estimated_cost_usd` is derived from the counters and a rate table; it is
/// written out for readers of the state file but never read back, so a rate
/// change between runs cannot leave a stale dollar figure behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub thinking_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(default, skip_deserializing)]
    pub estimated_cost_usd: f64,
}

impl UsageTotals {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }

    /// Sum of every token counter.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.thinking_tokens)
            .saturating_add(self.cached_tokens)
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens() == 0
    }

    /// Counter-only equality (ignores the derived dollar figure).
    pub fn same_counters(&self, other: &UsageTotals) -> bool {
        self.input_tokens == other.input_tokens
            && self.output_tokens == other.output_tokens
            && self.thinking_tokens == other.thinking_tokens
            && self.cached_tokens == other.cached_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_tokens() {
        let usage = UsageTotals {
            input_tokens: 10,
            output_tokens: 20,
            thinking_tokens: 5,
            cached_tokens: 1,
            estimated_cost_usd: 0.0,
        };
        assert_eq!(usage.total_tokens(), 36);
        assert!(!usage.is_empty());
        assert!(UsageTotals::default().is_empty());
    }

    #[test]
    fn test_cost_not_read_back() {
        let usage = UsageTotals {
            input_tokens: 1_000,
            estimated_cost_usd: 12.5,
            ..Default::default()
        };
        let json = serde_json::to_string(&usage).unwrap();
        assert!(json.contains("estimated_cost_usd"));

        let parsed: UsageTotals = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.input_tokens, 1_000);
        assert_eq!(parsed.estimated_cost_usd, 0.0);
        assert!(parsed.same_counters(&usage));
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let parsed: UsageTotals = serde_json::from_str(r#"{"input_tokens": 7}"#).unwrap();
        assert_eq!(parsed.input_tokens, 7);
        assert_eq!(parsed.output_tokens, 0);
    }
}
