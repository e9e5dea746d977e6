//! Token usage extraction from JSON-lines session logs.
//!
//! Agent CLIs that stream JSON emit `usage` objects either per message or in
//! a final `result` record. The final record already holds the session total,
//! so when one is present it wins; otherwise per-message usages are summed.

use serde_json::Value;

use crate::accounting::accumulate;
use crate::domain::UsageTotals;

const THINKING_KEYS: &[&str] = &["thinking_tokens", "reasoning_tokens", "reasoning_output_tokens"];
const CACHED_KEYS: &[&str] = &["cache_read_input_tokens", "cached_tokens", "cached_input_tokens"];

/// Extract usage counters from session-log text. Never fails; lines that are
/// not JSON objects, or carry no recognizable counters, are skipped.
pub fn extract_usage(text: &str) -> Option<UsageTotals> {
    let mut result_usage = None;
    let mut summed: Option<UsageTotals> = None;

    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let Some(usage) = usage_object(&record).and_then(parse_usage) else {
            continue;
        };

        if record.get("type").and_then(|t| t.as_str()) == Some("result") {
            result_usage = Some(usage);
        } else {
            summed = Some(match summed {
                Some(prev) => accumulate(&prev, &usage),
                None => usage,
            });
        }
    }

    result_usage.or(summed)
}

fn usage_object(record: &Value) -> Option<&Value> {
    record
        .get("usage")
        .or_else(|| record.get("message").and_then(|m| m.get("usage")))
        .filter(|u| u.is_object())
}

/// Parse one usage object; None when no known counter is present.
fn parse_usage(usage: &Value) -> Option<UsageTotals> {
    let input = counter(usage, &["input_tokens"]);
    let output = counter(usage, &["output_tokens"]);
    let thinking = counter(usage, THINKING_KEYS);
    let cached = counter(usage, CACHED_KEYS);

    if input.is_none() && output.is_none() && thinking.is_none() && cached.is_none() {
        return None;
    }

    Some(UsageTotals {
        input_tokens: input.unwrap_or(0),
        output_tokens: output.unwrap_or(0),
        thinking_tokens: thinking.unwrap_or(0),
        cached_tokens: cached.unwrap_or(0),
        estimated_cost_usd: 0.0,
    })
}

fn counter(usage: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| usage.get(*k).and_then(|v| v.as_u64()))
}
