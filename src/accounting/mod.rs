//! Usage accounting - running token totals and cost estimation.
//!
//! Totals are cumulative across the whole loop. The dollar estimate is
//! always recomputed from the raw counters with the current rate table.

use serde::{Deserialize, Serialize};

use crate::domain::{LoopState, UsageTotals};

/// Add a phase's usage delta to the running totals.
///
/// Field-wise saturating addition over the token counters; the returned
/// totals carry no cost estimate until priced with a [`RateTable`].
pub fn accumulate(previous: &UsageTotals, delta: &UsageTotals) -> UsageTotals {
    UsageTotals {
        input_tokens: previous.input_tokens.saturating_add(delta.input_tokens),
        output_tokens: previous.output_tokens.saturating_add(delta.output_tokens),
        thinking_tokens: previous.thinking_tokens.saturating_add(delta.thinking_tokens),
        cached_tokens: previous.cached_tokens.saturating_add(delta.cached_tokens),
        estimated_cost_usd: 0.0,
    }
}

/// Price per million tokens, in USD.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RateTable {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
    pub thinking_per_mtok: f64,
    pub cached_per_mtok: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            input_per_mtok: 3.0,
            output_per_mtok: 15.0,
            thinking_per_mtok: 15.0,
            cached_per_mtok: 0.30,
        }
    }
}

impl RateTable {
    /// Estimated cost of the given counters.
    pub fn price(&self, usage: &UsageTotals) -> f64 {
        const MTOK: f64 = 1_000_000.0;
        (usage.input_tokens as f64 * self.input_per_mtok
            + usage.output_tokens as f64 * self.output_per_mtok
            + usage.thinking_tokens as f64 * self.thinking_per_mtok
            + usage.cached_tokens as f64 * self.cached_per_mtok)
            / MTOK
    }

    /// Copy of `usage` with `estimated_cost_usd` recomputed.
    pub fn priced(&self, usage: &UsageTotals) -> UsageTotals {
        UsageTotals {
            estimated_cost_usd: self.price(usage),
            ..usage.clone()
        }
    }

    /// Recompute every dollar figure of a loaded state: the loop totals and
    /// each phase record's usage.
    pub fn reprice(&self, state: &mut LoopState) {
        state.cost_totals = self.priced(&state.cost_totals);
        for usage in state.history.iter_mut().filter_map(|r| r.usage.as_mut()) {
            usage.estimated_cost_usd = self.price(usage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64, thinking: u64, cached: u64) -> UsageTotals {
        UsageTotals {
            input_tokens: input,
            output_tokens: output,
            thinking_tokens: thinking,
            cached_tokens: cached,
            estimated_cost_usd: 0.0,
        }
    }

    #[test]
    fn test_accumulate_two_deltas() {
        let totals = accumulate(&UsageTotals::default(), &UsageTotals::new(100, 50));
        let totals = accumulate(&totals, &UsageTotals::new(200, 30));
        assert_eq!(totals.input_tokens, 300);
        assert_eq!(totals.output_tokens, 80);
    }

    #[test]
    fn test_accumulate_is_commutative_and_associative() {
        let a = usage(1, 2, 3, 4);
        let b = usage(10, 20, 30, 40);
        let c = usage(100, 200, 300, 400);

        assert_eq!(accumulate(&a, &b), accumulate(&b, &a));
        assert_eq!(
            accumulate(&accumulate(&a, &b), &c),
            accumulate(&a, &accumulate(&b, &c))
        );
    }

    #[test]
    fn test_accumulate_saturates() {
        let totals = accumulate(&usage(u64::MAX, 0, 0, 0), &usage(5, 0, 0, 0));
        assert_eq!(totals.input_tokens, u64::MAX);
    }

    #[test]
    fn test_price_uses_rates() {
        let rates = RateTable {
            input_per_mtok: 2.0,
            output_per_mtok: 10.0,
            thinking_per_mtok: 10.0,
            cached_per_mtok: 0.5,
        };
        let cost = rates.price(&usage(1_000_000, 500_000, 0, 2_000_000));
        assert!((cost - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_priced_recomputes_rather_than_trusting_old_figure() {
        let mut stale = usage(1_000_000, 0, 0, 0);
        stale.estimated_cost_usd = 999.0;
        let priced = RateTable::default().priced(&stale);
        assert!((priced.estimated_cost_usd - 3.0).abs() < 1e-9);
        assert!(priced.same_counters(&stale));
    }

    #[test]
    fn test_reprice_covers_totals_and_every_record() {
        use crate::domain::{ExitStatus, PhaseRecord};

        let mut state = LoopState::new();
        state.cost_totals = usage(2_000_000, 0, 0, 0);
        for (phase, record_usage) in [("planner", Some(usage(1_000_000, 0, 0, 0))), ("tester", None)] {
            state.append_record(PhaseRecord {
                iteration: 0,
                phase: phase.to_string(),
                started_at: chrono::Utc::now(),
                duration_ms: 1,
                exit_status: ExitStatus::Success,
                exit_code: Some(0),
                promise_found: None,
                output_path: std::path::PathBuf::from("out.log"),
                attempts: 1,
                rate_limited: false,
                reason: None,
                usage: record_usage,
            });
        }

        RateTable::default().reprice(&mut state);
        assert!((state.cost_totals.estimated_cost_usd - 6.0).abs() < 1e-9);
        let planner = state.history[0].usage.as_ref().unwrap();
        assert!((planner.estimated_cost_usd - 3.0).abs() < 1e-9);
        assert!(state.history[1].usage.is_none());
    }
}
