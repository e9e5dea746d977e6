//! Timeline report - a human-readable projection of the loop state.
//!
//! Regenerated after every save; never edited by hand and never read back.

use std::fmt::Write as _;
use std::path::Path;

use super::atomic::write_atomic;
use crate::domain::LoopState;
use crate::error::Result;

/// Report file name inside the state directory.
pub const REPORT_FILE: &str = "report.md";

/// Render the timeline as markdown.
pub fn render(state: &LoopState) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Superloop report\n");
    let _ = writeln!(out, "- **Status:** {}", state.status);
    if let Some(reason) = &state.status_reason {
        let _ = writeln!(out, "- **Reason:** {}", reason);
    }
    let _ = writeln!(out, "- **Iteration:** {}", state.iteration);
    if let Some(phase) = &state.current_phase {
        let _ = writeln!(out, "- **Current phase:** {}", phase);
    }
    let _ = writeln!(out, "- **Phases run:** {}", state.history.len());
    let _ = writeln!(out, "- **Stuck counter:** {}", state.stuck_counter);
    let _ = writeln!(out, "- **Updated:** {}", state.updated_at.to_rfc3339());

    let usage = &state.cost_totals;
    let _ = writeln!(out, "\n## Usage\n");
    let _ = writeln!(out, "| input | output | thinking | cached | est. cost (USD) |");
    let _ = writeln!(out, "|---:|---:|---:|---:|---:|");
    let _ = writeln!(
        out,
        "| {} | {} | {} | {} | {:.4} |",
        usage.input_tokens, usage.output_tokens, usage.thinking_tokens, usage.cached_tokens, usage.estimated_cost_usd
    );

    let _ = writeln!(out, "\n## Timeline\n");
    if state.history.is_empty() {
        let _ = writeln!(out, "_No phases have run yet._");
    } else {
        let _ = writeln!(out, "| # | iter | phase | started | duration | exit | attempts | promise | output |");
        let _ = writeln!(out, "|---:|---:|---|---|---:|---|---:|---|---|");
        for (idx, record) in state.history.iter().enumerate() {
            let exit = match &record.reason {
                Some(reason) => format!("{} ({})", record.exit_status, escape_cell(reason)),
                None => record.exit_status.to_string(),
            };
            let attempts = if record.rate_limited {
                format!("{} (rate limited)", record.attempts)
            } else {
                record.attempts.to_string()
            };
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} | {} | `{}` |",
                idx,
                record.iteration,
                record.phase,
                record.started_at.format("%Y-%m-%d %H:%M:%S"),
                format_duration(record.duration_ms),
                exit,
                attempts,
                record.promise_found.as_deref().map(escape_cell).unwrap_or_else(|| "-".to_string()),
                record.output_path.display()
            );
        }
    }

    if !state.gate_log.is_empty() {
        let _ = writeln!(out, "\n## Gate evaluations\n");
        for summary in &state.gate_log {
            let verdict = if summary.passed { "pass" } else { "fail" };
            let anchor = summary
                .record_index
                .map(|i| format!(" after #{}", i))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "- iteration {}{}: **{}** - {}",
                summary.iteration,
                anchor,
                verdict,
                summary.detail
            );
        }
    }

    out
}

/// Render and atomically write the report.
pub fn write_report(path: &Path, state: &LoopState) -> Result<()> {
    write_atomic(path, render(state).as_bytes())?;
    Ok(())
}

fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1_000)
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
