//! Text rendering for `/ext-prof status` and `/ext-prof report`

use crate::collector::CollectorStats;
use extprof_types::{Coverage, ExtensionSummary, HandlerAggregate, OverheadSample, PatchStatus};
use std::fmt::Write;

/// Marker appended to the budget line when observed overhead exceeds the goal
pub const OVER_BUDGET_MARKER: &str = "⚠ over budget";

/// Inputs for [`format_status`]
#[derive(Debug, Clone)]
pub struct StatusView<'a> {
    /// Whether recording is currently on
    pub enabled: bool,
    /// Cached result of the one patch attempt
    pub patch: &'a PatchStatus,
    /// Surfaces that actually had callables wrapped
    pub coverage: Coverage,
    /// Cap counters, shown when present
    pub stats: Option<CollectorStats>,
}

/// Budget line inputs for [`format_verbose_report`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverheadView {
    /// Overhead goal as a percentage of baseline
    pub goal_pct: f64,
    /// Last observed overhead percentage, if one was measured
    pub observed_pct: Option<f64>,
}

/// One extension with its handlers, in report order
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionRow {
    /// Extension totals
    pub summary: ExtensionSummary,
    /// Handlers registered by this extension, most expensive first
    pub handlers: Vec<HandlerAggregate>,
}

/// Percentage overhead of `profiled_ms` over `baseline_ms`.
///
/// A non-positive baseline yields `0.0`.
#[must_use]
pub fn compute_overhead_pct(sample: OverheadSample) -> f64 {
    if sample.baseline_ms <= 0.0 {
        return 0.0;
    }
    (sample.profiled_ms - sample.baseline_ms) * 100.0 / sample.baseline_ms
}

/// Fixed-field status block, one field per line
#[must_use]
pub fn format_status(view: &StatusView<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ext-prof: {}", if view.enabled { "on" } else { "off" });
    let _ = writeln!(out, "patch: {}", view.patch.reason);
    let _ = writeln!(out, "events: {}", view.coverage.events);
    let _ = writeln!(out, "commands: {}", view.coverage.commands);
    let _ = write!(out, "tools: {}", view.coverage.tools);
    if let Some(stats) = view.stats {
        let _ = write!(
            out,
            "\nhandler keys: {}/{} (dropped {})",
            stats.handler_keys, stats.max_handler_keys, stats.dropped_new_keys
        );
    }
    out
}

/// Group handler aggregates under their extension.
///
/// Both inputs are expected in summary order; that order is preserved.
#[must_use]
pub fn build_extension_rows(
    extensions: Vec<ExtensionSummary>,
    handlers: &[HandlerAggregate],
) -> Vec<ExtensionRow> {
    extensions
        .into_iter()
        .map(|summary| {
            let handlers = handlers
                .iter()
                .filter(|handler| handler.extension == summary.extension)
                .cloned()
                .collect();
            ExtensionRow { summary, handlers }
        })
        .collect()
}

/// Multi-line report: budget header, then one line per extension followed by
/// its indented handlers
#[must_use]
pub fn format_verbose_report(rows: &[ExtensionRow], patch_reason: &str, overhead: &OverheadView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ext-prof report (patch: {patch_reason})");

    let _ = write!(out, "overhead budget: {:.2}%", overhead.goal_pct);
    if let Some(observed) = overhead.observed_pct {
        let _ = write!(out, ", observed {observed:.2}%");
        if observed > overhead.goal_pct {
            let _ = write!(out, " {OVER_BUDGET_MARKER}");
        }
    }
    out.push('\n');

    if rows.is_empty() {
        out.push_str("no samples recorded");
        return out;
    }

    for row in rows {
        let stats = &row.summary.stats;
        let _ = writeln!(
            out,
            "{} total={:.2}ms calls={} avg={:.2}ms max={:.2}ms errors={}",
            row.summary.extension,
            stats.total_duration_ms,
            stats.call_count,
            stats.average_ms(),
            stats.max_duration_ms,
            stats.error_count
        );
        for handler in &row.handlers {
            let _ = writeln!(
                out,
                "  {}:{} total={:.2}ms calls={} max={:.2}ms errors={}",
                handler.surface,
                handler.name,
                handler.stats.total_duration_ms,
                handler.stats.call_count,
                handler.stats.max_duration_ms,
                handler.stats.error_count
            );
        }
    }

    out.trim_end().to_string()
}
