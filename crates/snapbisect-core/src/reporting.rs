//! Text rendering of bisection results and snapshot listings.

use std::fmt::Write;

use crate::domain::{CommitSummary, SnapshotCatalog};
use crate::engine::BisectReport;
use crate::ordering::CommitOrder;

fn full_line(summary: &CommitSummary) -> String {
    match &summary.description {
        Some(desc) => format!(
            "{} ({}) {}",
            summary.id,
            desc.timestamp.to_rfc3339(),
            desc.subject
        ),
        None => summary.id.to_string(),
    }
}

/// Human-readable report for a converged search.
pub fn render_report(report: &BisectReport) -> String {
    let mut out = String::new();
    writeln!(out, "Bisection converged after {} step(s).", report.steps.len()).ok();
    writeln!(out).ok();
    writeln!(out, "Last good: {}", full_line(&report.last_good)).ok();
    writeln!(out, "First bad: {}", full_line(&report.first_bad)).ok();

    if !report.steps.is_empty() {
        writeln!(out).ok();
        writeln!(out, "Steps:").ok();
        for (n, step) in report.steps.iter().enumerate() {
            writeln!(
                out,
                "  {:>3}. [{:>5}] {} -> {}",
                n + 1,
                step.index,
                step.commit.short(),
                step.verdict
            )
            .ok();
        }
    }
    out
}

/// One line per snapshot-backed commit, oldest first.
pub fn render_catalog(order: &CommitOrder, catalog: &SnapshotCatalog) -> String {
    let mut out = String::new();
    for (index, id) in order.iter().enumerate() {
        let name = catalog.get(id).map(|l| l.name.as_str()).unwrap_or("-");
        writeln!(out, "{index:>5}  {}  {name}", id.short()).ok();
    }
    out
}
