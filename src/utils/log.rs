// src/utils/log.rs

//! Console presentation helpers layered on the `log` facade.
//!
//! Regular diagnostics use `log::info!` and friends directly; these helpers
//! render banners and summaries for CLI runs.

use crate::models::{CycleReport, Posting};

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    log::info!("    {}", message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}

/// Summarize a finished cycle.
pub fn cycle_summary(report: &CycleReport) {
    let duration = match (report.started_at, report.finished_at) {
        (Some(start), Some(end)) => format!("{} ms", (end - start).num_milliseconds()),
        _ => "-".to_string(),
    };

    summary("Cycle", &cycle_items(report, duration));

    for delivery in &report.reports {
        for failure in &delivery.failed {
            sub_item(&format!(
                "#{} -> {} failed ({:?}): {}",
                delivery.posting_id, failure.chat_id, failure.kind, failure.reason
            ));
        }
    }
}

fn cycle_items(report: &CycleReport, duration: String) -> Vec<(&'static str, String)> {
    vec![
        ("Fetched", report.fetched.to_string()),
        ("Considered", report.considered.to_string()),
        ("New", report.new.to_string()),
        ("Committed", report.committed.len().to_string()),
        ("Delivered", report.delivered().to_string()),
        ("Failed deliveries", report.failed().to_string()),
        ("Render failures", report.render_failed.len().to_string()),
        ("Errors", report.errored.len().to_string()),
        ("Deactivated", report.deactivated().len().to_string()),
        ("Cancelled", report.cancelled.to_string()),
        ("Duration", duration),
    ]
}

/// List postings one per line.
pub fn postings(postings: &[Posting]) {
    for posting in postings {
        sub_item(&format!(
            "#{} [{}] {} (vence: {})",
            posting.id, posting.published_raw, posting.title, posting.expires_raw
        ));
    }
}
