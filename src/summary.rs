//! End-of-run summary: the log block and the optional JSON report.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use copy_core::{RunReport, TableName};
use copy_mysql_store::MySqlEndpoint;
use tracing::{error, info};

fn join(tables: &BTreeSet<TableName>) -> String {
    tables
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The summary lines, paired with whether each is an error line.
pub fn summary_lines(
    report: &RunReport,
    source: &MySqlEndpoint,
    target: &MySqlEndpoint,
) -> Vec<(bool, String)> {
    let header = format!(
        "Summary for copy from source database {} on {} to target database {} on {}:",
        source.database, source.host, target.database, target.host
    );
    let mut lines = vec![
        (false, header.clone()),
        (false, "-".repeat(header.len())),
        (false, format!(" Skipped: {}", join(&report.skipped))),
        (false, format!("  Copied: {}", join(&report.copied))),
    ];
    if !report.invalid.is_empty() {
        lines.push((true, format!("Invalid: {}", join(&report.invalid))));
    }
    if !report.failed.is_empty() {
        lines.push((true, format!(" Failed: {}", join(&report.failed))));
    }
    lines
}

pub fn log_summary(report: &RunReport, source: &MySqlEndpoint, target: &MySqlEndpoint) {
    for (is_error, line) in summary_lines(report, source, target) {
        if is_error {
            error!("{line}");
        } else {
            info!("{line}");
        }
    }
}

pub fn write_report_json(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report to {}", path.display()))
}
