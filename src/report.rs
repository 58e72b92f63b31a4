/// Report assembly and rendering: streamed file notices, the post-pass text
/// sections, and the machine-readable JSON document.
use crate::classify::{FileNotice, TIMESTAMP_FORMAT};
use crate::metrics::{JobMetrics, SpeedComparison, WastedTime, WorkerMetrics};
use crate::session::{AnalysisSession, ProbeFailure};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

const TABLE_WIDTH: usize = 50;

/// Everything one analysis run produced, in render-ready form.
#[derive(Debug, Serialize)]
pub struct Report {
    pub log_file: String,
    pub notices: Vec<FileNotice>,
    pub failures: Vec<ProbeFailure>,
    pub workers: Vec<WorkerMetrics>,
    pub comparison: Option<SpeedComparison>,
}

impl Report {
    pub fn new(
        log_file: &Path,
        notices: Vec<FileNotice>,
        session: &AnalysisSession,
        metrics: JobMetrics,
    ) -> Self {
        Self {
            log_file: log_file.display().to_string(),
            notices,
            failures: session.failures().to_vec(),
            workers: metrics.workers,
            comparison: metrics.comparison,
        }
    }
}

/// One-line notice, shown the moment a probe reports file info.
pub fn render_notice(notice: &FileNotice) -> String {
    format!("File found: {} ({:.2} GB)", notice.filename, notice.size_gib)
}

/// The post-pass text sections: failures, the worker table, and the
/// fastest/slowest summary. Notices are not repeated here; the driver
/// streams them while the pass runs. Each section opens with a blank line.
pub fn render_sections(report: &Report) -> String {
    let mut out = String::new();

    if !report.failures.is_empty() {
        out.push_str("\nFailures detected:\n");
        for failure in &report.failures {
            let _ = writeln!(out, "  {}", render_failure(failure));
        }
    }

    let with_tasks: Vec<&WorkerMetrics> =
        report.workers.iter().filter(|w| w.task_count > 0).collect();
    if with_tasks.is_empty() {
        out.push_str("\nNo worker task data found.\n");
        return out;
    }

    out.push_str("\nWorker thread detailed analysis:\n");
    let _ = writeln!(
        out,
        "{:<3} | {:<9} | {:<11} | {:<15}",
        "ID", "Avg Time", "Utilization", "Wasted (Wait)"
    );
    let _ = writeln!(out, "{}", "-".repeat(TABLE_WIDTH));
    for worker in &with_tasks {
        let _ = writeln!(
            out,
            "{:<3} | {:<9} | {:<11} | {:<15}",
            worker.id,
            format!("{:.2}s", worker.avg_secs),
            utilization_cell(worker),
            wasted_cell(&worker.wasted)
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(TABLE_WIDTH));

    if let Some(cmp) = &report.comparison {
        out.push('\n');
        let _ = writeln!(
            out,
            "Fastest worker: ID {} ({:.2}s/task)",
            cmp.fastest_id, cmp.fastest_avg_secs
        );
        let _ = writeln!(
            out,
            "Slowest worker: ID {} ({:.2}s/task)",
            cmp.slowest_id, cmp.slowest_avg_secs
        );
        let _ = writeln!(
            out,
            "Ratio: The fastest worker was {:.2}x faster than the slowest.",
            cmp.ratio
        );
    }

    out
}

/// Pretty JSON for the whole report, stable field order, workers ascending.
pub fn render_json(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn render_failure(failure: &ProbeFailure) -> String {
    match failure.timestamp {
        Some(ts) => format!("[{}] {}", ts.format(TIMESTAMP_FORMAT), failure.reason),
        None => failure.reason.clone(),
    }
}

fn utilization_cell(worker: &WorkerMetrics) -> String {
    match worker.utilization_pct {
        Some(pct) => format!("{pct:.1}%"),
        None => "N/A".to_string(),
    }
}

fn wasted_cell(wasted: &WastedTime) -> String {
    match wasted {
        WastedTime::Straggler => "Straggler".to_string(),
        WastedTime::Idle { secs, warn: true } => format!("{secs:.0}s ⚠"),
        WastedTime::Idle { secs, warn: false } => format!("{secs:.0}s"),
        WastedTime::Unknown => "N/A".to_string(),
    }
}
