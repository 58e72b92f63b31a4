//! Derived per-worker metrics, computed once after the aggregation pass.
//!
//! Everything here is pure arithmetic over an [`AnalysisSession`]; the only
//! tunable is the wasted-time warning threshold from the config.

use crate::config::ThresholdConfig;
use crate::session::{AnalysisSession, WorkerRecord};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Wasted-time classification for one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WastedTime {
    /// Active until the very end of the job (gap of exactly zero).
    Straggler,
    /// Gap between the worker's last activity and the job end.
    Idle { secs: f64, warn: bool },
    /// Not enough data: no recorded activity or no end time.
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerMetrics {
    pub id: u32,
    pub task_count: usize,
    /// Mean task duration in seconds; 0.0 when no task completed.
    pub avg_secs: f64,
    /// Share of the wall-clock lifetime spent on recorded work, clamped to
    /// 100; None when lifecycle times are missing or the interval is empty.
    pub utilization_pct: Option<f64>,
    pub wasted: WastedTime,
}

/// Fastest/slowest comparison over workers that completed at least one task.
#[derive(Debug, Clone, Serialize)]
pub struct SpeedComparison {
    pub fastest_id: u32,
    pub fastest_avg_secs: f64,
    pub slowest_id: u32,
    pub slowest_avg_secs: f64,
    /// slowest average over fastest average; 0.0 when the fastest is zero.
    pub ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobMetrics {
    /// One entry per observed worker, ascending by id.
    pub workers: Vec<WorkerMetrics>,
    /// Absent when no worker completed a task.
    pub comparison: Option<SpeedComparison>,
}

/// Compute the full metric set for a finished pass.
pub fn compute(session: &AnalysisSession, thresholds: &ThresholdConfig) -> JobMetrics {
    let global_end = session.effective_end_time();
    let workers: Vec<WorkerMetrics> = session
        .workers()
        .iter()
        .map(|(&id, record)| worker_metrics(id, record, global_end, thresholds.wasted_warn_secs))
        .collect();
    let comparison = compare(&workers);
    JobMetrics { workers, comparison }
}

fn worker_metrics(
    id: u32,
    record: &WorkerRecord,
    global_end: Option<NaiveDateTime>,
    warn_secs: u64,
) -> WorkerMetrics {
    let task_count = record.task_durations.len();
    let total_work: f64 = record.task_durations.iter().sum();
    let avg_secs = if task_count > 0 {
        total_work / task_count as f64
    } else {
        0.0
    };
    WorkerMetrics {
        id,
        task_count,
        avg_secs,
        utilization_pct: utilization(record, total_work),
        wasted: wasted_time(record, global_end, warn_secs),
    }
}

fn utilization(record: &WorkerRecord, total_work: f64) -> Option<f64> {
    let start = record.start_time?;
    let end = record.end_time?;
    let wall = end.signed_duration_since(start).num_seconds() as f64;
    if wall <= 0.0 {
        return None;
    }
    // Second-resolution timestamps can round the wall interval below the
    // summed task time; report that as a fully busy worker, not >100%.
    if total_work > wall {
        Some(100.0)
    } else {
        Some(total_work / wall * 100.0)
    }
}

fn wasted_time(
    record: &WorkerRecord,
    global_end: Option<NaiveDateTime>,
    warn_secs: u64,
) -> WastedTime {
    let (last_active, end) = match (record.last_active, global_end) {
        (Some(last_active), Some(end)) => (last_active, end),
        _ => return WastedTime::Unknown,
    };
    let secs = end.signed_duration_since(last_active).num_seconds() as f64;
    if secs == 0.0 {
        WastedTime::Straggler
    } else {
        WastedTime::Idle {
            secs,
            warn: secs > warn_secs as f64,
        }
    }
}

/// Strict comparisons keep the first candidate on ties; the input is already
/// ascending by id, so ties resolve to the lowest worker id.
fn compare(workers: &[WorkerMetrics]) -> Option<SpeedComparison> {
    let mut with_tasks = workers.iter().filter(|w| w.task_count > 0);
    let first = with_tasks.next()?;
    let (mut fastest, mut slowest) = (first, first);
    for worker in with_tasks {
        if worker.avg_secs < fastest.avg_secs {
            fastest = worker;
        }
        if worker.avg_secs > slowest.avg_secs {
            slowest = worker;
        }
    }
    let ratio = if fastest.avg_secs > 0.0 {
        slowest.avg_secs / fastest.avg_secs
    } else {
        0.0
    };
    Some(SpeedComparison {
        fastest_id: fastest.id,
        fastest_avg_secs: fastest.avg_secs,
        slowest_id: slowest.id,
        slowest_avg_secs: slowest.avg_secs,
        ratio,
    })
}
