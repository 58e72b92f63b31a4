/// Single-pass aggregation: fold classified lines into per-worker records,
/// probe failures, and the job-wide end time.
use crate::classify::{self, FileNotice, LineEvent};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Per-worker aggregation state, created on first reference to the id.
#[derive(Debug, Default, Clone)]
pub struct WorkerRecord {
    /// Seconds per completed task, in log order.
    pub task_durations: Vec<f64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    /// Timestamp of the most recent task completion.
    pub last_active: Option<NaiveDateTime>,
}

/// One recorded probe failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeFailure {
    /// Carrier timestamp at the time the failure was observed, if any.
    pub timestamp: Option<NaiveDateTime>,
    pub reason: String,
}

/// Aggregation state for one analysis pass.
///
/// Lines are folded in strictly left to right; the carrier timestamp is the
/// most recent valid prefix seen and stamps every event on lines without one.
#[derive(Debug, Default)]
pub struct AnalysisSession {
    current_time: Option<NaiveDateTime>,
    workers: BTreeMap<u32, WorkerRecord>,
    failures: Vec<ProbeFailure>,
    global_end: Option<NaiveDateTime>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one line and fold its event into the session.
    ///
    /// Returns a notice when the line is a probe completion carrying file
    /// info; notices go straight to the caller and are not retained here.
    pub fn observe_line(&mut self, line: &str) -> Option<FileNotice> {
        let classified = classify::classify(line);
        if let Some(ts) = classified.timestamp {
            self.current_time = Some(ts);
        }
        match classified.event? {
            LineEvent::ProbeComplete(notice) => {
                tracing::debug!(filename = %notice.filename, "probe reported a file");
                Some(notice)
            }
            // Probe failures keep whatever carrier state exists, including none.
            LineEvent::ProbeFailed { reason } => {
                self.failures.push(ProbeFailure {
                    timestamp: self.current_time,
                    reason,
                });
                None
            }
            event => {
                self.record(event);
                None
            }
        }
    }

    /// Fold a timestamp-gated event into the aggregation state.
    fn record(&mut self, event: LineEvent) {
        let Some(now) = self.current_time else {
            tracing::debug!(?event, "event before any valid timestamp, dropped");
            return;
        };
        match event {
            LineEvent::WorkerStarted { id } => self.worker(id).start_time = Some(now),
            LineEvent::WorkerFinished { id } => self.worker(id).end_time = Some(now),
            LineEvent::TaskCompleted { id, duration_secs } => {
                let record = self.worker(id);
                record.task_durations.push(duration_secs);
                record.last_active = Some(now);
            }
            LineEvent::DownloadComplete => {
                // First completion marker wins; later ones are noise.
                if self.global_end.is_none() {
                    tracing::debug!(%now, "completion marker observed");
                    self.global_end = Some(now);
                }
            }
            // Intercepted in observe_line before the timestamp gate.
            LineEvent::ProbeFailed { .. } | LineEvent::ProbeComplete(_) => {}
        }
    }

    fn worker(&mut self, id: u32) -> &mut WorkerRecord {
        self.workers.entry(id).or_default()
    }

    /// Workers keyed by id; BTreeMap iteration gives ascending order.
    pub fn workers(&self) -> &BTreeMap<u32, WorkerRecord> {
        &self.workers
    }

    pub fn failures(&self) -> &[ProbeFailure] {
        &self.failures
    }

    /// The explicit completion marker time, or the last timestamp seen
    /// anywhere in the log when the job never logged its completion.
    pub fn effective_end_time(&self) -> Option<NaiveDateTime> {
        self.global_end.or(self.current_time)
    }
}

/// Errors from loading or reading the log.
#[derive(Debug)]
pub enum AnalyzeError {
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Read { source: std::io::Error },
}

impl fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzeError::Open { path, source } => {
                write!(f, "cannot open log file {}: {source}", path.display())
            }
            AnalyzeError::Read { source } => write!(f, "failed to read log line: {source}"),
        }
    }
}

impl std::error::Error for AnalyzeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalyzeError::Open { source, .. } | AnalyzeError::Read { source } => Some(source),
        }
    }
}

/// Open the log for a buffered pass. Fails without producing any output so
/// the caller can report the unreadable file and stop.
pub fn open_log(path: &Path) -> Result<BufReader<File>, AnalyzeError> {
    let file = File::open(path).map_err(|e| AnalyzeError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(BufReader::new(file))
}

/// Run the whole pass over an open reader. `notify` fires once per probe
/// file notice, in log order, while the pass is still running.
pub fn analyze_reader(
    reader: impl BufRead,
    mut notify: impl FnMut(FileNotice),
) -> Result<AnalysisSession, AnalyzeError> {
    let mut session = AnalysisSession::new();
    for line in reader.lines() {
        let line = line.map_err(|e| AnalyzeError::Read { source: e })?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(notice) = session.observe_line(&line) {
            notify(notice);
        }
    }
    Ok(session)
}
