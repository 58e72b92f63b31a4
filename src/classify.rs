/// Line classification: match one raw log line against the recognized
/// patterns and produce at most one typed event, plus an optional timestamp
/// extracted from the line's own prefix.
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Textual timestamp layout used throughout the log: `YYYY-MM-DD HH:MM:SS`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BYTES_PER_GIB: f64 = (1024 * 1024 * 1024) as f64;

/// Anchored `[YYYY-MM-DD HH:MM:SS]` prefix; calendar validation is chrono's.
static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\]").unwrap());
static LIFECYCLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Worker (\d+) (started|finished)").unwrap());
static TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Worker (\d+): Task offset=(\d+) length=(\d+) took ([\d.]+)s").unwrap()
});
static DOWNLOAD_COMPLETE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Download .+ completed in").unwrap());
static PROBE_FAILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Probe failed: (.+)").unwrap());
static PROBE_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Probe complete - filename: (.+), size: (\d+)").unwrap());

/// A discovered file from a successful probe, reported as soon as it is parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileNotice {
    pub filename: String,
    /// Size converted to gibibytes (bytes / 1024^3).
    pub size_gib: f64,
}

/// One structural event extracted from a log line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    WorkerStarted { id: u32 },
    WorkerFinished { id: u32 },
    TaskCompleted { id: u32, duration_secs: f64 },
    /// The job-wide completion marker (`Download ... completed in`).
    DownloadComplete,
    ProbeFailed { reason: String },
    ProbeComplete(FileNotice),
}

/// Classification result for a single line.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    /// Timestamp from the line's own `[...]` prefix, if present and valid.
    pub timestamp: Option<NaiveDateTime>,
    /// At most one structural event.
    pub event: Option<LineEvent>,
}

/// Classify one raw line. The timestamp prefix and the structural event are
/// independent: a line can carry either, both, or neither.
pub fn classify(line: &str) -> ClassifiedLine {
    let line = line.trim();
    ClassifiedLine {
        timestamp: parse_timestamp(line),
        event: extract_event(line),
    }
}

fn parse_timestamp(line: &str) -> Option<NaiveDateTime> {
    let caps = TIMESTAMP.captures(line)?;
    let text = &caps[1];
    match NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        Ok(ts) => Some(ts),
        Err(_) => {
            tracing::warn!(prefix = text, "timestamp prefix failed calendar validation, ignored");
            None
        }
    }
}

/// Try each structural pattern in priority order and return the first match.
///
/// Lifecycle and task lines short-circuit the substring-gated probe checks;
/// the probe checks themselves are two-tier (cheap containment test, then the
/// detail pattern for field extraction).
fn extract_event(line: &str) -> Option<LineEvent> {
    if let Some(caps) = LIFECYCLE.captures(line) {
        let id = parse_worker_id(&caps[1])?;
        return Some(match &caps[2] {
            "started" => LineEvent::WorkerStarted { id },
            _ => LineEvent::WorkerFinished { id },
        });
    }

    if let Some(caps) = TASK.captures(line) {
        let id = parse_worker_id(&caps[1])?;
        let duration_secs = match caps[4].parse::<f64>() {
            Ok(d) => d,
            Err(_) => {
                tracing::warn!(raw = &caps[4], "task duration is not a valid number, line skipped");
                return None;
            }
        };
        return Some(LineEvent::TaskCompleted { id, duration_secs });
    }

    if DOWNLOAD_COMPLETE.is_match(line) {
        return Some(LineEvent::DownloadComplete);
    }

    if line.contains("Probe failed") {
        let reason = PROBE_FAILED
            .captures(line)
            .map_or_else(|| "Unknown".to_string(), |caps| caps[1].to_string());
        return Some(LineEvent::ProbeFailed { reason });
    }

    if line.contains("Probe complete") {
        if let Some(caps) = PROBE_INFO.captures(line) {
            let bytes = match caps[2].parse::<u64>() {
                Ok(b) => b,
                Err(_) => {
                    tracing::warn!(raw = &caps[2], "probe size is not a valid number, skipped");
                    return None;
                }
            };
            return Some(LineEvent::ProbeComplete(FileNotice {
                filename: caps[1].to_string(),
                size_gib: bytes as f64 / BYTES_PER_GIB,
            }));
        }
        // Gate matched but the detail pattern did not: nothing to report.
        return None;
    }

    None
}

fn parse_worker_id(digits: &str) -> Option<u32> {
    match digits.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(digits, "worker id out of range, line skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(line: &str) -> Option<LineEvent> {
        classify(line).event
    }

    #[test]
    fn timestamp_prefix_parses() {
        let classified = classify("[2024-05-01 10:00:00] Worker 1 started");
        let ts = classified.timestamp.unwrap();
        assert_eq!(ts.format(TIMESTAMP_FORMAT).to_string(), "2024-05-01 10:00:00");
    }

    #[test]
    fn timestamp_requires_valid_calendar() {
        assert!(classify("[2024-13-01 10:00:00] whatever").timestamp.is_none());
        assert!(classify("[2024-02-30 10:00:00] whatever").timestamp.is_none());
    }

    #[test]
    fn timestamp_must_be_at_line_start() {
        assert!(classify("noise [2024-05-01 10:00:00] x").timestamp.is_none());
        // Surrounding whitespace is trimmed before matching.
        assert!(classify("  [2024-05-01 10:00:00] x").timestamp.is_some());
    }

    #[test]
    fn worker_lifecycle_events() {
        assert_eq!(
            event("[2024-05-01 10:00:00] Worker 3 started"),
            Some(LineEvent::WorkerStarted { id: 3 })
        );
        assert_eq!(
            event("Worker 12 finished"),
            Some(LineEvent::WorkerFinished { id: 12 })
        );
    }

    #[test]
    fn task_completion_captures_duration() {
        let got = event("[2024-05-01 10:00:05] Worker 2: Task offset=4096 length=1024 took 2.50s");
        assert_eq!(
            got,
            Some(LineEvent::TaskCompleted {
                id: 2,
                duration_secs: 2.5
            })
        );
    }

    #[test]
    fn task_duration_must_parse_as_float() {
        // `[\d.]+` admits shapes like 1.2.3 that are not numbers.
        assert_eq!(event("Worker 2: Task offset=0 length=1 took 1.2.3s"), None);
    }

    #[test]
    fn worker_id_overflow_is_skipped() {
        assert_eq!(event("Worker 99999999999999999999 started"), None);
    }

    #[test]
    fn download_complete_marker() {
        assert_eq!(
            event("[2024-05-01 10:10:00] Download ubuntu.iso completed in 10m4s"),
            Some(LineEvent::DownloadComplete)
        );
    }

    #[test]
    fn probe_failed_with_reason() {
        assert_eq!(
            event("[2024-05-01 10:00:01] Probe failed: connection timeout"),
            Some(LineEvent::ProbeFailed {
                reason: "connection timeout".to_string()
            })
        );
    }

    #[test]
    fn probe_failed_without_detail_defaults_to_unknown() {
        assert_eq!(
            event("[2024-05-01 10:00:01] Probe failed"),
            Some(LineEvent::ProbeFailed {
                reason: "Unknown".to_string()
            })
        );
    }

    #[test]
    fn probe_complete_with_file_info() {
        let got = event("Probe complete - filename: ubuntu.iso, size: 5000000000");
        match got {
            Some(LineEvent::ProbeComplete(notice)) => {
                assert_eq!(notice.filename, "ubuntu.iso");
                assert!((notice.size_gib - 4.656).abs() < 0.001);
            }
            other => panic!("expected ProbeComplete, got {other:?}"),
        }
    }

    #[test]
    fn probe_complete_without_info_is_ignored() {
        assert_eq!(event("[2024-05-01 10:00:02] Probe complete"), None);
    }

    #[test]
    fn lifecycle_wins_over_probe_substring() {
        // A pathological line matching two patterns yields only the first.
        assert_eq!(
            event("Worker 2 started Probe failed: x"),
            Some(LineEvent::WorkerStarted { id: 2 })
        );
    }

    #[test]
    fn unrecognized_line_yields_nothing() {
        let classified = classify("[2024-05-01 10:00:00] chunk cache warmed");
        assert!(classified.timestamp.is_some());
        assert_eq!(classified.event, None);
        assert_eq!(event("completely freeform text"), None);
    }
}
