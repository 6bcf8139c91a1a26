use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::ids::FileId;
use crate::models::ProcessStatus;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Processing => write!(f, "processing"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
            RunState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One named blob produced by processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub data: Bytes,
    /// Input the output came from; `None` for combined outputs.
    pub source: Option<FileId>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>, source: Option<FileId>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            source,
        }
    }
}

/// The finished downloadable archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub name: String,
    pub data: Bytes,
    /// Entry names in archive order.
    pub entries: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ProcessStatus) {
        match status {
            ProcessStatus::NotStarted => self.not_started += 1,
            ProcessStatus::InProgress => self.in_progress += 1,
            ProcessStatus::Completed => self.completed += 1,
            ProcessStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.not_started + self.in_progress + self.completed + self.failed
    }
}

impl FromIterator<ProcessStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = ProcessStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunFailure {
    pub message: String,
    pub file_id: Option<FileId>,
    pub file_name: Option<String>,
}

/// Terminal outcome of a run, shaped for the summary dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub state: RunState,
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub failure: Option<RunFailure>,
    pub bundle_name: Option<String>,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn failed_count(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    pub fn average_seconds_per_file(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() / self.total as f64
    }

    /// Headline sentence of the summary.
    pub fn describe(&self) -> String {
        let elapsed = format_elapsed(self.elapsed);
        match self.state {
            RunState::Completed => format!(
                "Successfully processed {} out of {} files in {}.",
                self.processed, self.total, elapsed
            ),
            RunState::Cancelled => format!(
                "Processing cancelled after {}. {} out of {} files were processed.",
                elapsed, self.processed, self.total
            ),
            _ => {
                let cause = self
                    .failure
                    .as_ref()
                    .map(|f| f.message.as_str())
                    .unwrap_or("An unknown error occurred.");
                format!("Processing failed after {}. {}", elapsed, cause)
            }
        }
    }
}

/// `12.3 seconds` below one minute, `2 min 5 sec` from there on.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    // Round before splitting so a carry lands in the next unit.
    let tenths = (millis + 50) / 100;
    if tenths < 600 {
        return format!("{}.{} seconds", tenths / 10, tenths % 10);
    }
    let seconds = (millis + 500) / 1000;
    format!("{} min {} sec", seconds / 60, seconds % 60)
}

/// Point-in-time projection of a run for observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSnapshot {
    pub state: RunState,
    pub overall_progress: u8,
    pub message: String,
    pub counts: StatusCounts,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,
    pub summary: Option<RunSummary>,
}

impl Default for RunSnapshot {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            overall_progress: 0,
            message: "Ready".to_string(),
            counts: StatusCounts::default(),
            started_at: None,
            elapsed: Duration::ZERO,
            summary: None,
        }
    }
}

/// Everything one invocation of the pipeline produced.
#[derive(Debug, Clone)]
pub struct ProcessingRun {
    pub started_at: DateTime<Utc>,
    pub state: RunState,
    pub overall_progress: u8,
    /// Per-input outputs in store order; empty unless the run completed.
    pub outputs: Vec<(FileId, OutputFile)>,
    pub bundle: Option<Bundle>,
    pub error_message: Option<String>,
    pub summary: RunSummary,
}
