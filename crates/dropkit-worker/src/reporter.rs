//! Progress/result reporting.
//!
//! The pipeline is the only writer. Observers hold a `watch::Receiver` and
//! always see the latest snapshot; reading never blocks the run.

use dropkit_core::models::{RunSnapshot, RunState, RunSummary, StatusCounts};
use tokio::sync::watch;

pub struct ProgressReporter {
    tx: watch::Sender<RunSnapshot>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunSnapshot::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.tx.subscribe()
    }

    /// Copy of the latest snapshot.
    pub fn snapshot(&self) -> RunSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> RunState {
        self.tx.borrow().state
    }

    pub fn overall_progress(&self) -> u8 {
        self.tx.borrow().overall_progress
    }

    pub fn counts(&self) -> StatusCounts {
        self.tx.borrow().counts
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.tx.borrow().summary.clone()
    }

    pub(crate) fn begin(&self, snapshot: RunSnapshot) {
        self.tx.send_replace(snapshot);
    }

    /// Publish progress for a run in flight. Overall progress never moves
    /// backwards and stays below 100 until the run completes.
    pub(crate) fn progress(&self, overall: u8, message: String, counts: StatusCounts) {
        self.tx.send_modify(|snapshot| {
            snapshot.overall_progress = snapshot.overall_progress.max(overall.min(99));
            snapshot.message = message;
            snapshot.counts = counts;
            if let Some(started) = snapshot.started_at {
                snapshot.elapsed = (chrono::Utc::now() - started).to_std().unwrap_or_default();
            }
        });
    }

    pub(crate) fn finish(&self, summary: RunSummary, counts: StatusCounts) {
        self.tx.send_modify(|snapshot| {
            snapshot.state = summary.state;
            if summary.state == RunState::Completed {
                snapshot.overall_progress = 100;
            }
            snapshot.message = summary.describe();
            snapshot.counts = counts;
            snapshot.elapsed = summary.elapsed;
            snapshot.summary = Some(summary);
        });
    }

    /// Back to idle, as when the user dismisses the summary.
    pub fn reset(&self) {
        self.tx.send_replace(RunSnapshot::default());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("state", &self.state())
            .field("overall_progress", &self.overall_progress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn processing() -> RunSnapshot {
        RunSnapshot {
            state: RunState::Processing,
            started_at: Some(chrono::Utc::now()),
            ..RunSnapshot::default()
        }
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let reporter = ProgressReporter::new();
        reporter.begin(processing());

        reporter.progress(40, "step".to_string(), StatusCounts::default());
        reporter.progress(20, "step".to_string(), StatusCounts::default());
        assert_eq!(reporter.overall_progress(), 40);

        reporter.progress(100, "last".to_string(), StatusCounts::default());
        assert_eq!(reporter.overall_progress(), 99);
        assert_eq!(reporter.state(), RunState::Processing);
    }

    #[test]
    fn test_finish_completed_reaches_100() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        reporter.begin(processing());

        let summary = RunSummary {
            state: RunState::Completed,
            processed: 1,
            total: 1,
            elapsed: Duration::from_secs(2),
            failure: None,
            bundle_name: Some("processed_files.zip".to_string()),
        };
        reporter.finish(summary, StatusCounts::default());

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.state, RunState::Completed);
        assert_eq!(snapshot.overall_progress, 100);
        assert_eq!(
            snapshot.message,
            "Successfully processed 1 out of 1 files in 2.0 seconds."
        );
    }

    #[test]
    fn test_finish_failed_keeps_progress() {
        let reporter = ProgressReporter::new();
        reporter.begin(processing());
        reporter.progress(33, "one done".to_string(), StatusCounts::default());

        let summary = RunSummary {
            state: RunState::Failed,
            processed: 1,
            total: 3,
            elapsed: Duration::from_millis(500),
            failure: None,
            bundle_name: None,
        };
        reporter.finish(summary, StatusCounts::default());
        assert_eq!(reporter.overall_progress(), 33);
        assert_eq!(reporter.state(), RunState::Failed);

        reporter.reset();
        assert_eq!(reporter.snapshot(), RunSnapshot::default());
    }
}
