//! Pipeline orchestrator.
//!
//! Files are processed one at a time in store order. Codec work runs on the
//! blocking pool so the reporter stays responsive; the next file starts only
//! after the previous one finished. The first failure aborts the run and no
//! bundle is produced.

use chrono::Utc;
use dropkit_core::models::{
    ActionStep, Bundle, FileEntry, FileId, OutputFile, ProcessStatus, ProcessingRun, RunFailure,
    RunSnapshot, RunState, RunSummary,
};
use dropkit_core::{ConversionCause, ConversionError, RunError};
use dropkit_processing::{build_bundle, bundle_name, FileProcessor};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::session::Session;
use crate::sink::BundleSink;

/// Runs the configured actions over every file of a session.
#[derive(Clone, Default)]
pub struct Pipeline {
    sink: Option<Arc<dyn BundleSink>>,
}

/// Releases the store locks when a run ends, however it ends.
struct RunGuard<'a> {
    session: &'a Session,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.session.files_mut().unlock();
        self.session.actions_mut().unlock();
    }
}

enum Outcome {
    Completed(Bundle),
    Failed(RunFailure),
    Cancelled,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver finished bundles to `sink` as well as returning them.
    pub fn with_sink(sink: Arc<dyn BundleSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Process every file in the session.
    ///
    /// Returns `Err` only when the run is refused before anything changes.
    /// Failed and cancelled runs are reported through the returned
    /// [`ProcessingRun`] and the session's reporter.
    #[tracing::instrument(skip(self, session, cancel))]
    pub async fn run(
        &self,
        session: &Session,
        cancel: CancellationToken,
    ) -> Result<ProcessingRun, RunError> {
        let (entries, steps) = Self::start(session)?;
        let _guard = RunGuard { session };

        let started_at = Utc::now();
        let clock = Instant::now();
        let total = entries.len();

        info!(files = total, actions = steps.len(), "Processing run started");
        session.reporter().begin(RunSnapshot {
            state: RunState::Processing,
            overall_progress: 0,
            message: "Processing files...".to_string(),
            counts: session.files().counts_by_status(),
            started_at: Some(started_at),
            ..RunSnapshot::default()
        });

        let steps = Arc::new(steps);
        let processor = session.processor().clone();
        let mut outputs: Vec<(FileId, OutputFile)> = Vec::with_capacity(total);

        let mut outcome = None;
        for (index, entry) in entries.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome = Some(Outcome::Cancelled);
                break;
            }

            match Self::process_file(session, &processor, entry, &steps, index, total).await {
                Ok(output) => outputs.push((entry.id(), output)),
                Err(e) => {
                    outcome = Some(Outcome::Failed(RunFailure {
                        message: e.to_string(),
                        file_id: Some(e.file_id),
                        file_name: Some(e.file_name.clone()),
                    }));
                    break;
                }
            }
        }

        let outcome = match outcome {
            Some(outcome) => outcome,
            None if cancel.is_cancelled() => Outcome::Cancelled,
            None => self.finalize(session, &processor, &steps, &outputs).await,
        };

        let processed = outputs.len();
        let (state, bundle, failure) = match outcome {
            Outcome::Completed(bundle) => (RunState::Completed, Some(bundle), None),
            Outcome::Failed(failure) => (RunState::Failed, None, Some(failure)),
            Outcome::Cancelled => (RunState::Cancelled, None, None),
        };

        if state != RunState::Completed {
            // Anything not finished goes back to the untouched state.
            let mut files = session.files_mut();
            for entry in &entries {
                if files.get(entry.id()).map(|e| e.status()) == Some(ProcessStatus::InProgress) {
                    let _ = files.set_status(entry.id(), ProcessStatus::NotStarted, 0);
                }
            }
        }

        let summary = RunSummary {
            state,
            processed,
            total,
            elapsed: clock.elapsed(),
            failure: failure.clone(),
            bundle_name: bundle.as_ref().map(|b| b.name.clone()),
        };
        session
            .reporter()
            .finish(summary.clone(), session.files().counts_by_status());

        match state {
            RunState::Completed => info!(
                processed,
                total,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Processing run completed"
            ),
            RunState::Cancelled => warn!(processed, total, "Processing run cancelled"),
            _ => error!(
                processed,
                total,
                error = failure.as_ref().map(|f| f.message.as_str()).unwrap_or_default(),
                "Processing run failed"
            ),
        }

        Ok(ProcessingRun {
            started_at,
            state,
            overall_progress: session.reporter().overall_progress(),
            outputs: if state == RunState::Completed {
                outputs
            } else {
                Vec::new()
            },
            bundle,
            error_message: failure.map(|f| f.message),
            summary,
        })
    }

    /// Validate the request and take the store locks.
    fn start(session: &Session) -> Result<(Vec<FileEntry>, Vec<ActionStep>), RunError> {
        let mut files = session.files_mut();
        if files.is_locked() {
            return Err(RunError::AlreadyRunning);
        }
        if files.is_empty() {
            return Err(RunError::NoFiles);
        }

        let mut actions = session.actions_mut();
        let steps = actions.get_current_action_steps();
        for step in &steps {
            step.action
                .validate()
                .map_err(|source| RunError::InvalidAction {
                    kind: step.kind().to_string(),
                    source,
                })?;
        }

        if !files.lock_for_run() || !actions.lock_for_run() {
            files.unlock();
            return Err(RunError::AlreadyRunning);
        }
        files.set_all_statuses(ProcessStatus::InProgress, 0);
        Ok((files.entries().to_vec(), steps))
    }

    async fn process_file(
        session: &Session,
        processor: &FileProcessor,
        entry: &FileEntry,
        steps: &Arc<Vec<ActionStep>>,
        index: usize,
        total: usize,
    ) -> Result<OutputFile, ConversionError> {
        info!(
            file_id = %entry.id(),
            file_name = %entry.name(),
            position = index + 1,
            total,
            "Processing file"
        );
        Self::report(session, entry, ProcessStatus::InProgress, 0, index, total);

        let result = async {
            let converted = {
                let (processor, owned, steps) = (processor.clone(), entry.clone(), steps.clone());
                Self::blocking(entry, move || processor.convert(&owned, &steps)).await?
            };
            Self::report(session, entry, ProcessStatus::InProgress, 50, index, total);

            let (processor, owned, steps) = (processor.clone(), entry.clone(), steps.clone());
            Self::blocking(entry, move || {
                processor.apply_file_stages(&owned, converted, &steps)
            })
            .await
        }
        .await;

        match &result {
            Ok(output) => {
                Self::report(session, entry, ProcessStatus::Completed, 100, index + 1, total);
                info!(
                    file_id = %entry.id(),
                    output_name = %output.name,
                    output_bytes = output.data.len(),
                    "File processed"
                );
            }
            Err(e) => {
                let _ = session
                    .files_mut()
                    .set_status(entry.id(), ProcessStatus::Failed, 0);
                error!(
                    file_id = %entry.id(),
                    file_name = %entry.name(),
                    cause = %e.cause,
                    error = %e.message,
                    "File processing failed"
                );
            }
        }
        result
    }

    /// Run codec work on the blocking pool. A panic there fails the file.
    async fn blocking<F>(entry: &FileEntry, work: F) -> Result<OutputFile, ConversionError>
    where
        F: FnOnce() -> Result<OutputFile, ConversionError> + Send + 'static,
    {
        tokio::task::spawn_blocking(work).await.unwrap_or_else(|e| {
            Err(ConversionError::new(
                entry.id(),
                entry.name(),
                ConversionCause::Codec,
                format!("Processing task aborted: {}", e),
            ))
        })
    }

    /// Record a file's status and publish the run's progress.
    fn report(
        session: &Session,
        entry: &FileEntry,
        status: ProcessStatus,
        progress: u8,
        done: usize,
        total: usize,
    ) {
        let counts = {
            let mut files = session.files_mut();
            let _ = files.set_status(entry.id(), status, progress);
            files.counts_by_status()
        };
        let overall = (done * 100 / total.max(1)) as u8;
        let message = match status {
            ProcessStatus::Completed => format!("Processed {} of {} files", done, total),
            _ => format!("Processing {} ({} of {})", entry.name(), done + 1, total),
        };
        session.reporter().progress(overall, message, counts);
    }

    /// Batch stages, bundling and delivery.
    async fn finalize(
        &self,
        session: &Session,
        processor: &FileProcessor,
        steps: &Arc<Vec<ActionStep>>,
        outputs: &[(FileId, OutputFile)],
    ) -> Outcome {
        let name = bundle_name(steps, &session.config().bundle_name);
        let files: Vec<OutputFile> = outputs.iter().map(|(_, o)| o.clone()).collect();

        let built = {
            let processor = processor.clone();
            let steps = Arc::clone(steps);
            let name = name.clone();
            tokio::task::spawn_blocking(move || {
                let combined = processor.apply_batch_stages(files, &steps)?;
                build_bundle(&name, &combined)
            })
            .await
        };

        let bundle = match built {
            Ok(Ok(bundle)) => bundle,
            Ok(Err(e)) => {
                error!(bundle = %name, error = %e, "Failed to build bundle");
                return Outcome::Failed(RunFailure {
                    message: e.to_string(),
                    file_id: None,
                    file_name: None,
                });
            }
            Err(e) => {
                return Outcome::Failed(RunFailure {
                    message: format!("Bundling task aborted: {}", e),
                    file_id: None,
                    file_name: None,
                })
            }
        };

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.deliver(&bundle).await {
                error!(bundle = %bundle.name, error = %e, "Failed to deliver bundle");
                return Outcome::Failed(RunFailure {
                    message: format!("Failed to save {}: {:#}", bundle.name, e),
                    file_id: None,
                    file_name: None,
                });
            }
        }

        Outcome::Completed(bundle)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
