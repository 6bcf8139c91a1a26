//! Session: the explicit context a run works against.
//!
//! One session owns one file store, one action list and one reporter.
//! Independent sessions can run side by side in the same process.

use dropkit_core::models::{
    ActionId, ActionKind, ActionPreset, ActionStep, FileEntry, FileId, IncomingFile, OptionBag,
    RunSnapshot,
};
use dropkit_core::{
    ActionList, ConversionTarget, FileStore, IdGenerator, IngestValidator, PipelineConfig,
    RandomIds, StoreError,
};
use dropkit_processing::{ConversionDispatcher, FileProcessor};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

use crate::reporter::ProgressReporter;

pub struct Session {
    config: PipelineConfig,
    files: RwLock<FileStore>,
    actions: RwLock<ActionList>,
    processor: FileProcessor,
    reporter: ProgressReporter,
}

impl Session {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_ids(config, Arc::new(RandomIds))
    }

    /// Build a session with an explicit id source, e.g. [`dropkit_core::SequentialIds`].
    pub fn with_ids(config: PipelineConfig, ids: Arc<dyn IdGenerator>) -> Self {
        let processor = FileProcessor::new(ConversionDispatcher::from_config(&config));
        Self::with_processor(config, ids, processor)
    }

    /// Build a session around a custom processor, e.g. one with stub codecs.
    pub fn with_processor(
        config: PipelineConfig,
        ids: Arc<dyn IdGenerator>,
        processor: FileProcessor,
    ) -> Self {
        let validator = IngestValidator::from_config(&config);
        Self {
            files: RwLock::new(FileStore::new(validator, ids.clone())),
            actions: RwLock::new(ActionList::new(ids)),
            config,
            processor,
            reporter: ProgressReporter::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn processor(&self) -> &FileProcessor {
        &self.processor
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.reporter.subscribe()
    }

    pub fn files(&self) -> RwLockReadGuard<'_, FileStore> {
        self.files.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn files_mut(&self) -> RwLockWriteGuard<'_, FileStore> {
        self.files.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn actions(&self) -> RwLockReadGuard<'_, ActionList> {
        self.actions.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn actions_mut(&self) -> RwLockWriteGuard<'_, ActionList> {
        self.actions.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_files(&self, files: Vec<IncomingFile>) -> Result<Vec<FileId>, StoreError> {
        self.files_mut().add_files(files)
    }

    pub fn remove_file(&self, id: FileId) -> Result<(), StoreError> {
        self.files_mut().remove_file(id)
    }

    pub fn set_conversion(
        &self,
        id: FileId,
        target: Option<ConversionTarget>,
    ) -> Result<(), StoreError> {
        self.files_mut().set_conversion(id, target)
    }

    pub fn reorder_files(&self, from: usize, to: usize) -> Result<(), StoreError> {
        self.files_mut().reorder(from, to)
    }

    pub fn add_action(&self, kind: ActionKind) -> Result<ActionId, StoreError> {
        self.actions_mut().add(kind)
    }

    pub fn add_configured_action(
        &self,
        kind: ActionKind,
        options: &OptionBag,
    ) -> Result<ActionId, StoreError> {
        self.actions_mut().add_configured(kind, options)
    }

    pub fn load_preset(&self, preset: &ActionPreset) -> Result<Vec<ActionId>, StoreError> {
        self.actions_mut().load_preset(preset)
    }

    /// Copies of the current entries in store order.
    pub fn entries(&self) -> Vec<FileEntry> {
        self.files().entries().to_vec()
    }

    pub fn action_steps(&self) -> Vec<ActionStep> {
        self.actions().get_current_action_steps()
    }

    pub fn is_running(&self) -> bool {
        self.files().is_locked()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.reporter.snapshot()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // One guard at a time; the std RwLock is not reentrant.
        let (files, running) = {
            let store = self.files();
            (store.len(), store.is_locked())
        };
        let actions = self.actions().len();
        f.debug_struct("Session")
            .field("files", &files)
            .field("actions", &actions)
            .field("running", &running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropkit_core::SequentialIds;

    #[test]
    fn test_sessions_are_independent() {
        let first = Session::with_ids(PipelineConfig::default(), Arc::new(SequentialIds::new()));
        let second = Session::with_ids(PipelineConfig::default(), Arc::new(SequentialIds::new()));

        first
            .add_files(vec![IncomingFile::new("a.pdf", b"%PDF".to_vec())])
            .unwrap();
        assert_eq!(first.files().len(), 1);
        assert!(second.files().is_empty());
    }

    #[test]
    fn test_ingest_uses_config_limits() {
        let config = PipelineConfig {
            max_file_size_bytes: 4,
            ..PipelineConfig::default()
        };
        let session = Session::new(config);
        let err = session
            .add_files(vec![IncomingFile::new("big.pdf", b"%PDF-1.7".to_vec())])
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(session.entries().is_empty());
    }

    #[test]
    fn test_actions_round_trip_through_session() {
        let session = Session::default();
        let id = session.add_action(ActionKind::FileRenaming).unwrap();
        let steps = session.action_steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].id, id);
        assert!(!session.is_running());
    }

    #[test]
    fn test_debug_reads_each_lock_once() {
        let session = Session::default();
        session
            .add_files(vec![IncomingFile::new("a.pdf", b"%PDF".to_vec())])
            .unwrap();
        session.add_action(ActionKind::CompressFiles).unwrap();

        let rendered = format!("{:?}", session);
        assert!(rendered.starts_with("Session"), "{rendered}");
        assert!(rendered.contains("files: 1"), "{rendered}");
        assert!(rendered.contains("actions: 1"), "{rendered}");
        assert!(rendered.contains("running: false"), "{rendered}");

        let _writer = session.files_mut();
    }
}
