use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ActionConfigError, StoreError};
use crate::format::ConversionTarget;
use crate::ids::{FileId, IdGenerator, RandomIds};
use crate::models::{FileEntry, IncomingFile, ProcessStatus, StatusCounts};
use crate::validation::IngestValidator;

use super::move_item;

/// Ordered collection of input files and their processing state.
///
/// Order is user-meaningful: it drives processing order and archive order.
pub struct FileStore {
    entries: Vec<FileEntry>,
    validator: IngestValidator,
    ids: Arc<dyn IdGenerator>,
    locked: bool,
}

impl FileStore {
    pub fn new(validator: IngestValidator, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            entries: Vec::new(),
            validator,
            ids,
            locked: false,
        }
    }

    fn ensure_unlocked(&self) -> Result<(), StoreError> {
        if self.locked {
            return Err(StoreError::RunInProgress);
        }
        Ok(())
    }

    fn entry_mut(&mut self, id: FileId) -> Result<&mut FileEntry, StoreError> {
        self.entries
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Validate and append a batch of files.
    ///
    /// All-or-nothing: if any file fails validation, nothing is added and
    /// the error names the first offending file.
    pub fn add_files(&mut self, files: Vec<IncomingFile>) -> Result<Vec<FileId>, StoreError> {
        self.ensure_unlocked()?;

        for file in &files {
            self.validator.validate(&file.name, file.size_bytes())?;
        }

        let mut added = Vec::with_capacity(files.len());
        for file in files {
            let entry = FileEntry::new(self.ids.file_id(), file);
            debug!(
                file_id = %entry.id(),
                file_name = %entry.name(),
                format = %entry.format(),
                size_bytes = entry.size_bytes(),
                "File added"
            );
            added.push(entry.id());
            self.entries.push(entry);
        }

        info!(count = added.len(), total = self.entries.len(), "Files added to store");
        Ok(added)
    }

    /// Remove an entry. Unknown ids are ignored.
    pub fn remove_file(&mut self, id: FileId) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        self.entries.retain(|e| e.id() != id);
        Ok(())
    }

    /// Set or clear the requested conversion of one file.
    ///
    /// `Some(ConversionTarget::None)` is stored as no conversion.
    pub fn set_conversion(
        &mut self,
        id: FileId,
        target: Option<ConversionTarget>,
    ) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        let entry = self.entry_mut(id)?;
        let target = target.filter(|t| *t != ConversionTarget::None);
        if let Some(target) = target {
            if !entry.format().accepts(target) {
                return Err(ActionConfigError::IncompatibleTarget {
                    format: entry.format().to_string(),
                    target: target.to_string(),
                }
                .into());
            }
        }
        entry.requested_conversion = target;
        Ok(())
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        move_item(&mut self.entries, from, to)
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.ensure_unlocked()?;
        self.entries.clear();
        Ok(())
    }

    /// Update one file's status. Allowed while a run holds the lock.
    ///
    /// While a file stays `InProgress` its progress never goes down.
    pub fn set_status(
        &mut self,
        id: FileId,
        status: ProcessStatus,
        progress: u8,
    ) -> Result<(), StoreError> {
        let entry = self.entry_mut(id)?;
        let progress = progress.min(100);
        entry.progress = if entry.status == ProcessStatus::InProgress
            && status == ProcessStatus::InProgress
        {
            entry.progress.max(progress)
        } else {
            progress
        };
        entry.status = status;
        Ok(())
    }

    pub fn set_all_statuses(&mut self, status: ProcessStatus, progress: u8) {
        let progress = progress.min(100);
        for entry in &mut self.entries {
            entry.status = status;
            entry.progress = progress;
        }
    }

    /// Take the run lock. Returns `false` if it was already held.
    pub fn lock_for_run(&mut self) -> bool {
        !std::mem::replace(&mut self.locked, true)
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn get(&self, id: FileId) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes()).sum()
    }

    pub fn completed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status() == ProcessStatus::Completed)
            .count()
    }

    pub fn counts_by_status(&self) -> StatusCounts {
        self.entries.iter().map(|e| e.status()).collect()
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(IngestValidator::default(), Arc::new(RandomIds))
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("entries", &self.entries.len())
            .field("locked", &self.locked)
            .finish()
    }
}
