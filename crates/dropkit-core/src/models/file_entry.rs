use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::format::{ConversionTarget, FileFormat};
use crate::ids::FileId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

impl Display for ProcessStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessStatus::NotStarted => write!(f, "not_started"),
            ProcessStatus::InProgress => write!(f, "in_progress"),
            ProcessStatus::Completed => write!(f, "completed"),
            ProcessStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProcessStatus::NotStarted),
            "in_progress" => Ok(ProcessStatus::InProgress),
            "completed" => Ok(ProcessStatus::Completed),
            "failed" => Ok(ProcessStatus::Failed),
            _ => Err(format!("Invalid process status: {}", s)),
        }
    }
}

/// A raw file handed over by the drop zone, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// One user-supplied input file plus its processing state.
///
/// `format`, `name` and the raw bytes are fixed at ingestion. Status and
/// progress only change through the file store.
#[derive(Debug, Clone)]
pub struct FileEntry {
    id: FileId,
    name: String,
    size_bytes: u64,
    format: FileFormat,
    data: Bytes,
    pub(crate) requested_conversion: Option<ConversionTarget>,
    pub(crate) status: ProcessStatus,
    pub(crate) progress: u8,
}

impl FileEntry {
    pub fn new(id: FileId, incoming: IncomingFile) -> Self {
        let format = FileFormat::classify(&incoming.name);
        Self {
            id,
            size_bytes: incoming.size_bytes(),
            name: incoming.name,
            format,
            data: incoming.data,
            requested_conversion: None,
            status: ProcessStatus::NotStarted,
            progress: 0,
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Original content. Cloning the handle is cheap and never copies the buffer.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn requested_conversion(&self) -> Option<ConversionTarget> {
        self.requested_conversion
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }
}

/// Serializable view of a file entry, without its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntrySummary {
    pub id: FileId,
    pub name: String,
    pub size_bytes: u64,
    pub format: FileFormat,
    pub requested_conversion: Option<ConversionTarget>,
    pub status: ProcessStatus,
    pub progress: u8,
}

impl From<&FileEntry> for FileEntrySummary {
    fn from(entry: &FileEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            size_bytes: entry.size_bytes,
            format: entry.format,
            requested_conversion: entry.requested_conversion,
            status: entry.status,
            progress: entry.progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_defaults() {
        let entry = FileEntry::new(
            FileId::from_u128(1),
            IncomingFile::new("budget.xlsx", vec![1u8, 2, 3]),
        );
        assert_eq!(entry.format(), FileFormat::Spreadsheet);
        assert_eq!(entry.size_bytes(), 3);
        assert_eq!(entry.status(), ProcessStatus::NotStarted);
        assert_eq!(entry.progress(), 0);
        assert_eq!(entry.requested_conversion(), None);
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            ProcessStatus::NotStarted,
            ProcessStatus::InProgress,
            ProcessStatus::Completed,
            ProcessStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<ProcessStatus>(), Ok(status));
        }
        assert!("done".parse::<ProcessStatus>().is_err());
    }
}
