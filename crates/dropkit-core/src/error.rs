//! Error types module
//!
//! Each concern has its own error enum. `AppError` unifies them for callers
//! that only need to report a failure, such as the command line front end.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::models::FileId;

/// Ingestion-time validation failures. Every variant names the offending file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File '{file_name}' is too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge {
        file_name: String,
        size: u64,
        max: u64,
    },

    #[error("File '{file_name}' has an unsupported extension '{extension}' (allowed: {allowed})")]
    UnsupportedExtension {
        file_name: String,
        extension: String,
        allowed: String,
    },

    #[error("File name is empty")]
    EmptyFileName,
}

impl ValidationError {
    pub fn file_name(&self) -> Option<&str> {
        match self {
            ValidationError::FileTooLarge { file_name, .. }
            | ValidationError::UnsupportedExtension { file_name, .. } => Some(file_name),
            ValidationError::EmptyFileName => None,
        }
    }
}

/// Store mutation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Cannot modify the store while a run is in progress")]
    RunInProgress,

    #[error("Index {index} out of range (len: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No entry with id {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    ActionConfig(#[from] ActionConfigError),
}

/// Invalid action step configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionConfigError {
    #[error("Unknown action kind: {0}")]
    UnknownKind(String),

    #[error("Missing option '{0}'")]
    MissingOption(String),

    #[error("Invalid value '{value}' for option '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("Option '{key}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Target {target} is not supported for {format} files")]
    IncompatibleTarget { format: String, target: String },
}

/// Why a single file could not be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionCause {
    /// The codec rejected the source bytes.
    Corrupt,
    /// The source uses a feature no codec here understands.
    Unsupported,
    /// Memory or size limits were hit.
    ResourceExhausted,
    /// The codec failed while producing output.
    Codec,
}

impl Display for ConversionCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ConversionCause::Corrupt => write!(f, "corrupt input"),
            ConversionCause::Unsupported => write!(f, "unsupported input"),
            ConversionCause::ResourceExhausted => write!(f, "resource exhausted"),
            ConversionCause::Codec => write!(f, "codec failure"),
        }
    }
}

/// A conversion failure for one file, carrying its identity and a readable cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to process '{file_name}' ({cause}): {message}")]
pub struct ConversionError {
    pub file_id: FileId,
    pub file_name: String,
    pub cause: ConversionCause,
    pub message: String,
}

impl ConversionError {
    pub fn new(
        file_id: FileId,
        file_name: impl Into<String>,
        cause: ConversionCause,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            cause,
            message: message.into(),
        }
    }
}

/// Failures while combining outputs or building the bundle.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to write archive entry '{name}': {message}")]
    Entry { name: String, message: String },

    #[error("Failed to finalize archive: {0}")]
    Finalize(String),

    #[error("Failed to combine outputs into '{name}': {message}")]
    Combine { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a run is refused before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("Please add files to process")]
    NoFiles,

    #[error("A processing run is already active")]
    AlreadyRunning,

    #[error("Action '{kind}' is misconfigured: {source}")]
    InvalidAction {
        kind: String,
        #[source]
        source: ActionConfigError,
    },
}

/// Environment configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be greater than zero")]
    NotPositive { key: &'static str },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },

    #[error("Invalid bundle name '{0}': must end with .zip and contain no path separators")]
    InvalidBundleName(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid action: {0}")]
    ActionConfig(#[from] ActionConfigError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Run rejected: {0}")]
    Run(#[from] RunError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Message suitable for an end user, without internal prefixes.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.to_string(),
            AppError::Store(e) => e.to_string(),
            AppError::ActionConfig(e) => e.to_string(),
            AppError::Conversion(e) => e.to_string(),
            AppError::Archive(e) => e.to_string(),
            AppError::Run(e) => e.to_string(),
            AppError::Config(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_file() {
        let err = ValidationError::FileTooLarge {
            file_name: "huge.pdf".to_string(),
            size: 200,
            max: 100,
        };
        assert_eq!(err.file_name(), Some("huge.pdf"));
        assert!(err.to_string().contains("huge.pdf"));
    }

    #[test]
    fn test_app_error_from_conversions() {
        let err: AppError = RunError::NoFiles.into();
        assert!(matches!(err, AppError::Run(RunError::NoFiles)));
        assert_eq!(err.user_message(), "Please add files to process");

        let err: AppError = StoreError::RunInProgress.into();
        assert!(err.to_string().starts_with("Store error"));
    }

    #[test]
    fn test_conversion_error_display() {
        let err = ConversionError::new(
            FileId::from_u128(7),
            "broken.png",
            ConversionCause::Corrupt,
            "bad header",
        );
        let text = err.to_string();
        assert!(text.contains("broken.png"));
        assert!(text.contains("corrupt input"));
        assert!(text.contains("bad header"));
    }
}
