//! Ingestion validation for dropped files.

use crate::config::PipelineConfig;
use crate::error::ValidationError;
use crate::format::extension_of;

/// Checks size and extension limits before a file enters the store.
#[derive(Debug, Clone)]
pub struct IngestValidator {
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl IngestValidator {
    pub fn new(max_file_size: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.allowed_extensions.clone(),
        )
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn validate_file_size(&self, file_name: &str, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                file_name: file_name.to_string(),
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn validate_extension(&self, file_name: &str) -> Result<(), ValidationError> {
        let extension = extension_of(file_name).unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::UnsupportedExtension {
                file_name: file_name.to_string(),
                extension,
                allowed: self.allowed_extensions.join(", "),
            });
        }
        Ok(())
    }

    /// Validate one file: name, then extension, then size.
    pub fn validate(&self, file_name: &str, size: u64) -> Result<(), ValidationError> {
        if file_name.trim().is_empty() {
            return Err(ValidationError::EmptyFileName);
        }
        self.validate_extension(file_name)?;
        self.validate_file_size(file_name, size)
    }
}

impl Default for IngestValidator {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
