use std::env;

use crate::error::ConfigError;

const MAX_FILE_SIZE_MB: u64 = 100;
const IMAGE_MAX_DIMENSION: u32 = 800;
const IMAGE_MAX_SIZE_MB: u64 = 1;
const DEFAULT_ALLOWED_EXTENSIONS: &str = "docx,doc,pdf,xls,xlsx,png,jpg,jpeg,gif";
const DEFAULT_BUNDLE_NAME: &str = "processed_files.zip";

const MIB: u64 = 1024 * 1024;

/// Limits and defaults for ingestion and processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    /// Longest edge, in pixels, of a recompressed image.
    pub image_max_dimension: u32,
    /// Byte budget the image recompressor aims for.
    pub image_max_size_bytes: u64,
    pub bundle_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * MIB,
            allowed_extensions: split_list(DEFAULT_ALLOWED_EXTENSIONS),
            image_max_dimension: IMAGE_MAX_DIMENSION,
            image_max_size_bytes: IMAGE_MAX_SIZE_MB * MIB,
            bundle_name: DEFAULT_BUNDLE_NAME.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the environment (and a `.env` file if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_file_size_mb = lookup("DROPKIT_MAX_FILE_SIZE_MB")
            .unwrap_or_else(|| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let allowed_extensions = split_list(
            &lookup("DROPKIT_ALLOWED_EXTENSIONS")
                .unwrap_or_else(|| DEFAULT_ALLOWED_EXTENSIONS.to_string()),
        );

        let image_max_dimension = lookup("DROPKIT_IMAGE_MAX_DIMENSION")
            .unwrap_or_else(|| IMAGE_MAX_DIMENSION.to_string())
            .parse::<u32>()
            .unwrap_or(IMAGE_MAX_DIMENSION);

        let image_max_size_mb = lookup("DROPKIT_IMAGE_MAX_SIZE_MB")
            .unwrap_or_else(|| IMAGE_MAX_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(IMAGE_MAX_SIZE_MB);

        let bundle_name =
            lookup("DROPKIT_BUNDLE_NAME").unwrap_or_else(|| DEFAULT_BUNDLE_NAME.to_string());

        let config = Self {
            max_file_size_bytes: max_file_size_mb.saturating_mul(MIB),
            allowed_extensions,
            image_max_dimension,
            image_max_size_bytes: image_max_size_mb.saturating_mul(MIB),
            bundle_name,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size_bytes == 0 {
            return Err(ConfigError::NotPositive {
                key: "DROPKIT_MAX_FILE_SIZE_MB",
            });
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Empty {
                key: "DROPKIT_ALLOWED_EXTENSIONS",
            });
        }
        if self.image_max_dimension == 0 {
            return Err(ConfigError::NotPositive {
                key: "DROPKIT_IMAGE_MAX_DIMENSION",
            });
        }
        if self.image_max_size_bytes == 0 {
            return Err(ConfigError::NotPositive {
                key: "DROPKIT_IMAGE_MAX_SIZE_MB",
            });
        }
        let name = self.bundle_name.trim();
        if name.len() <= ".zip".len()
            || !name.to_lowercase().ends_with(".zip")
            || name.contains(['/', '\\'])
        {
            return Err(ConfigError::InvalidBundleName(self.bundle_name.clone()));
        }
        Ok(())
    }

    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
