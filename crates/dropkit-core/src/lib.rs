//! Dropkit Core Library
//!
//! Domain models, error types, configuration, ingestion validation and the
//! file and action stores shared by every Dropkit component.

pub mod config;
pub mod error;
pub mod format;
pub mod ids;
pub mod models;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{
    ActionConfigError, AppError, ArchiveError, ConfigError, ConversionCause, ConversionError,
    RunError, StoreError, ValidationError,
};
pub use format::{ConversionTarget, FileFormat};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use store::{ActionList, FileStore};
pub use validation::IngestValidator;
