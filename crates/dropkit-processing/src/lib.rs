//! Dropkit Processing Library
//!
//! Codec adapters and the per-file work of a run: the conversion dispatcher,
//! image compression, PDF, document and spreadsheet handling, action stages
//! and the ZIP bundle builder.

pub mod archive;
pub mod compression;
pub mod dispatcher;
pub mod document;
pub mod image;
pub mod naming;
pub mod pdf;
pub mod spreadsheet;
pub mod stages;
pub mod traits;

pub use archive::{build_bundle, BundleBuilder};
pub use compression::{ImageCompressor, OutputFormat, QualityPreset};
pub use dispatcher::ConversionDispatcher;
pub use crate::image::{ImageSettings, ImageTransformer};
pub use stages::{bundle_name, resolve_target, FileProcessor};
pub use traits::{CodecError, CodecResult, Codecs};
