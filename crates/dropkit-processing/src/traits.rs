//! Codec seams.
//!
//! Byte-level format work sits behind these traits so the dispatcher and
//! stages can be exercised with failing or recording codecs in tests.

use bytes::Bytes;
use dropkit_core::ConversionCause;
use std::sync::Arc;

use crate::document::DocxTextExtractor;
use crate::image::StandardImageCodec;
use crate::pdf::LopdfCodec;
use crate::spreadsheet::{CalamineReader, Sheet};

use ::image::{DynamicImage, ImageFormat};

/// A codec failure, before it is attributed to a particular file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CodecError {
    pub cause: ConversionCause,
    pub message: String,
}

impl CodecError {
    pub fn new(cause: ConversionCause, message: impl Into<String>) -> Self {
        Self {
            cause,
            message: message.into(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(ConversionCause::Corrupt, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ConversionCause::Unsupported, message)
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::new(ConversionCause::Codec, message)
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Decodes raster images and reports the container they came in.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, data: &[u8]) -> CodecResult<(DynamicImage, ImageFormat)>;
}

/// PDF parsing, rewriting and synthesis.
pub trait PdfCodec: Send + Sync {
    /// Re-save the document with unused objects pruned and streams compressed.
    fn optimize(&self, data: &[u8]) -> CodecResult<Bytes>;

    /// Text of each page, in page order.
    fn extract_pages(&self, data: &[u8]) -> CodecResult<Vec<String>>;

    /// Concatenate the pages of every document, in the order given.
    fn merge(&self, documents: &[&[u8]]) -> CodecResult<Bytes>;

    /// Lay plain text out on A4 pages.
    fn render_text(&self, title: &str, text: &str) -> CodecResult<Bytes>;
}

/// Word-processing documents.
pub trait DocumentCodec: Send + Sync {
    /// Raw text content, one line per paragraph.
    fn extract_text(&self, data: &[u8], extension: &str) -> CodecResult<String>;
}

/// Workbooks.
pub trait SpreadsheetCodec: Send + Sync {
    /// Cells of the first worksheet.
    fn first_sheet(&self, data: &[u8]) -> CodecResult<Sheet>;
}

/// The set of codecs a dispatcher works with.
#[derive(Clone)]
pub struct Codecs {
    pub image: Arc<dyn ImageCodec>,
    pub pdf: Arc<dyn PdfCodec>,
    pub document: Arc<dyn DocumentCodec>,
    pub spreadsheet: Arc<dyn SpreadsheetCodec>,
}

impl Default for Codecs {
    fn default() -> Self {
        Self {
            image: Arc::new(StandardImageCodec),
            pdf: Arc::new(LopdfCodec),
            document: Arc::new(DocxTextExtractor),
            spreadsheet: Arc::new(CalamineReader),
        }
    }
}

impl std::fmt::Debug for Codecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codecs").finish_non_exhaustive()
    }
}

/// Run a codec call, turning a panic inside third-party code into a
/// [`ConversionCause::Corrupt`] error.
pub fn guard_panics<T, F>(what: &str, f: F) -> CodecResult<T>
where
    F: FnOnce() -> CodecResult<T>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(operation = what, "Codec panicked on malformed input");
            Err(CodecError::corrupt(format!(
                "{} failed: the file appears to be malformed",
                what
            )))
        }
    }
}
