//! Format classification and the conversion compatibility table.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::ActionConfigError;

/// Semantic format of an input file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Document,
    Pdf,
    Spreadsheet,
    Image,
    Other,
}

impl FileFormat {
    /// Classify a file by the final dot-delimited suffix of its name.
    ///
    /// Total: names without an extension, empty names and unknown
    /// extensions all map to [`FileFormat::Other`].
    pub fn classify(file_name: &str) -> Self {
        match extension_of(file_name).as_deref() {
            Some("docx" | "doc") => FileFormat::Document,
            Some("pdf") => FileFormat::Pdf,
            Some("xls" | "xlsx") => FileFormat::Spreadsheet,
            Some("png" | "jpg" | "jpeg" | "gif") => FileFormat::Image,
            _ => FileFormat::Other,
        }
    }

    /// Conversion targets this format accepts, `None` always first.
    pub fn supported_targets(self) -> &'static [ConversionTarget] {
        match self {
            FileFormat::Image => &[ConversionTarget::None, ConversionTarget::Webp],
            FileFormat::Pdf => &[ConversionTarget::None, ConversionTarget::Txt],
            FileFormat::Document => &[
                ConversionTarget::None,
                ConversionTarget::Txt,
                ConversionTarget::Pdf,
            ],
            FileFormat::Spreadsheet => &[
                ConversionTarget::None,
                ConversionTarget::Csv,
                ConversionTarget::Json,
            ],
            FileFormat::Other => &[ConversionTarget::None],
        }
    }

    pub fn accepts(self, target: ConversionTarget) -> bool {
        self.supported_targets().contains(&target)
    }
}

impl Display for FileFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileFormat::Document => write!(f, "document"),
            FileFormat::Pdf => write!(f, "pdf"),
            FileFormat::Spreadsheet => write!(f, "spreadsheet"),
            FileFormat::Image => write!(f, "image"),
            FileFormat::Other => write!(f, "other"),
        }
    }
}

/// Requested per-file conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionTarget {
    None,
    Pdf,
    Webp,
    Txt,
    Csv,
    Json,
}

impl ConversionTarget {
    /// Canonical extension of the produced container, `None` for pass-through.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            ConversionTarget::None => None,
            ConversionTarget::Pdf => Some("pdf"),
            ConversionTarget::Webp => Some("webp"),
            ConversionTarget::Txt => Some("txt"),
            ConversionTarget::Csv => Some("csv"),
            ConversionTarget::Json => Some("json"),
        }
    }
}

impl Display for ConversionTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.extension() {
            Some(ext) => write!(f, "{}", ext),
            None => write!(f, "none"),
        }
    }
}

impl FromStr for ConversionTarget {
    type Err = ActionConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(ConversionTarget::None),
            "pdf" => Ok(ConversionTarget::Pdf),
            "webp" => Ok(ConversionTarget::Webp),
            "txt" | "text" => Ok(ConversionTarget::Txt),
            "csv" => Ok(ConversionTarget::Csv),
            "json" => Ok(ConversionTarget::Json),
            other => Err(ActionConfigError::InvalidValue {
                key: "format".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Lower-cased text after the last `.` of a file name, if any.
pub fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// File name without its final extension.
///
/// Splits at the same `.` [`extension_of`] reads, so `.pdf` has an empty stem.
pub fn stem_of(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem)
}

/// Replace the final extension of `file_name` with `extension`.
///
/// `a.b.xlsx` becomes `a.b.csv` and `.pdf` becomes `.txt`. A name without
/// an extension gains one.
pub fn replace_extension(file_name: &str, extension: &str) -> String {
    format!("{}.{}", stem_of(file_name), extension)
}
