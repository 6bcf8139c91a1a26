//! ZIP bundle building.

use bytes::Bytes;
use dropkit_core::models::{Bundle, OutputFile};
use dropkit_core::ArchiveError;
use std::io::{Cursor, Write};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::naming::{sanitize_entry_name, UniqueNames};

/// Packs named outputs into one ZIP archive, keeping insertion order.
///
/// Entry names are reduced to a single path segment and made unique.
pub struct BundleBuilder {
    name: String,
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    names: UniqueNames,
    entries: Vec<String>,
}

impl BundleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o644),
            names: UniqueNames::new(),
            entries: Vec::new(),
        }
    }

    /// Add one output; returns the entry name it was stored under.
    pub fn add(&mut self, output: &OutputFile) -> Result<String, ArchiveError> {
        let fallback = format!("unnamed_{}", self.entries.len() + 1);
        let entry_name = self
            .names
            .claim(&sanitize_entry_name(&output.name, &fallback));

        self.zip
            .start_file(entry_name.as_str(), self.options)
            .map_err(|e| ArchiveError::Entry {
                name: entry_name.clone(),
                message: e.to_string(),
            })?;
        self.zip
            .write_all(&output.data)
            .map_err(|e| ArchiveError::Entry {
                name: entry_name.clone(),
                message: e.to_string(),
            })?;

        if entry_name != output.name {
            tracing::debug!(
                original = %output.name,
                entry = %entry_name,
                "Archive entry renamed"
            );
        }
        self.entries.push(entry_name.clone());
        Ok(entry_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(mut self) -> Result<Bundle, ArchiveError> {
        let cursor = self
            .zip
            .finish()
            .map_err(|e| ArchiveError::Finalize(e.to_string()))?;
        let data = Bytes::from(cursor.into_inner());

        tracing::info!(
            bundle = %self.name,
            entries = self.entries.len(),
            bytes = data.len(),
            "Bundle finalized"
        );

        Ok(Bundle {
            name: self.name,
            data,
            entries: self.entries,
        })
    }
}

/// Build a bundle from outputs in the given order.
pub fn build_bundle(name: &str, outputs: &[OutputFile]) -> Result<Bundle, ArchiveError> {
    let mut builder = BundleBuilder::new(name);
    for output in outputs {
        builder.add(output)?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_entries(data: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    #[test]
    fn test_bundle_keeps_order_and_bytes() {
        let outputs = vec![
            OutputFile::new("budget.xlsx", b"sheet".to_vec(), None),
            OutputFile::new("photo.webp", b"pixels".to_vec(), None),
            OutputFile::new("notes.txt", b"text".to_vec(), None),
        ];
        let bundle = build_bundle("processed_files.zip", &outputs).unwrap();
        assert_eq!(bundle.name, "processed_files.zip");
        assert_eq!(bundle.entries, ["budget.xlsx", "photo.webp", "notes.txt"]);

        let entries = read_entries(&bundle.data);
        assert_eq!(entries[0], ("budget.xlsx".to_string(), b"sheet".to_vec()));
        assert_eq!(entries[1].0, "photo.webp");
        assert_eq!(entries[2].1, b"text".to_vec());
    }

    #[test]
    fn test_colliding_names_get_suffixes() {
        let outputs = vec![
            OutputFile::new("summary.pdf", b"1".to_vec(), None),
            OutputFile::new("summary.pdf", b"2".to_vec(), None),
            OutputFile::new("../summary.pdf", b"3".to_vec(), None),
        ];
        let bundle = build_bundle("out.zip", &outputs).unwrap();
        assert_eq!(
            bundle.entries,
            ["summary.pdf", "summary (2).pdf", "summary (3).pdf"]
        );
    }

    #[test]
    fn test_empty_bundle_is_valid_zip() {
        let bundle = BundleBuilder::new("empty.zip").finish().unwrap();
        assert!(bundle.entries.is_empty());
        assert!(read_entries(&bundle.data).is_empty());
    }
}
