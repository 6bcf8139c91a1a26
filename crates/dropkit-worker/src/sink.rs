//! Bundle sinks
//!
//! A sink receives the finished bundle once a run completes. The command line
//! front end writes it to a directory; tests keep it in memory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dropkit_core::models::Bundle;
use dropkit_processing::naming::sanitize_entry_name;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

#[async_trait]
pub trait BundleSink: Send + Sync {
    /// Hand the bundle over for download or storage.
    async fn deliver(&self, bundle: &Bundle) -> Result<()>;
}

/// Writes bundles into a directory under their own name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a bundle with this name ends up.
    pub fn path_for(&self, bundle_name: &str) -> PathBuf {
        self.dir
            .join(sanitize_entry_name(bundle_name, "processed_files.zip"))
    }
}

#[async_trait]
impl BundleSink for DirectorySink {
    async fn deliver(&self, bundle: &Bundle) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;

        let path = self.path_for(&bundle.name);
        tokio::fs::write(&path, &bundle.data)
            .await
            .with_context(|| format!("Failed to write bundle: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            bytes = bundle.data.len(),
            "Bundle saved"
        );
        Ok(())
    }
}

/// Keeps delivered bundles in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    bundles: Mutex<Vec<Bundle>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundles(&self) -> Vec<Bundle> {
        self.bundles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Bundle> {
        self.bundles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait]
impl BundleSink for MemorySink {
    async fn deliver(&self, bundle: &Bundle) -> Result<()> {
        self.bundles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bundle.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bundle(name: &str) -> Bundle {
        Bundle {
            name: name.to_string(),
            data: Bytes::from_static(b"PK\x05\x06"),
            entries: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));
        sink.deliver(&bundle("result.zip")).await.unwrap();

        let written = std::fs::read(dir.path().join("out").join("result.zip")).unwrap();
        assert_eq!(written, b"PK\x05\x06");
    }

    #[test]
    fn test_directory_sink_strips_path_components() {
        let sink = DirectorySink::new("/tmp/dropkit");
        assert_eq!(
            sink.path_for("../../escape.zip"),
            Path::new("/tmp/dropkit").join("escape.zip")
        );
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.deliver(&bundle("a.zip")).await.unwrap();
        sink.deliver(&bundle("b.zip")).await.unwrap();
        assert_eq!(sink.bundles().len(), 2);
        assert_eq!(sink.last().unwrap().name, "b.zip");
    }
}
