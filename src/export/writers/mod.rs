//! Format writers for export operations
//!
//! File-backed chunk sinks for the supported output formats (JSON Lines, CSV).

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::{ExportError, Result};

use super::sink::ChunkSink;

pub mod csv;
pub mod jsonl;

pub use csv::CsvWriter;
pub use jsonl::JsonLWriter;

/// A chunk sink that writes to a file
#[async_trait]
pub trait FormatWriter: ChunkSink {
    /// Finalize the output (flush buffers, write footers, etc.)
    async fn finalize(&mut self) -> Result<()>;

    /// Get the current file size in bytes
    async fn file_size(&self) -> Result<u64>;
}

/// Helper function to create a buffered file writer
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .await
        .map_err(|e| ExportError::Sink(format!("Failed to create file {}: {}", path.display(), e)))?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

/// Helper function to validate that the output directory exists
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ExportError::Sink(format!(
                "Directory does not exist: {}",
                parent.display()
            )));
        }
    }

    Ok(())
}

pub(crate) async fn file_size(path: &Path) -> Result<u64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ExportError::Sink(format!("Failed to get file metadata: {}", e)))?;
    Ok(metadata.len())
}
