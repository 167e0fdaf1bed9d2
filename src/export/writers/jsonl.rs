//! JSON Lines writer for export operations
//!
//! Writes one JSON object per record, with keys in the exported field order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::Result;
use crate::export::sink::ChunkSink;
use crate::model::Chunk;

use super::{FormatWriter, create_writer, file_size, validate_path};

/// Writer for JSON Lines format
pub struct JsonLWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Number of records written
    written: usize,
}

impl JsonLWriter {
    /// Create a new JSON Lines writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        validate_path(path)?;
        let writer = create_writer(path).await?;

        debug!("Created JSON Lines writer for: {}", path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

#[async_trait]
impl ChunkSink for JsonLWriter {
    async fn accept(&mut self, chunk: Chunk) -> Result<()> {
        for record in chunk.records() {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');
            self.writer.write_all(&line).await?;
        }

        self.written += chunk.len();
        debug!(
            "Wrote {} records to JSON Lines (total: {})",
            chunk.len(),
            self.written
        );
        Ok(())
    }
}

#[async_trait]
impl FormatWriter for JsonLWriter {
    async fn finalize(&mut self) -> Result<()> {
        self.writer.flush().await?;
        debug!(
            "Finalized JSON Lines file: {} ({} records)",
            self.path.display(),
            self.written
        );
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        file_size(&self.path).await
    }
}
