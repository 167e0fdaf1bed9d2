//! CSV writer for export operations
//!
//! The header row is the exported field list; missing fields are written as
//! empty cells and values are escaped where necessary.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::Result;
use crate::export::sink::ChunkSink;
use crate::model::{Chunk, FieldValue, Record};

use super::{FormatWriter, create_writer, file_size, validate_path};

/// Writer for CSV format
pub struct CsvWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Column headers, in export field order
    headers: Vec<String>,
    /// Whether headers have been written
    headers_written: bool,
    /// Number of records written
    written: usize,
}

impl CsvWriter {
    /// Create a new CSV writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `headers` - Exported fields, in order
    pub async fn new(path: impl AsRef<Path>, headers: Vec<String>) -> Result<Self> {
        let path = path.as_ref();
        validate_path(path)?;
        let writer = create_writer(path).await?;

        debug!("Created CSV writer for: {}", path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            headers,
            headers_written: false,
            written: 0,
        })
    }

    async fn write_headers(&mut self) -> Result<()> {
        let header_line = self
            .headers
            .iter()
            .map(|h| Self::escape_csv_value(h))
            .collect::<Vec<_>>()
            .join(",");
        self.writer.write_all(header_line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.headers_written = true;
        debug!("Wrote CSV headers: {} fields", self.headers.len());
        Ok(())
    }

    fn format_row(&self, record: &Record) -> String {
        self.headers
            .iter()
            .map(|field| {
                let text = match record.get(field) {
                    Some(FieldValue::Present(value)) => Self::plain_text(value),
                    Some(FieldValue::Missing) | None => String::new(),
                };
                Self::escape_csv_value(&text)
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn plain_text(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Self::plain_text)
                .collect::<Vec<_>>()
                .join(";"),
            other => other.to_string(),
        }
    }

    /// Escape a CSV value if it contains a comma, quote or line break
    fn escape_csv_value(value: &str) -> String {
        if value.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

#[async_trait]
impl ChunkSink for CsvWriter {
    async fn accept(&mut self, chunk: Chunk) -> Result<()> {
        if !self.headers_written {
            self.write_headers().await?;
        }

        for record in chunk.records() {
            let mut row = self.format_row(record);
            row.push('\n');
            self.writer.write_all(row.as_bytes()).await?;
        }

        self.written += chunk.len();
        debug!("Wrote {} records to CSV (total: {})", chunk.len(), self.written);
        Ok(())
    }
}

#[async_trait]
impl FormatWriter for CsvWriter {
    async fn finalize(&mut self) -> Result<()> {
        if !self.headers_written {
            self.write_headers().await?;
        }
        self.writer.flush().await?;
        debug!("Finalized CSV file: {} ({} records)", self.path.display(), self.written);
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        file_size(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers() -> Vec<String> {
        vec!["timestamp".into(), "source".into(), "message".into()]
    }

    fn record(values: [Option<Value>; 3]) -> Record {
        let mut record = Record::with_capacity(3);
        for (field, value) in headers().into_iter().zip(values) {
            record.push(field, value.map_or(FieldValue::Missing, FieldValue::Present));
        }
        record
    }

    #[tokio::test]
    async fn test_csv_writer_basic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = CsvWriter::new(&path, headers()).await.unwrap();

        let chunk = Chunk::new(
            vec![
                record([Some(json!("2015-01-01T01:00:00.000Z")), Some(json!("source-1")), Some(json!("Ha"))]),
                record([Some(json!("2015-01-01T01:59:59.999Z")), None, Some(json!("He, there"))]),
            ],
            true,
        );
        writer.accept(chunk).await.unwrap();
        writer.finalize().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,source,message");
        assert_eq!(lines[1], "2015-01-01T01:00:00.000Z,source-1,Ha");
        assert_eq!(lines[2], "2015-01-01T01:59:59.999Z,,\"He, there\"");
        assert!(writer.file_size().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_empty_export_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let mut writer = CsvWriter::new(&path, headers()).await.unwrap();
        writer.finalize().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "timestamp,source,message\n");
    }

    #[test]
    fn test_csv_escape_value() {
        assert_eq!(CsvWriter::escape_csv_value("simple"), "simple");
        assert_eq!(CsvWriter::escape_csv_value("with,comma"), "\"with,comma\"");
        assert_eq!(CsvWriter::escape_csv_value("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(CsvWriter::escape_csv_value("with\nnewline"), "\"with\nnewline\"");
    }

    #[test]
    fn test_plain_text_values() {
        assert_eq!(CsvWriter::plain_text(&json!(["stream-01", "stream-02"])), "stream-01;stream-02");
        assert_eq!(CsvWriter::plain_text(&json!(42)), "42");
        assert_eq!(CsvWriter::plain_text(&Value::Null), "");
    }
}
