//! Search Export Library
//!
//! Bulk export of time-series search results. An export pages through a
//! search backend by sort cursor ("search after" the last seen record),
//! projects each page onto the requested fields and streams the resulting
//! chunks to a sink, in order, without gaps or duplicates.
//!
//! # Modules
//!
//! - `backend`: Backend seams (search, query translation, index resolution) and the in-memory backend
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and backend failure classification
//! - `export`: Export orchestration, page fetchers, chunk assembly and sinks
//! - `model`: Export command, cursors, hits and chunks
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use search_export::backend::{JsonQueryTranslator, MemoryBackend, SearchAdapter};
//! use search_export::export::{CollectingSink, ExportOrchestrator};
//! use search_export::model::{ExportCommand, TimeRange};
//! use search_export::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let backend = Arc::new(MemoryBackend::from_fixture_file(std::path::Path::new("messages.json"))?);
//!     let translator = Arc::new(JsonQueryTranslator::from_config(&config.export));
//!     let adapter = Arc::new(SearchAdapter::from_config(backend.clone(), translator, &config));
//!     let orchestrator = ExportOrchestrator::from_config(backend, adapter, &config);
//!
//!     let range = TimeRange::parse("2015-01-01T00:00:00Z", "2015-01-02T00:00:00Z")?;
//!     let command = ExportCommand::builder(range)
//!         .streams(["stream-01", "stream-02"])
//!         .query_string("Ha Ho")
//!         .build()?;
//!
//!     let mut sink = CollectingSink::new();
//!     let result = orchestrator.run(&command, &mut sink).await?;
//!     println!("Exported {} records", result.documents_exported);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportFailure, ExportOrchestrator, ExportResult};
pub use model::{Chunk, ExportCommand};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
