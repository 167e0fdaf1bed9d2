//! Export pipeline
//!
//! This module turns an [`ExportCommand`](crate::model::ExportCommand) into an
//! ordered sequence of chunks delivered to a caller-supplied sink.
//!
//! # Architecture
//!
//! 1. **PageFetcher**: requests pages from the backend, resuming strictly
//!    after the previous page (search-after cursor or scroll context)
//! 2. **ChunkAssembler**: projects the hits of a page onto the requested fields
//! 3. **ChunkSink**: receives chunks in order (memory, channel, files)
//!
//! These components are orchestrated by the **ExportOrchestrator**, which
//! validates the command, resolves indices and runs the fetch loop.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use search_export::backend::{JsonQueryTranslator, MemoryBackend, SearchAdapter};
//! use search_export::config::Config;
//! use search_export::export::{CollectingSink, ExportOrchestrator};
//! use search_export::model::{ExportCommand, TimeRange};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(MemoryBackend::from_fixture_file(Path::new("fixture.json"))?);
//! let adapter = Arc::new(SearchAdapter::new(
//!     backend.clone(),
//!     Arc::new(JsonQueryTranslator::default()),
//!     Duration::from_secs(60),
//!     8,
//! ));
//! let orchestrator = ExportOrchestrator::from_config(backend, adapter, &Config::default());
//!
//! let range = TimeRange::parse("2015-01-01T00:00:00Z", "2015-01-02T00:00:00Z")?;
//! let command = ExportCommand::builder(range).stream("stream-01").build()?;
//!
//! let mut sink = CollectingSink::new();
//! let result = orchestrator.run(&command, &mut sink).await?;
//! println!("{} records", result.documents_exported);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod fetcher;
pub mod orchestrator;
pub mod progress;
pub mod sink;
pub mod writers;


pub use assembler::ChunkAssembler;
pub use fetcher::{FetchStrategy, Page, PageFetcher, ScrollFetcher, SearchAfterFetcher};
pub use orchestrator::{ExportFailure, ExportOrchestrator, ExportResult};
pub use progress::{ProgressSink, ProgressTracker};
pub use sink::{ChannelSink, ChunkReceiver, ChunkSink, CollectingSink};
pub use writers::{CsvWriter, FormatWriter, JsonLWriter};
