//! Export orchestrator
//!
//! Drives one export from command to delivered chunks:
//! validate, resolve indices, then fetch, assemble and deliver page after
//! page until the data or the limit is exhausted.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{IndexResolver, QuerySpec, SearchAdapter, SortSpec};
use crate::config::Config;
use crate::error::ExportError;
use crate::model::{ExportCommand, SortCursor};

use super::assembler::ChunkAssembler;
use super::fetcher::{FetchStrategy, PageFetcher};
use super::sink::ChunkSink;

/// Result of a finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Number of records delivered to the sink
    pub documents_exported: u64,
    /// Number of chunks delivered to the sink
    pub chunks: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
    /// Whether the export was cancelled
    pub cancelled: bool,
}

/// A failed export: the error and how many records were delivered before it
#[derive(Debug)]
pub struct ExportFailure {
    pub delivered: u64,
    pub error: ExportError,
}

impl ExportFailure {
    fn new(delivered: u64, error: ExportError) -> Self {
        Self { delivered, error }
    }
}

impl fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} records delivered)", self.error, self.delivered)
    }
}

impl std::error::Error for ExportFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Running totals of one export
#[derive(Debug, Default)]
struct Progress {
    delivered: u64,
    chunks: u64,
}

/// How the fetch loop ended
enum LoopEnd {
    Exhausted,
    LimitReached,
    Cancelled,
}

/// Orchestrates exports against one backend
///
/// The orchestrator itself is stateless between exports; every call to
/// [`run`](Self::run) gets a fresh page fetcher.
pub struct ExportOrchestrator {
    resolver: Arc<dyn IndexResolver>,
    adapter: Arc<SearchAdapter>,
    strategy: FetchStrategy,
    sort: SortSpec,
    assembler: ChunkAssembler,
}

impl ExportOrchestrator {
    pub fn new(
        resolver: Arc<dyn IndexResolver>,
        adapter: Arc<SearchAdapter>,
        strategy: FetchStrategy,
        sort: SortSpec,
        assembler: ChunkAssembler,
    ) -> Self {
        Self {
            resolver,
            adapter,
            strategy,
            sort,
            assembler,
        }
    }

    /// Create an orchestrator with strategy and field names taken from configuration
    pub fn from_config(
        resolver: Arc<dyn IndexResolver>,
        adapter: Arc<SearchAdapter>,
        config: &Config,
    ) -> Self {
        Self::new(
            resolver,
            adapter,
            FetchStrategy::from_config(config),
            SortSpec::from(&config.export),
            ChunkAssembler::new(&config.export.timestamp_field),
        )
    }

    /// Run an export to completion
    pub async fn run(
        &self,
        command: &ExportCommand,
        sink: &mut dyn ChunkSink,
    ) -> Result<ExportResult, ExportFailure> {
        self.run_with_cancellation(command, sink, CancellationToken::new())
            .await
    }

    /// Run an export that stops before its next backend call once `token` is cancelled
    ///
    /// A chunk handed to the sink is always delivered in full. A cancelled
    /// export is not a failure: it returns the totals so far with
    /// `cancelled` set.
    pub async fn run_with_cancellation(
        &self,
        command: &ExportCommand,
        sink: &mut dyn ChunkSink,
        token: CancellationToken,
    ) -> Result<ExportResult, ExportFailure> {
        let start_time = Instant::now();

        // INIT
        command.validate().map_err(|e| ExportFailure::new(0, e))?;
        info!(
            "Starting export of {} stream(s), chunk size {}, limit {:?}",
            command.streams().len(),
            command.chunk_size(),
            command.limit()
        );

        // RESOLVE
        if token.is_cancelled() {
            return Ok(Self::finish(&Progress::default(), start_time, true));
        }
        let indices = self
            .resolver
            .resolve(command.streams(), command.time_range())
            .await
            .map_err(|e| ExportFailure::new(0, e))?;
        if indices.is_empty() {
            info!("No indices hold the requested streams in range, nothing to export");
            return Ok(Self::finish(&Progress::default(), start_time, false));
        }
        debug!("Resolved {} index(es): {:?}", indices.len(), indices);

        let spec = QuerySpec::from_command(command, indices.into_iter().collect(), self.sort.clone());
        let mut fetcher = self.strategy.create(Arc::clone(&self.adapter));
        let mut progress = Progress::default();

        let outcome = self
            .fetch_loop(fetcher.as_mut(), command, &spec, sink, &token, &mut progress)
            .await;

        if let Err(e) = fetcher.close().await {
            warn!("Failed to release fetcher resources: {}", e);
        }

        match outcome {
            Ok(end) => {
                let result = Self::finish(&progress, start_time, matches!(end, LoopEnd::Cancelled));
                match end {
                    LoopEnd::Cancelled => info!(
                        "Export cancelled after {} records in {} chunks",
                        result.documents_exported, result.chunks
                    ),
                    LoopEnd::LimitReached | LoopEnd::Exhausted => info!(
                        "Export completed: {} records, {} chunks, {} ms",
                        result.documents_exported, result.chunks, result.elapsed_ms
                    ),
                }
                Ok(result)
            }
            Err(error) => {
                warn!(
                    "Export failed after {} records ({}): {}",
                    progress.delivered,
                    error.kind(),
                    error
                );
                Err(ExportFailure::new(progress.delivered, error))
            }
        }
    }

    /// FETCH → ASSEMBLE → DECIDE until done
    async fn fetch_loop(
        &self,
        fetcher: &mut dyn PageFetcher,
        command: &ExportCommand,
        spec: &QuerySpec,
        sink: &mut dyn ChunkSink,
        token: &CancellationToken,
        progress: &mut Progress,
    ) -> Result<LoopEnd, ExportError> {
        let mut cursor: Option<SortCursor> = None;

        loop {
            if token.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }

            debug!("Fetching page #{} after {:?}", progress.chunks + 1, cursor);
            let page = if fetcher.interruptible() {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(LoopEnd::Cancelled),
                    page = fetcher.fetch(spec, cursor.as_ref()) => page?,
                }
            } else {
                let page = fetcher.fetch(spec, cursor.as_ref()).await?;
                if token.is_cancelled() {
                    return Ok(LoopEnd::Cancelled);
                }
                page
            };

            if !page.hits.is_empty() {
                let chunk = self.assembler.assemble(
                    &page.hits,
                    command.fields_in_order(),
                    progress.chunks == 0,
                    command.time_zone(),
                );
                let len = chunk.len() as u64;
                sink.accept(chunk).await?;

                progress.delivered += len;
                progress.chunks += 1;
                if progress.chunks % 10 == 0 {
                    info!(
                        "Progress: {} records exported ({} chunks)",
                        progress.delivered, progress.chunks
                    );
                }
            }

            if let Some(limit) = command.limit() {
                if progress.delivered >= limit {
                    debug!("Limit of {} reached with {} records", limit, progress.delivered);
                    return Ok(LoopEnd::LimitReached);
                }
            }

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => {
                    debug!("No more records available");
                    return Ok(LoopEnd::Exhausted);
                }
            }
        }
    }

    fn finish(progress: &Progress, start_time: Instant, cancelled: bool) -> ExportResult {
        ExportResult {
            documents_exported: progress.delivered,
            chunks: progress.chunks,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            cancelled,
        }
    }
}
