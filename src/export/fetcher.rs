//! Page fetching strategies
//!
//! A page fetcher turns a [`QuerySpec`] into a sequence of pages, resuming
//! each request strictly after the last hit of the previous one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::backend::{QuerySpec, SearchAdapter, SearchResponse};
use crate::config::{Config, PaginationStrategy};
use crate::error::{ExportError, Result};
use crate::model::{SearchHit, SortCursor};

/// One page of results
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Hits in sort order
    pub hits: Vec<SearchHit>,
    /// Position of the last hit, if the page is not empty
    pub next_cursor: Option<SortCursor>,
    /// Whether another request may return more hits
    pub has_more: bool,
}

impl Page {
    fn from_hits(hits: Vec<SearchHit>, page_size: usize) -> Result<Self> {
        let next_cursor = hits.last().map(SearchHit::cursor).transpose()?;
        let has_more = !hits.is_empty() && hits.len() == page_size;
        Ok(Self {
            hits,
            next_cursor,
            has_more,
        })
    }
}

/// Trait for fetching an export's results page by page
#[async_trait]
pub trait PageFetcher: Send {
    /// Fetch the page following `cursor`, or the first page when it is `None`
    async fn fetch(&mut self, spec: &QuerySpec, cursor: Option<&SortCursor>) -> Result<Page>;

    /// Release any server-side state held by this fetcher
    async fn close(&mut self) -> Result<()>;

    /// Whether the next `fetch` may be dropped mid-flight without leaking server-side state
    fn interruptible(&self) -> bool {
        true
    }
}

/// Cursor paging with `search_after`
pub struct SearchAfterFetcher {
    adapter: Arc<SearchAdapter>,
    last_cursor: Option<SortCursor>,
    pages: u64,
}

impl SearchAfterFetcher {
    pub fn new(adapter: Arc<SearchAdapter>) -> Self {
        Self {
            adapter,
            last_cursor: None,
            pages: 0,
        }
    }
}

#[async_trait]
impl PageFetcher for SearchAfterFetcher {
    async fn fetch(&mut self, spec: &QuerySpec, cursor: Option<&SortCursor>) -> Result<Page> {
        if let (Some(previous), Some(requested)) = (&self.last_cursor, cursor) {
            if requested <= previous {
                return Err(ExportError::Backend(format!(
                    "cursor {requested} does not advance past {previous}"
                )));
            }
        }

        let request = self.adapter.translator().build_search(spec, cursor, None);
        let response = self.adapter.execute(&request).await?;
        let page = Page::from_hits(response.hits, spec.page_size)?;

        if let (Some(requested), Some(next)) = (cursor, &page.next_cursor) {
            if next <= requested {
                return Err(ExportError::Backend(format!(
                    "backend returned a page ending at {next}, which is not after cursor {requested}"
                )));
            }
        }

        self.pages += 1;
        if let Some(requested) = cursor {
            self.last_cursor = Some(requested.clone());
        }
        debug!(
            "Fetched page #{} with {} hits (has more: {})",
            self.pages,
            page.hits.len(),
            page.has_more
        );
        Ok(page)
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Search-after fetcher closed after {} pages", self.pages);
        Ok(())
    }
}

/// Handle-based paging through a scroll context
///
/// The cursor argument is only used to tell the first call from later ones;
/// the backend tracks the position itself.
pub struct ScrollFetcher {
    adapter: Arc<SearchAdapter>,
    keep_alive: Duration,
    scroll_id: Option<String>,
    pages: u64,
}

impl ScrollFetcher {
    pub fn new(adapter: Arc<SearchAdapter>, keep_alive: Duration) -> Self {
        Self {
            adapter,
            keep_alive,
            scroll_id: None,
            pages: 0,
        }
    }

    fn track(&mut self, response: &SearchResponse) {
        if let Some(id) = &response.scroll_id {
            self.scroll_id = Some(id.clone());
        }
    }
}

#[async_trait]
impl PageFetcher for ScrollFetcher {
    async fn fetch(&mut self, spec: &QuerySpec, cursor: Option<&SortCursor>) -> Result<Page> {
        let response = match (self.scroll_id.clone(), cursor) {
            (Some(id), Some(_)) => self.adapter.continue_scroll(&id, self.keep_alive).await?,
            (None, Some(cursor)) => {
                return Err(ExportError::Backend(format!(
                    "no open scroll context to continue from {cursor}"
                )));
            }
            (_, None) => {
                if self.scroll_id.is_some() {
                    self.close().await?;
                }
                let request = self
                    .adapter
                    .translator()
                    .build_search(spec, None, Some(self.keep_alive));
                self.adapter.execute(&request).await?
            }
        };

        self.track(&response);
        self.pages += 1;
        let page = Page::from_hits(response.hits, spec.page_size)?;
        debug!(
            "Fetched scroll page #{} with {} hits (has more: {})",
            self.pages,
            page.hits.len(),
            page.has_more
        );
        Ok(page)
    }

    /// The request that opens a context must finish, or its id is lost
    fn interruptible(&self) -> bool {
        self.scroll_id.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(id) = self.scroll_id.take() {
            self.adapter.clear_scroll(&id).await?;
            info!("Cleared scroll context after {} pages", self.pages);
        }
        Ok(())
    }
}

impl Drop for ScrollFetcher {
    fn drop(&mut self) {
        if self.scroll_id.is_some() {
            warn!("ScrollFetcher dropped with an open scroll context");
        }
    }
}

/// Chooses which fetcher an export uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStrategy {
    #[default]
    SearchAfter,
    Scroll { keep_alive: Duration },
}

impl FetchStrategy {
    pub fn from_config(config: &Config) -> Self {
        match config.export.strategy {
            PaginationStrategy::SearchAfter => Self::SearchAfter,
            PaginationStrategy::Scroll => Self::Scroll {
                keep_alive: config.scroll_keep_alive(),
            },
        }
    }

    /// Build a fresh fetcher for one export
    pub fn create(&self, adapter: Arc<SearchAdapter>) -> Box<dyn PageFetcher> {
        match *self {
            Self::SearchAfter => Box::new(SearchAfterFetcher::new(adapter)),
            Self::Scroll { keep_alive } => Box::new(ScrollFetcher::new(adapter, keep_alive)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{JsonQueryTranslator, MemoryBackend, SortSpec};
    use crate::model::{ExportCommand, TimeRange};
    use serde_json::json;

    fn adapter() -> (Arc<MemoryBackend>, Arc<SearchAdapter>) {
        let mut backend = MemoryBackend::new();
        for (i, ts) in ["01:00", "02:00", "03:00", "04:00", "05:00"].iter().enumerate() {
            backend
                .insert(
                    "graylog_0",
                    json!({
                        "timestamp": format!("2015-01-01 {ts}:00.000"),
                        "gl2_message_id": format!("m{i}"),
                        "message": format!("msg {i}"),
                        "streams": ["stream-01"]
                    }),
                )
                .unwrap();
        }
        let backend = Arc::new(backend);
        let adapter = Arc::new(SearchAdapter::new(
            backend.clone(),
            Arc::new(JsonQueryTranslator::default()),
            Duration::from_secs(5),
            4,
        ));
        (backend, adapter)
    }

    fn spec(page_size: usize) -> QuerySpec {
        let range = TimeRange::parse("2015-01-01T00:00:00Z", "2015-01-02T00:00:00Z").unwrap();
        let command = ExportCommand::builder(range)
            .stream("stream-01")
            .chunk_size(page_size)
            .build()
            .unwrap();
        QuerySpec::from_command(&command, vec!["graylog_0".into()], SortSpec::default())
    }

    async fn drain(fetcher: &mut dyn PageFetcher, spec: &QuerySpec) -> Vec<usize> {
        let mut sizes = Vec::new();
        let mut cursor = None;
        loop {
            let page = fetcher.fetch(spec, cursor.as_ref()).await.unwrap();
            sizes.push(page.hits.len());
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }
        fetcher.close().await.unwrap();
        sizes
    }

    #[tokio::test]
    async fn test_search_after_pages() {
        let (_, adapter) = adapter();
        let mut fetcher = SearchAfterFetcher::new(adapter);
        assert_eq!(drain(&mut fetcher, &spec(2)).await, [2, 2, 1]);
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_with_empty_page() {
        let (_, adapter) = adapter();
        let mut fetcher = SearchAfterFetcher::new(adapter);
        assert_eq!(drain(&mut fetcher, &spec(5)).await, [5, 0]);
    }

    #[tokio::test]
    async fn test_search_after_rejects_stale_cursor() {
        let (_, adapter) = adapter();
        let mut fetcher = SearchAfterFetcher::new(adapter);
        let spec = spec(2);

        let first = fetcher.fetch(&spec, None).await.unwrap();
        let cursor = first.next_cursor.unwrap();
        tokio_test::assert_ok!(fetcher.fetch(&spec, Some(&cursor)).await);

        let err = fetcher.fetch(&spec, Some(&cursor)).await.unwrap_err();
        assert!(matches!(err, ExportError::Backend(ref msg) if msg.contains("does not advance")));
    }

    #[tokio::test]
    async fn test_scroll_pages_and_clears_context() {
        let (backend, adapter) = adapter();
        let mut fetcher = ScrollFetcher::new(adapter, Duration::from_secs(30));
        assert_eq!(drain(&mut fetcher, &spec(2)).await, [2, 2, 1]);
        assert_eq!(backend.open_scrolls(), 0);
    }

    #[tokio::test]
    async fn test_scroll_open_is_not_interruptible() {
        let (backend, adapter) = adapter();
        let mut fetcher = ScrollFetcher::new(adapter.clone(), Duration::from_secs(30));
        assert!(!fetcher.interruptible());

        fetcher.fetch(&spec(2), None).await.unwrap();
        assert!(fetcher.interruptible());
        fetcher.close().await.unwrap();
        assert_eq!(backend.open_scrolls(), 0);

        assert!(SearchAfterFetcher::new(adapter).interruptible());
    }

    #[test]
    fn test_strategy_from_config() {
        let mut config = Config::default();
        assert_eq!(FetchStrategy::from_config(&config), FetchStrategy::SearchAfter);

        config.export.strategy = PaginationStrategy::Scroll;
        assert!(matches!(
            FetchStrategy::from_config(&config),
            FetchStrategy::Scroll { .. }
        ));
    }
}
