//! Search backend access
//!
//! This module provides the seams between the export pipeline and the search
//! backend:
//! - `SearchBackend`: one raw backend round trip (search, scroll, clear scroll)
//! - `SearchAdapter`: executes a backend call with timeout and backpressure and
//!   classifies failures into the export error taxonomy
//! - `QueryTranslator`: builds backend-native request bodies and parses error bodies
//! - `IndexResolver`: resolves streams and a time range to concrete indices
//! - `MemoryBackend`: an in-process backend over JSON documents

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FailureCause;
use crate::model::SearchHit;

pub mod adapter;
pub mod index;
pub mod memory;
pub mod query;

pub use adapter::SearchAdapter;
pub use index::{IndexResolver, StaticIndexResolver};
pub use memory::MemoryBackend;
pub use query::{JsonQueryTranslator, QuerySpec, QueryTranslator, SortSpec};

/// One request against the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Indices to search
    pub indices: Vec<String>,
    /// Backend-native request body
    pub body: Value,
    /// Open a scroll context with this keep-alive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<Duration>,
}

/// The backend's answer to one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matching records, in sort order
    pub hits: Vec<SearchHit>,
    /// Handle of the scroll context, if one was opened or continued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_id: Option<String>,
    /// Error envelope reported alongside the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Server-side processing time
    #[serde(default)]
    pub took_ms: u64,
}

/// A search backend reachable through one request/response cycle per page
///
/// Implementations report failures as a [`FailureCause`] chain and leave
/// classification to the [`SearchAdapter`].
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a search request
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, FailureCause>;

    /// Fetch the next page of an open scroll context
    async fn scroll(
        &self,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> Result<SearchResponse, FailureCause> {
        let _ = keep_alive;
        Err(FailureCause::other(format!(
            "scrolling is not supported by this backend (scroll id {scroll_id})"
        )))
    }

    /// Release a scroll context
    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), FailureCause> {
        let _ = scroll_id;
        Ok(())
    }
}
