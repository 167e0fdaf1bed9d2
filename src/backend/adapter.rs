//! Search adapter: one backend call with timeout, backpressure and error translation

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ExportError, FailureCause, Result, classify_envelope, classify_failure};

use super::query::QueryTranslator;
use super::{SearchBackend, SearchRequest, SearchResponse};

/// Executes single backend calls on behalf of page fetchers
///
/// One adapter is meant to be shared (behind an `Arc`) by every export that
/// talks to the same backend; its semaphore bounds the number of requests in
/// flight across all of them.
pub struct SearchAdapter {
    backend: Arc<dyn SearchBackend>,
    translator: Arc<dyn QueryTranslator>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl SearchAdapter {
    /// Create a new search adapter
    ///
    /// # Arguments
    /// * `backend` - Backend to call
    /// * `translator` - Builds requests and parses error bodies
    /// * `timeout` - Deadline for each individual call
    /// * `max_concurrent_requests` - Upper bound of calls in flight
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        translator: Arc<dyn QueryTranslator>,
        timeout: Duration,
        max_concurrent_requests: usize,
    ) -> Self {
        Self {
            backend,
            translator,
            permits: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            timeout,
        }
    }

    /// Create an adapter with timeout and concurrency taken from configuration
    pub fn from_config(
        backend: Arc<dyn SearchBackend>,
        translator: Arc<dyn QueryTranslator>,
        config: &Config,
    ) -> Self {
        Self::new(
            backend,
            translator,
            config.request_timeout(),
            config.backend.max_concurrent_requests,
        )
    }

    pub fn translator(&self) -> &dyn QueryTranslator {
        self.translator.as_ref()
    }

    /// Number of further calls that could start right now
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Execute one search request
    pub async fn execute(&self, request: &SearchRequest) -> Result<SearchResponse> {
        debug!(
            "Executing search on {} index(es), scroll: {:?}",
            request.indices.len(),
            request.scroll
        );
        let response = self.call("search", self.backend.search(request)).await?;
        self.check_envelope(response)
    }

    /// Fetch the next page of a scroll context
    pub async fn continue_scroll(
        &self,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> Result<SearchResponse> {
        let response = self
            .call("scroll", self.backend.scroll(scroll_id, keep_alive))
            .await?;
        self.check_envelope(response)
    }

    /// Release a scroll context
    pub async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        self.call("clear scroll", self.backend.clear_scroll(scroll_id))
            .await
    }

    async fn call<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, FailureCause>>,
    {
        let _permit = self.permits.acquire().await.map_err(|_| {
            ExportError::Unavailable("backend request pool has been shut down".to_string())
        })?;

        let started = Instant::now();
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => {
                debug!("Backend {} completed in {} ms", operation, started.elapsed().as_millis());
                Ok(value)
            }
            Ok(Err(failure)) => {
                let error = classify_failure(&failure, |body| self.translator.parse_error(body));
                warn!(
                    "Backend {} failed ({}, {} cause layer(s)): {}",
                    operation,
                    error.kind(),
                    failure.depth(),
                    error
                );
                Err(error)
            }
            Err(_) => {
                warn!(
                    "Backend {} timed out after {} ms",
                    operation,
                    self.timeout.as_millis()
                );
                Err(ExportError::Unavailable(format!(
                    "{} request timed out after {} ms",
                    operation,
                    self.timeout.as_millis()
                )))
            }
        }
    }

    fn check_envelope(&self, response: SearchResponse) -> Result<SearchResponse> {
        match &response.error {
            Some(body) => {
                let error = classify_envelope(body, |b| self.translator.parse_error(b));
                warn!("Backend returned an error envelope ({}): {}", error.kind(), error);
                Err(error)
            }
            None => Ok(response),
        }
    }
}
