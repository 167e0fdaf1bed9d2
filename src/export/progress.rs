//! Progress tracking for export operations
//!
//! This module provides progress bar and statistics tracking for long-running
//! exports, giving users real-time feedback while chunks are delivered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Result;
use crate::model::Chunk;

use super::sink::ChunkSink;

/// Progress tracker for export operations
///
/// Tracks record delivery and displays a progress bar with speed.
pub struct ProgressTracker {
    /// Number of records processed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Total number of records if known (e.g. the export limit)
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(total: Option<u64>, enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| match total {
            Some(n) => {
                let bar = ProgressBar::new(n);
                if let Ok(style) =
                    ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                {
                    bar.set_style(style.progress_chars("#>-"));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) =
                    ProgressStyle::default_spinner().template("{spinner:.green} {pos} records {msg}")
                {
                    bar.set_style(style);
                }
                bar
            }
        });

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Update progress with new count
    ///
    /// # Arguments
    /// * `count` - Total number of records processed so far
    pub fn update(&self, count: u64) {
        self.processed.store(count, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(count);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = count as f64 / elapsed;
                bar.set_message(format!("({:.0} records/sec)", speed));
            }
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Sink wrapper that reports delivered records to a [`ProgressTracker`]
pub struct ProgressSink<S> {
    inner: S,
    tracker: ProgressTracker,
}

impl<S: ChunkSink> ProgressSink<S> {
    pub fn new(inner: S, tracker: ProgressTracker) -> Self {
        Self { inner, tracker }
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Clear the progress bar and hand back the wrapped sink
    pub fn finish(self) -> S {
        self.tracker.finish();
        self.inner
    }
}

#[async_trait]
impl<S: ChunkSink> ChunkSink for ProgressSink<S> {
    async fn accept(&mut self, chunk: Chunk) -> Result<()> {
        let len = chunk.len() as u64;
        self.inner.accept(chunk).await?;
        self.tracker.update(self.tracker.processed() + len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::sink::CollectingSink;
    use crate::model::{FieldValue, Record};
    use serde_json::json;

    #[test]
    fn test_progress_tracker_with_total() {
        let tracker = ProgressTracker::new(Some(1000), false);
        tracker.update(500);
        assert_eq!(tracker.processed(), 500);
    }

    #[test]
    fn test_progress_tracker_without_total() {
        let tracker = ProgressTracker::new(None, false);
        tracker.update(500);
        tracker.finish();
        assert_eq!(tracker.processed(), 500);
    }

    #[tokio::test]
    async fn test_progress_sink_counts_records() {
        let mut sink = ProgressSink::new(CollectingSink::new(), ProgressTracker::new(None, false));
        for first in [true, false] {
            let mut record = Record::with_capacity(1);
            record.push("message", FieldValue::Present(json!("Ha")));
            sink.accept(Chunk::new(vec![record.clone(), record], first)).await.unwrap();
        }

        assert_eq!(sink.tracker().processed(), 4);
        assert_eq!(sink.finish().chunks().len(), 2);
    }
}
