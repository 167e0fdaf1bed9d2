//! Chunk sinks: where assembled chunks are delivered

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::model::{Chunk, Record};

/// Consumer of export chunks
///
/// Chunks arrive in order, one at a time. An error aborts the export; chunks
/// accepted before it stay delivered.
#[async_trait]
pub trait ChunkSink: Send {
    async fn accept(&mut self, chunk: Chunk) -> Result<()>;
}

/// Keeps every chunk in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    chunks: Vec<Chunk>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    /// All records in delivery order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.chunks.iter().flat_map(|c| c.records().iter())
    }

    pub fn record_count(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}

#[async_trait]
impl ChunkSink for CollectingSink {
    async fn accept(&mut self, chunk: Chunk) -> Result<()> {
        self.chunks.push(chunk);
        Ok(())
    }
}

/// Forwards chunks into a bounded channel
///
/// A full channel suspends delivery, which in turn suspends the export.
pub struct ChannelSink {
    sender: mpsc::Sender<Chunk>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, ChunkReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, ChunkReceiver { receiver })
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn accept(&mut self, chunk: Chunk) -> Result<()> {
        let len = chunk.len();
        self.sender
            .send(chunk)
            .await
            .map_err(|_| ExportError::Sink("chunk receiver has been dropped".to_string()))?;
        debug!("Forwarded chunk of {} records", len);
        Ok(())
    }
}

/// Receiving end of a [`ChannelSink`]
pub struct ChunkReceiver {
    receiver: mpsc::Receiver<Chunk>,
}

impl ChunkReceiver {
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.receiver.recv().await
    }
}

impl Stream for ChunkReceiver {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use futures::StreamExt;
    use serde_json::json;

    fn chunk(messages: &[&str], first: bool) -> Chunk {
        let records = messages
            .iter()
            .map(|m| {
                let mut record = Record::with_capacity(1);
                record.push("message", FieldValue::Present(json!(m)));
                record
            })
            .collect();
        Chunk::new(records, first)
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let mut sink = CollectingSink::new();
        sink.accept(chunk(&["Ha", "He"], true)).await.unwrap();
        sink.accept(chunk(&["Ho"], false)).await.unwrap();

        assert_eq!(sink.chunks().len(), 2);
        assert_eq!(sink.record_count(), 3);
        assert_eq!(sink.records().count(), 3);
    }

    #[tokio::test]
    async fn test_channel_sink_streams_chunks() {
        let (mut sink, receiver) = ChannelSink::channel(4);
        sink.accept(chunk(&["Ha"], true)).await.unwrap();
        sink.accept(chunk(&["He"], false)).await.unwrap();
        drop(sink);

        let received: Vec<Chunk> = receiver.collect().await;
        assert_eq!(received.len(), 2);
        assert!(received[0].is_first_chunk());
    }

    #[tokio::test]
    async fn test_channel_sink_fails_without_receiver() {
        let (mut sink, receiver) = ChannelSink::channel(1);
        drop(receiver);

        let err = sink.accept(chunk(&["Ha"], true)).await.unwrap_err();
        assert!(matches!(err, ExportError::Sink(_)));
    }
}
