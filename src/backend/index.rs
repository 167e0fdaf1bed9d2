//! Index resolution for streams and time ranges

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::TimeRange;

/// Resolves which physical indices participate in an export
#[async_trait]
pub trait IndexResolver: Send + Sync {
    /// Indices holding records of `streams` within `time_range`
    ///
    /// An empty set is a valid answer and yields an empty export.
    async fn resolve(
        &self,
        streams: &BTreeSet<String>,
        time_range: &TimeRange,
    ) -> Result<BTreeSet<String>>;
}

/// Resolver backed by a fixed stream → indices table
///
/// The time range is not consulted; every index mapped to a requested stream
/// participates.
#[derive(Debug, Clone, Default)]
pub struct StaticIndexResolver {
    indices_by_stream: BTreeMap<String, BTreeSet<String>>,
}

impl StaticIndexResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a stream to the given indices
    pub fn with_stream<I, S>(mut self, stream: impl Into<String>, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices_by_stream
            .entry(stream.into())
            .or_default()
            .extend(indices.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl IndexResolver for StaticIndexResolver {
    async fn resolve(
        &self,
        streams: &BTreeSet<String>,
        _time_range: &TimeRange,
    ) -> Result<BTreeSet<String>> {
        Ok(streams
            .iter()
            .filter_map(|stream| self.indices_by_stream.get(stream))
            .flatten()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> TimeRange {
        TimeRange::parse("2015-01-01T00:00:00Z", "2015-01-02T00:00:00Z").unwrap()
    }

    #[tokio::test]
    async fn test_static_resolver_unions_streams() {
        let resolver = StaticIndexResolver::new()
            .with_stream("stream-01", ["graylog_0"])
            .with_stream("stream-02", ["graylog_0", "graylog_1"]);

        let streams: BTreeSet<String> = ["stream-01", "stream-02"].iter().map(|s| s.to_string()).collect();
        let indices = resolver.resolve(&streams, &range()).await.unwrap();

        assert_eq!(indices.into_iter().collect::<Vec<_>>(), ["graylog_0", "graylog_1"]);
    }

    #[tokio::test]
    async fn test_static_resolver_unknown_stream_is_empty() {
        let resolver = StaticIndexResolver::new().with_stream("stream-01", ["graylog_0"]);
        let streams: BTreeSet<String> = ["other".to_string()].into_iter().collect();

        let indices = resolver.resolve(&streams, &range()).await.unwrap();
        assert!(indices.is_empty());
    }
}
