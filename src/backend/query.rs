//! Query translation
//!
//! Turns a [`QuerySpec`] plus an optional cursor into a backend-native request
//! body, and parses backend error bodies into [`ErrorInfo`].

use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::config::ExportConfig;
use crate::error::ErrorInfo;
use crate::model::{ExportCommand, Filter, SortCursor, TimeRange};

use super::SearchRequest;

/// Sort order of an export: ascending timestamp, then ascending tie-breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub timestamp_field: String,
    pub tie_breaker_field: String,
}

impl SortSpec {
    pub fn new(timestamp_field: impl Into<String>, tie_breaker_field: impl Into<String>) -> Self {
        Self {
            timestamp_field: timestamp_field.into(),
            tie_breaker_field: tie_breaker_field.into(),
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::new("timestamp", "gl2_message_id")
    }
}

impl From<&ExportConfig> for SortSpec {
    fn from(config: &ExportConfig) -> Self {
        Self::new(&config.timestamp_field, &config.tie_breaker_field)
    }
}

/// Everything needed to request pages for one export
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub indices: Vec<String>,
    pub streams: BTreeSet<String>,
    pub time_range: TimeRange,
    pub query_string: Option<String>,
    pub filters: Vec<Filter>,
    pub fields: Vec<String>,
    pub page_size: usize,
    pub sort: SortSpec,
}

impl QuerySpec {
    /// Derive the query spec of a command over resolved indices
    pub fn from_command(command: &ExportCommand, indices: Vec<String>, sort: SortSpec) -> Self {
        Self {
            indices,
            streams: command.streams().clone(),
            time_range: *command.time_range(),
            query_string: command.query_string().map(str::to_string),
            filters: command.additional_filters().to_vec(),
            fields: command.fields_in_order().to_vec(),
            page_size: command.chunk_size(),
            sort,
        }
    }
}

/// Builds backend request bodies and parses backend error payloads
pub trait QueryTranslator: Send + Sync {
    /// Build a page request
    ///
    /// # Arguments
    /// * `spec` - Query to run
    /// * `cursor` - Resume strictly after this position, if any
    /// * `scroll` - Open a scroll context with this keep-alive instead of paging by cursor
    fn build_search(
        &self,
        spec: &QuerySpec,
        cursor: Option<&SortCursor>,
        scroll: Option<Duration>,
    ) -> SearchRequest;

    /// Parse a backend error body into (type, reason, root cause)
    fn parse_error(&self, body: &Value) -> Option<ErrorInfo> {
        ErrorInfo::from_body(body)
    }
}

/// Translator for Elasticsearch-style JSON request bodies
#[derive(Debug, Clone)]
pub struct JsonQueryTranslator {
    allow_leading_wildcard: bool,
    streams_field: String,
}

impl JsonQueryTranslator {
    pub fn new(allow_leading_wildcard: bool, streams_field: impl Into<String>) -> Self {
        Self {
            allow_leading_wildcard,
            streams_field: streams_field.into(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.allow_leading_wildcard, &config.streams_field)
    }

    fn query_clause(&self, spec: &QuerySpec) -> Value {
        match &spec.query_string {
            Some(query) => json!({
                "query_string": {
                    "query": query,
                    "allow_leading_wildcard": self.allow_leading_wildcard
                }
            }),
            None => json!({ "match_all": {} }),
        }
    }

    fn filter_clauses(&self, spec: &QuerySpec) -> Vec<Value> {
        let mut filters = Vec::with_capacity(spec.filters.len() + 2);

        filters.push(json!({
            "range": {
                spec.sort.timestamp_field.as_str(): {
                    "gte": spec.time_range.from.timestamp_millis(),
                    "lt": spec.time_range.to.timestamp_millis(),
                    "format": "epoch_millis"
                }
            }
        }));

        if !spec.streams.is_empty() {
            filters.push(json!({
                "terms": { self.streams_field.as_str(): spec.streams.iter().collect::<Vec<_>>() }
            }));
        }

        filters.extend(spec.filters.iter().map(filter_clause));
        filters
    }
}

impl Default for JsonQueryTranslator {
    fn default() -> Self {
        Self::new(false, "streams")
    }
}

impl QueryTranslator for JsonQueryTranslator {
    fn build_search(
        &self,
        spec: &QuerySpec,
        cursor: Option<&SortCursor>,
        scroll: Option<Duration>,
    ) -> SearchRequest {
        let mut body = Map::new();
        body.insert(
            "query".to_string(),
            json!({
                "bool": {
                    "must": [self.query_clause(spec)],
                    "filter": self.filter_clauses(spec)
                }
            }),
        );
        body.insert(
            "sort".to_string(),
            json!([
                { spec.sort.timestamp_field.as_str(): { "order": "asc" } },
                { spec.sort.tie_breaker_field.as_str(): { "order": "asc" } }
            ]),
        );
        body.insert("size".to_string(), json!(spec.page_size));
        body.insert("_source".to_string(), json!(spec.fields));

        // A scroll context tracks its own position; search_after only applies to cursor paging.
        if let (Some(cursor), None) = (cursor, scroll) {
            body.insert(
                "search_after".to_string(),
                Value::Array(cursor.to_sort_values()),
            );
        }

        SearchRequest {
            indices: spec.indices.clone(),
            body: Value::Object(body),
            scroll,
        }
    }
}

fn filter_clause(filter: &Filter) -> Value {
    match filter {
        Filter::Term { field, value } => json!({ "term": { field.as_str(): value } }),
        Filter::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
        Filter::Exists { field } => json!({ "exists": { "field": field } }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> QuerySpec {
        let range = TimeRange::parse("2015-01-01T00:00:00.000Z", "2015-01-01T02:00:00.000Z").unwrap();
        let command = ExportCommand::builder(range)
            .streams(["stream-01", "stream-02"])
            .query_string("Ha Ho")
            .fields_in_order(["timestamp", "message"])
            .chunk_size(2)
            .filter(Filter::Term {
                field: "source".to_string(),
                value: json!("source-1"),
            })
            .build()
            .unwrap();
        QuerySpec::from_command(&command, vec!["graylog_0".into()], SortSpec::default())
    }

    #[test]
    fn test_first_page_body() {
        let request = JsonQueryTranslator::default().build_search(&spec(), None, None);
        let body = &request.body;

        assert_eq!(request.indices, ["graylog_0"]);
        assert!(request.scroll.is_none());
        assert_eq!(body["size"], json!(2));
        assert_eq!(body["_source"], json!(["timestamp", "message"]));
        assert!(body.get("search_after").is_none());
        assert_eq!(
            body["sort"],
            json!([{"timestamp": {"order": "asc"}}, {"gl2_message_id": {"order": "asc"}}])
        );

        let must = &body["query"]["bool"]["must"][0]["query_string"];
        assert_eq!(must["query"], json!("Ha Ho"));
        assert_eq!(must["allow_leading_wildcard"], json!(false));

        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0]["range"]["timestamp"]["gte"], json!(1420070400000i64));
        assert_eq!(filters[0]["range"]["timestamp"]["lt"], json!(1420077600000i64));
        assert_eq!(filters[1]["terms"]["streams"], json!(["stream-01", "stream-02"]));
        assert_eq!(filters[2]["term"]["source"], json!("source-1"));
    }

    #[test]
    fn test_next_page_uses_cursor_not_offset() {
        let cursor = SortCursor::new(1420074000000, "msg-1");
        let request = JsonQueryTranslator::default().build_search(&spec(), Some(&cursor), None);

        assert_eq!(request.body["search_after"], json!([1420074000000i64, "msg-1"]));
        assert!(request.body.get("from").is_none());
    }

    #[test]
    fn test_scroll_request_has_no_search_after() {
        let cursor = SortCursor::new(1, "a");
        let request = JsonQueryTranslator::default().build_search(
            &spec(),
            Some(&cursor),
            Some(Duration::from_secs(60)),
        );
        assert_eq!(request.scroll, Some(Duration::from_secs(60)));
        assert!(request.body.get("search_after").is_none());
    }

    #[test]
    fn test_match_all_without_query() {
        let mut spec = spec();
        spec.query_string = None;
        let request = JsonQueryTranslator::new(true, "streams").build_search(&spec, None, None);
        assert_eq!(request.body["query"]["bool"]["must"][0], json!({"match_all": {}}));
    }

    #[test]
    fn test_parse_error_delegates_to_error_info() {
        let body = json!({"error": {"type": "parse_exception", "reason": "bad"}, "status": 400});
        let info = JsonQueryTranslator::default().parse_error(&body).unwrap();
        assert_eq!(info.error_type, "parse_exception");
    }
}
