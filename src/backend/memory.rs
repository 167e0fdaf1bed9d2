//! In-process search backend over JSON documents
//!
//! Serves exports from documents grouped by index, either loaded from a JSON
//! fixture (`{"index_name": [doc, ...], ...}`) or inserted programmatically.
//! It understands the request bodies produced by
//! [`JsonQueryTranslator`](super::JsonQueryTranslator): `bool` queries with
//! `query_string`/`match_all`/`range`/`term`/`terms`/`exists` clauses, two-key
//! sorting, `size`, `_source` projection, `search_after` and scroll contexts.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ExportError, FailureCause, Result};
use crate::model::{SearchHit, TimeRange};
use crate::utils::time::parse_timestamp;

use super::index::IndexResolver;
use super::{SearchBackend, SearchRequest, SearchResponse};

/// Page size the backend applies when a request does not set one
const DEFAULT_SIZE: usize = 10;

#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    source: Map<String, Value>,
}

#[derive(Debug)]
struct ScrollContext {
    remaining: VecDeque<SearchHit>,
    size: usize,
    expires_at: Instant,
}

/// In-memory search backend
#[derive(Debug)]
pub struct MemoryBackend {
    indices: BTreeMap<String, Vec<StoredDoc>>,
    timestamp_field: String,
    streams_field: String,
    scrolls: Mutex<HashMap<String, ScrollContext>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            indices: BTreeMap::new(),
            timestamp_field: "timestamp".to_string(),
            streams_field: "streams".to_string(),
            scrolls: Mutex::new(HashMap::new()),
        }
    }

    /// Use different timestamp and streams field names for index resolution
    pub fn with_fields(
        mut self,
        timestamp_field: impl Into<String>,
        streams_field: impl Into<String>,
    ) -> Self {
        self.timestamp_field = timestamp_field.into();
        self.streams_field = streams_field.into();
        self
    }

    /// Load documents from a JSON fixture file
    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::Backend(format!("Failed to read fixture {}: {}", path.display(), e))
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            ExportError::Backend(format!("Invalid fixture {}: {}", path.display(), e))
        })?;
        Self::from_value(&value)
    }

    /// Build from a JSON object mapping index names to arrays of documents
    pub fn from_value(value: &Value) -> Result<Self> {
        let indices = value.as_object().ok_or_else(|| {
            ExportError::Backend("fixture must be an object of index name to documents".into())
        })?;

        let mut backend = Self::new();
        for (index, docs) in indices {
            let docs = docs.as_array().ok_or_else(|| {
                ExportError::Backend(format!("fixture index '{index}' must be an array"))
            })?;
            for doc in docs {
                backend.insert(index, doc.clone())?;
            }
        }
        Ok(backend)
    }

    /// Insert a document; a string `_id` is used as the document id
    pub fn insert(&mut self, index: &str, document: Value) -> Result<()> {
        let Value::Object(mut source) = document else {
            return Err(ExportError::Backend(format!(
                "documents in index '{index}' must be JSON objects"
            )));
        };

        let docs = self.indices.entry(index.to_string()).or_default();
        let id = match source.remove("_id") {
            Some(Value::String(id)) => id,
            _ => format!("{}-{}", index, docs.len()),
        };
        docs.push(StoredDoc { id, source });
        Ok(())
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    /// Total number of stored documents
    pub fn len(&self) -> usize {
        self.indices.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scroll contexts currently open
    pub fn open_scrolls(&self) -> usize {
        self.scrolls.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Run the request against every index and return all matches in sort order
    fn matching_hits(&self, request: &SearchRequest) -> std::result::Result<Vec<SearchHit>, FailureCause> {
        let body = &request.body;
        let query = Query::parse(body.get("query"))?;
        let sort = parse_sort(body.get("sort"))?;
        let projection = parse_projection(body.get("_source"));

        let mut hits = Vec::new();
        for index in &request.indices {
            let docs = self.indices.get(index).ok_or_else(|| index_not_found(index))?;
            for doc in docs.iter().filter(|doc| query.matches(&doc.source)) {
                let sort_values = sort
                    .iter()
                    .enumerate()
                    .map(|(position, key)| sort_value(doc, key, position > 0))
                    .collect::<Vec<_>>();
                let source = match &projection {
                    Some(fields) => fields
                        .iter()
                        .filter_map(|f| doc.source.get(f).map(|v| (f.clone(), v.clone())))
                        .collect(),
                    None => doc.source.clone(),
                };
                hits.push(SearchHit::new(index.clone(), doc.id.clone(), source).with_sort(sort_values));
            }
        }

        hits.sort_by(|a, b| compare_tuples(&a.sort, &b.sort));
        Ok(hits)
    }

    fn lock_scrolls(
        &self,
    ) -> std::result::Result<std::sync::MutexGuard<'_, HashMap<String, ScrollContext>>, FailureCause>
    {
        self.scrolls
            .lock()
            .map_err(|_| FailureCause::other("scroll registry is poisoned"))
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn search(&self, request: &SearchRequest) -> std::result::Result<SearchResponse, FailureCause> {
        let started = Instant::now();
        let size = request
            .body
            .get("size")
            .and_then(Value::as_u64)
            .map(|s| s as usize)
            .unwrap_or(DEFAULT_SIZE);

        let mut hits = self.matching_hits(request)?;

        if let Some(keep_alive) = request.scroll {
            let mut remaining: VecDeque<SearchHit> = hits.into();
            let first_page: Vec<SearchHit> = remaining.drain(..size.min(remaining.len())).collect();
            let scroll_id = Uuid::new_v4().to_string();
            self.lock_scrolls()?.insert(
                scroll_id.clone(),
                ScrollContext {
                    remaining,
                    size,
                    expires_at: Instant::now() + keep_alive,
                },
            );
            debug!("Opened scroll context {}", scroll_id);
            return Ok(SearchResponse {
                hits: first_page,
                scroll_id: Some(scroll_id),
                error: None,
                took_ms: started.elapsed().as_millis() as u64,
            });
        }

        if let Some(after) = request.body.get("search_after") {
            let after = after.as_array().ok_or_else(|| {
                bad_request("parsing_exception", "[search_after] must be an array")
            })?;
            hits.retain(|hit| compare_tuples(&hit.sort, after) == Ordering::Greater);
        }
        hits.truncate(size);

        Ok(SearchResponse {
            hits,
            scroll_id: None,
            error: None,
            took_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn scroll(
        &self,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> std::result::Result<SearchResponse, FailureCause> {
        let mut scrolls = self.lock_scrolls()?;
        let now = Instant::now();
        scrolls.retain(|_, ctx| ctx.expires_at > now);

        let context = scrolls.get_mut(scroll_id).ok_or_else(|| {
            FailureCause::response(
                404,
                Some(json!({
                    "error": {
                        "type": "search_context_missing_exception",
                        "reason": format!("No search context found for id [{scroll_id}]")
                    },
                    "status": 404
                })),
                "404 Not Found",
            )
            .wrapped_in("Unable to continue scroll")
        })?;

        context.expires_at = now + keep_alive;
        let take = context.size.min(context.remaining.len());
        let hits = context.remaining.drain(..take).collect();

        Ok(SearchResponse {
            hits,
            scroll_id: Some(scroll_id.to_string()),
            error: None,
            took_ms: 0,
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> std::result::Result<(), FailureCause> {
        if self.lock_scrolls()?.remove(scroll_id).is_some() {
            debug!("Cleared scroll context {}", scroll_id);
        }
        Ok(())
    }
}

#[async_trait]
impl IndexResolver for MemoryBackend {
    async fn resolve(
        &self,
        streams: &BTreeSet<String>,
        time_range: &TimeRange,
    ) -> Result<BTreeSet<String>> {
        let in_scope = |doc: &StoredDoc| {
            let in_range = doc
                .source
                .get(&self.timestamp_field)
                .and_then(parse_timestamp)
                .is_some_and(|ts| time_range.contains(&ts));
            let in_stream = match doc.source.get(&self.streams_field) {
                Some(Value::Array(values)) => values
                    .iter()
                    .any(|v| v.as_str().is_some_and(|s| streams.contains(s))),
                Some(Value::String(s)) => streams.contains(s),
                _ => false,
            };
            in_range && in_stream
        };

        Ok(self
            .indices
            .iter()
            .filter(|(_, docs)| docs.iter().any(&in_scope))
            .map(|(name, _)| name.clone())
            .collect())
    }
}

/* ========================= Query evaluation ========================= */

#[derive(Debug)]
enum Clause {
    MatchAll,
    QueryString(Vec<QueryTerm>),
    Range {
        field: String,
        gte: Option<i64>,
        lt: Option<i64>,
    },
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Exists {
        field: String,
    },
}

#[derive(Debug)]
struct QueryTerm {
    field: Option<String>,
    text: String,
    prefix: bool,
    suffix: bool,
}

/// Conjunction of clauses; a query string clause is itself a disjunction of terms
#[derive(Debug)]
struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    fn parse(query: Option<&Value>) -> std::result::Result<Self, FailureCause> {
        let Some(query) = query else {
            return Ok(Self {
                clauses: vec![Clause::MatchAll],
            });
        };

        let mut clauses = Vec::new();
        match query.get("bool") {
            Some(bool_query) => {
                for key in ["must", "filter"] {
                    if let Some(items) = bool_query.get(key).and_then(Value::as_array) {
                        for item in items {
                            clauses.push(parse_clause(item)?);
                        }
                    }
                }
            }
            None => clauses.push(parse_clause(query)?),
        }
        Ok(Self { clauses })
    }

    fn matches(&self, source: &Map<String, Value>) -> bool {
        self.clauses.iter().all(|clause| clause_matches(clause, source))
    }
}

fn parse_clause(clause: &Value) -> std::result::Result<Clause, FailureCause> {
    let Some((kind, params)) = clause.as_object().and_then(|o| o.iter().next()) else {
        return Err(bad_request("parsing_exception", "query clause must be an object"));
    };

    match kind.as_str() {
        "match_all" => Ok(Clause::MatchAll),
        "query_string" => {
            let query = params.get("query").and_then(Value::as_str).unwrap_or("*");
            let allow_leading = params
                .get("allow_leading_wildcard")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            parse_query_string(query, allow_leading).map(Clause::QueryString)
        }
        "range" => {
            let (field, bounds) = single_entry(params, "range")?;
            Ok(Clause::Range {
                field,
                gte: bounds.get("gte").and_then(Value::as_i64),
                lt: bounds.get("lt").and_then(Value::as_i64),
            })
        }
        "term" => {
            let (field, value) = single_entry(params, "term")?;
            Ok(Clause::Term {
                field,
                value: value.clone(),
            })
        }
        "terms" => {
            let (field, values) = single_entry(params, "terms")?;
            Ok(Clause::Terms {
                field,
                values: values.as_array().cloned().unwrap_or_default(),
            })
        }
        "exists" => Ok(Clause::Exists {
            field: params
                .get("field")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        other => Err(bad_request(
            "parsing_exception",
            &format!("unknown query [{other}]"),
        )),
    }
}

fn single_entry<'a>(
    params: &'a Value,
    kind: &str,
) -> std::result::Result<(String, &'a Value), FailureCause> {
    params
        .as_object()
        .and_then(|o| o.iter().next())
        .map(|(field, value)| (field.clone(), value))
        .ok_or_else(|| bad_request("parsing_exception", &format!("[{kind}] query is malformed")))
}

fn parse_query_string(
    query: &str,
    allow_leading_wildcard: bool,
) -> std::result::Result<Vec<QueryTerm>, FailureCause> {
    let mut terms = Vec::new();
    for token in query.split_whitespace() {
        if token == "*" {
            return Ok(Vec::new());
        }

        let (field, text) = match token.split_once(':') {
            Some((field, text)) if !field.is_empty() && !text.is_empty() => {
                (Some(field.to_string()), text)
            }
            _ => (None, token),
        };

        if !allow_leading_wildcard && (text.starts_with('*') || text.starts_with('?')) {
            return Err(leading_wildcard_rejection(query, text));
        }

        let (text, prefix) = match text.strip_suffix('*') {
            Some(stem) => (stem, true),
            None => (text, false),
        };
        let stripped = text.trim_start_matches(['*', '?']);
        terms.push(QueryTerm {
            field,
            text: stripped.to_lowercase(),
            prefix,
            suffix: stripped.len() != text.len(),
        });
    }
    Ok(terms)
}

fn clause_matches(clause: &Clause, source: &Map<String, Value>) -> bool {
    match clause {
        Clause::MatchAll => true,
        Clause::QueryString(terms) => {
            terms.is_empty() || terms.iter().any(|term| term_matches(term, source))
        }
        Clause::Range { field, gte, lt } => {
            match source.get(field).and_then(parse_timestamp) {
                Some(ts) => {
                    let millis = ts.timestamp_millis();
                    gte.is_none_or(|g| millis >= g) && lt.is_none_or(|l| millis < l)
                }
                None => false,
            }
        }
        Clause::Term { field, value } => field_values(source.get(field)).any(|v| v == value),
        Clause::Terms { field, values } => {
            field_values(source.get(field)).any(|v| values.contains(v))
        }
        Clause::Exists { field } => source.get(field).is_some_and(|v| !v.is_null()),
    }
}

fn term_matches(term: &QueryTerm, source: &Map<String, Value>) -> bool {
    let word_matches = |word: &str| {
        let word = word.to_lowercase();
        match (term.prefix, term.suffix) {
            (true, true) => word.contains(&term.text),
            (true, false) => word.starts_with(&term.text),
            (false, true) => word.ends_with(&term.text),
            (false, false) => word == term.text,
        }
    };
    let value_matches = |value: &Value| {
        field_values(Some(value)).any(|v| match v {
            Value::String(s) => s
                .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
                .any(&word_matches),
            Value::Number(n) => word_matches(&n.to_string()),
            _ => false,
        })
    };

    match &term.field {
        Some(field) => source.get(field).is_some_and(value_matches),
        None => source.values().any(value_matches),
    }
}

/// Single values of a field, flattening arrays
fn field_values(value: Option<&Value>) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Some(Value::Array(items)) => Box::new(items.iter()),
        Some(other) => Box::new(std::iter::once(other)),
        None => Box::new(std::iter::empty()),
    }
}

/* ========================= Sorting ========================= */

fn parse_sort(sort: Option<&Value>) -> std::result::Result<Vec<String>, FailureCause> {
    let Some(sort) = sort else {
        return Ok(Vec::new());
    };
    let items = sort
        .as_array()
        .ok_or_else(|| bad_request("parsing_exception", "[sort] must be an array"))?;

    items
        .iter()
        .map(|item| match item {
            Value::String(field) => Ok(field.clone()),
            Value::Object(o) => {
                let (field, order) = o
                    .iter()
                    .next()
                    .ok_or_else(|| bad_request("parsing_exception", "empty sort clause"))?;
                let order = order
                    .get("order")
                    .or(Some(order))
                    .and_then(Value::as_str)
                    .unwrap_or("asc");
                if order != "asc" {
                    return Err(bad_request(
                        "illegal_argument_exception",
                        &format!("unsupported sort order [{order}] for [{field}]"),
                    ));
                }
                Ok(field.clone())
            }
            _ => Err(bad_request("parsing_exception", "malformed sort clause")),
        })
        .collect()
}

/// Sort value of a document for one key: dates sort as epoch millis
///
/// A tie-break key the document lacks falls back to the document id.
fn sort_value(doc: &StoredDoc, key: &str, tie_break: bool) -> Value {
    match doc.source.get(key) {
        Some(Value::String(s)) => match crate::utils::time::parse_timestamp_str(s) {
            Some(ts) => Value::from(ts.timestamp_millis()),
            None => Value::String(s.clone()),
        },
        Some(Value::Null) | None if key == "_id" || tie_break => Value::String(doc.id.clone()),
        Some(Value::Null) | None => Value::Null,
        Some(other) => other.clone(),
    }
}

/// Ascending order; missing values sort last, numbers before strings
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(f64::NAN)
                .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
                .unwrap_or(Ordering::Equal),
        },
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn compare_tuples(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| compare_values(x, y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn parse_projection(source: Option<&Value>) -> Option<Vec<String>> {
    source.and_then(Value::as_array).map(|fields| {
        fields
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/* ========================= Error bodies ========================= */

fn bad_request(error_type: &str, reason: &str) -> FailureCause {
    FailureCause::response(
        400,
        Some(json!({
            "error": {
                "root_cause": [{ "type": error_type, "reason": reason }],
                "type": error_type,
                "reason": reason
            },
            "status": 400
        })),
        "400 Bad Request",
    )
    .wrapped_in("Unable to perform search query")
}

fn leading_wildcard_rejection(query: &str, term: &str) -> FailureCause {
    let reason = format!("Failed to parse query [{query}]");
    FailureCause::response(
        400,
        Some(json!({
            "error": {
                "root_cause": [{ "type": "query_shard_exception", "reason": reason }],
                "type": "search_phase_execution_exception",
                "reason": "all shards failed",
                "caused_by": {
                    "type": "query_shard_exception",
                    "reason": reason,
                    "caused_by": {
                        "type": "parse_exception",
                        "reason": format!(
                            "Cannot parse '{term}': '*' or '?' not allowed as first character in WildcardQuery"
                        )
                    }
                }
            },
            "status": 400
        })),
        "400 Bad Request",
    )
    .wrapped_in("Unable to perform search query")
    .wrapped_in("Search request failed")
}

fn index_not_found(index: &str) -> FailureCause {
    FailureCause::response(
        404,
        Some(json!({
            "error": {
                "type": "index_not_found_exception",
                "reason": format!("no such index [{index}]")
            },
            "status": 404
        })),
        "404 Not Found",
    )
    .wrapped_in("Unable to perform search query")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{JsonQueryTranslator, QuerySpec, QueryTranslator, SortSpec};
    use crate::model::{ExportCommand, SortCursor};

    fn backend() -> MemoryBackend {
        MemoryBackend::from_value(&json!({
            "graylog_0": [
                {"_id": "a", "gl2_message_id": "m1", "timestamp": "2015-01-01 01:00:00.000", "source": "source-1", "message": "Ha", "streams": ["stream-01"]},
                {"_id": "c", "gl2_message_id": "m3", "timestamp": "2015-01-01 03:00:00.000", "source": "source-1", "message": "Hi", "streams": ["stream-03"]},
                {"_id": "d", "gl2_message_id": "m4", "timestamp": "2015-01-01 04:00:00.000", "source": "source-2", "message": "Ho", "streams": ["stream-01", "stream-02"]}
            ],
            "graylog_1": [
                {"_id": "b", "gl2_message_id": "m2", "timestamp": "2015-01-01 01:59:59.999", "source": "source-2", "message": "He", "streams": ["stream-02"]}
            ]
        }))
        .unwrap()
    }

    fn spec(query: Option<&str>, page_size: usize) -> QuerySpec {
        let range = TimeRange::parse("2015-01-01T00:00:00Z", "2015-01-02T00:00:00Z").unwrap();
        let mut builder = ExportCommand::builder(range)
            .streams(["stream-01", "stream-02", "stream-03"])
            .chunk_size(page_size);
        if let Some(q) = query {
            builder = builder.query_string(q);
        }
        QuerySpec::from_command(
            &builder.build().unwrap(),
            vec!["graylog_0".into(), "graylog_1".into()],
            SortSpec::default(),
        )
    }

    fn messages(response: &SearchResponse) -> Vec<&str> {
        response
            .hits
            .iter()
            .map(|h| h.source["message"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_load_assigns_ids() {
        let backend = MemoryBackend::from_value(&json!({"i": [{"x": 1}, {"_id": "given"}]})).unwrap();
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.indices["i"][0].id, "i-0");
        assert_eq!(backend.indices["i"][1].id, "given");
        assert!(MemoryBackend::from_value(&json!([1, 2])).is_err());
        assert!(MemoryBackend::from_value(&json!({"i": [1]})).is_err());
    }

    #[tokio::test]
    async fn test_search_sorts_across_indices() {
        let request = JsonQueryTranslator::default().build_search(&spec(None, 10), None, None);
        let response = backend().search(&request).await.unwrap();

        assert_eq!(messages(&response), ["Ha", "He", "Hi", "Ho"]);
        assert_eq!(response.hits[0].sort, vec![json!(1420074000000i64), json!("m1")]);
        assert_eq!(response.hits[1].index, "graylog_1");
    }

    #[tokio::test]
    async fn test_search_after_and_size() {
        let translator = JsonQueryTranslator::default();
        let backend = backend();

        let first = backend
            .search(&translator.build_search(&spec(None, 2), None, None))
            .await
            .unwrap();
        assert_eq!(messages(&first), ["Ha", "He"]);

        let cursor = SortCursor::from_sort_values(&first.hits[1].sort).unwrap();
        let second = backend
            .search(&translator.build_search(&spec(None, 2), Some(&cursor), None))
            .await
            .unwrap();
        assert_eq!(messages(&second), ["Hi", "Ho"]);
    }

    fn tied_backend(ids: Vec<Value>) -> MemoryBackend {
        let docs = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                json!({
                    "_id": format!("doc-{i}"), "gl2_message_id": id,
                    "timestamp": "2015-01-01 01:00:00.000",
                    "message": format!("m{i}"), "streams": ["stream-01"]
                })
            })
            .collect::<Vec<_>>();
        MemoryBackend::from_value(&json!({ "graylog_0": docs })).unwrap()
    }

    fn tied_spec(page_size: usize) -> QuerySpec {
        let range = TimeRange::parse("2015-01-01T00:00:00Z", "2015-01-02T00:00:00Z").unwrap();
        let command = ExportCommand::builder(range)
            .stream("stream-01")
            .chunk_size(page_size)
            .build()
            .unwrap();
        QuerySpec::from_command(&command, vec!["graylog_0".into()], SortSpec::default())
    }

    #[tokio::test]
    async fn test_search_after_numeric_tie_breaker() {
        let backend = tied_backend((0..12).map(|i| json!(i)).collect());
        let translator = JsonQueryTranslator::default();

        let first = backend
            .search(&translator.build_search(&tied_spec(3), None, None))
            .await
            .unwrap();
        assert_eq!(messages(&first), ["m0", "m1", "m2"]);

        let cursor = SortCursor::from_sort_values(&first.hits[2].sort).unwrap();
        let request = translator.build_search(&tied_spec(3), Some(&cursor), None);
        assert_eq!(request.body["search_after"][1], json!(2));

        let second = backend.search(&request).await.unwrap();
        assert_eq!(messages(&second), ["m3", "m4", "m5"]);
    }

    #[tokio::test]
    async fn test_missing_tie_breaker_falls_back_to_id() {
        let mut backend = tied_backend(vec![json!("id-1")]);
        backend
            .insert(
                "graylog_0",
                json!({
                    "_id": "doc-x", "timestamp": "2015-01-01 01:00:00.000",
                    "message": "untagged", "streams": ["stream-01"]
                }),
            )
            .unwrap();

        let request = JsonQueryTranslator::default().build_search(&tied_spec(10), None, None);
        let response = backend.search(&request).await.unwrap();

        assert_eq!(messages(&response), ["untagged", "m0"]);
        assert_eq!(response.hits[0].sort[1], json!("doc-x"));
        assert!(response.hits.iter().all(|h| h.cursor().is_ok()));
    }

    #[tokio::test]
    async fn test_query_string_terms_are_ored() {
        let request = JsonQueryTranslator::default().build_search(&spec(Some("Ha Ho"), 10), None, None);
        let response = backend().search(&request).await.unwrap();
        assert_eq!(messages(&response), ["Ha", "Ho"]);

        let request =
            JsonQueryTranslator::default().build_search(&spec(Some("source:source-2"), 10), None, None);
        let response = backend().search(&request).await.unwrap();
        assert_eq!(messages(&response), ["He", "Ho"]);

        let request = JsonQueryTranslator::default().build_search(&spec(Some("h*"), 10), None, None);
        let response = backend().search(&request).await.unwrap();
        assert_eq!(response.hits.len(), 4);
    }

    #[tokio::test]
    async fn test_leading_wildcard_rejected_with_nested_cause() {
        let request = JsonQueryTranslator::default().build_search(&spec(Some("*a"), 10), None, None);
        let failure = backend().search(&request).await.unwrap_err();

        assert_eq!(failure.depth(), 3);
        match &failure.innermost().kind {
            crate::error::FailureKind::Response { status, body } => {
                assert_eq!(*status, 400);
                assert!(body.is_some());
            }
            other => panic!("unexpected failure kind {other:?}"),
        }

        let permissive = JsonQueryTranslator::new(true, "streams")
            .build_search(&spec(Some("*a"), 10), None, None);
        let response = backend().search(&permissive).await.unwrap();
        assert_eq!(messages(&response), ["Ha"]);
    }

    #[tokio::test]
    async fn test_projection_limits_source() {
        let mut spec = spec(None, 1);
        spec.fields = vec!["message".to_string()];
        let request = JsonQueryTranslator::default().build_search(&spec, None, None);
        let response = backend().search(&request).await.unwrap();

        let keys: Vec<&String> = response.hits[0].source.keys().collect();
        assert_eq!(keys, ["message"]);
    }

    #[tokio::test]
    async fn test_unknown_index_fails() {
        let mut spec = spec(None, 1);
        spec.indices = vec!["missing".to_string()];
        let request = JsonQueryTranslator::default().build_search(&spec, None, None);
        assert!(backend().search(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_scroll_pages_and_clear() {
        let backend = backend();
        let keep_alive = Duration::from_secs(60);
        let request = JsonQueryTranslator::default().build_search(&spec(None, 3), None, Some(keep_alive));

        let first = backend.search(&request).await.unwrap();
        let scroll_id = first.scroll_id.clone().unwrap();
        assert_eq!(messages(&first), ["Ha", "He", "Hi"]);
        assert_eq!(backend.open_scrolls(), 1);

        let second = backend.scroll(&scroll_id, keep_alive).await.unwrap();
        assert_eq!(messages(&second), ["Ho"]);

        backend.clear_scroll(&scroll_id).await.unwrap();
        assert_eq!(backend.open_scrolls(), 0);
        assert!(backend.scroll(&scroll_id, keep_alive).await.is_err());
    }

    #[tokio::test]
    async fn test_resolver_uses_streams_and_time_range() {
        let backend = backend();
        let streams: BTreeSet<String> = ["stream-02".to_string()].into_iter().collect();

        let all_day = TimeRange::parse("2015-01-01T00:00:00Z", "2015-01-02T00:00:00Z").unwrap();
        let indices = backend.resolve(&streams, &all_day).await.unwrap();
        assert_eq!(indices.into_iter().collect::<Vec<_>>(), ["graylog_0", "graylog_1"]);

        let early = TimeRange::parse("2015-01-01T00:00:00Z", "2015-01-01T02:00:00Z").unwrap();
        let indices = backend.resolve(&streams, &early).await.unwrap();
        assert_eq!(indices.into_iter().collect::<Vec<_>>(), ["graylog_1"]);

        let nothing: BTreeSet<String> = ["stream-99".to_string()].into_iter().collect();
        assert!(backend.resolve(&nothing, &all_day).await.unwrap().is_empty());
    }
}
