use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ExportError;

/// Error types the backend uses when it refuses to run a query.
const QUERY_REJECTION_TYPES: &[&str] = &[
    "query_shard_exception",
    "query_parsing_exception",
    "parse_exception",
    "parsing_exception",
    "search_phase_execution_exception",
    "illegal_argument_exception",
    "x_content_parse_exception",
];

/// One node of a backend error envelope.
///
/// Mirrors the `error` object of a search backend response:
/// `{"type": ..., "reason": ..., "root_cause": [...], "caused_by": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCause {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub root_cause: Vec<ErrorCause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Box<ErrorCause>>,
}

/// Full error body as returned next to a failed (or partially failed) search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCause,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Structured error information extracted from a backend error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<RootCause>,
}

/// The innermost cause reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCause {
    #[serde(rename = "type")]
    pub error_type: String,
    pub reason: String,
}

impl ErrorCause {
    /// Innermost cause of this error node.
    ///
    /// The first `root_cause` entry wins when present, otherwise the
    /// `caused_by` chain is followed until it ends.
    pub fn innermost(&self) -> &ErrorCause {
        if let Some(first) = self.root_cause.first() {
            return first;
        }
        let mut current = self;
        while let Some(next) = current.caused_by.as_deref() {
            current = next;
        }
        current
    }
}

impl ErrorInfo {
    /// Extract error information from a raw backend error body.
    ///
    /// Accepts both the wrapped form (`{"error": {...}, "status": 400}`) and a
    /// bare error node. Returns `None` when the body has no recognisable shape.
    pub fn from_body(body: &Value) -> Option<Self> {
        let cause = match serde_json::from_value::<ErrorBody>(body.clone()) {
            Ok(wrapped) => wrapped.error,
            Err(_) => serde_json::from_value::<ErrorCause>(body.clone()).ok()?,
        };

        let innermost = cause.innermost();
        let root_cause = if std::ptr::eq(innermost, &cause) {
            None
        } else {
            Some(RootCause {
                error_type: innermost.error_type.clone(),
                reason: innermost.reason.clone().unwrap_or_default(),
            })
        };

        Some(Self {
            error_type: cause.error_type.clone(),
            reason: cause.reason.clone().unwrap_or_default(),
            root_cause,
        })
    }

    /// Type of the innermost cause, falling back to the top-level type.
    pub fn innermost_type(&self) -> &str {
        self.root_cause
            .as_ref()
            .map(|r| r.error_type.as_str())
            .unwrap_or(&self.error_type)
    }

    /// Reason of the innermost cause, falling back to the top-level reason.
    pub fn innermost_reason(&self) -> &str {
        self.root_cause
            .as_ref()
            .map(|r| r.reason.as_str())
            .unwrap_or(&self.reason)
    }

    /// Whether any level of this error says the query itself was refused.
    pub fn is_query_rejection(&self) -> bool {
        is_query_rejection_type(self.innermost_type()) || is_query_rejection_type(&self.error_type)
    }

    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Kind of a low-level failure reported by a backend client.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// Could not connect (refused, reset, DNS, TLS handshake, ...).
    Connect,
    /// The request did not complete in time.
    Timeout,
    /// The backend answered with an error status and an optional body.
    Response { status: u16, body: Option<Value> },
    /// Anything else; only the message is known.
    Other,
}

/// A client-side failure, possibly wrapping a chain of lower-level causes.
///
/// Backend client libraries tend to wrap the interesting failure in several
/// layers of generic errors, so classification always looks at
/// [`FailureCause::innermost`] first.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
    pub cause: Option<Box<FailureCause>>,
}

impl FailureCause {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn response(status: u16, body: Option<Value>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Response { status, body }, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }

    /// Wrap `self` as the cause of a new, more generic failure.
    pub fn wrapped_in(self, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Other,
            message: message.into(),
            cause: Some(Box::new(self)),
        }
    }

    /// Follow the cause chain until no further cause exists.
    pub fn innermost(&self) -> &FailureCause {
        let mut current = self;
        while let Some(next) = current.cause.as_deref() {
            current = next;
        }
        current
    }

    /// Number of layers in the chain, including `self`.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self;
        while let Some(next) = current.cause.as_deref() {
            depth += 1;
            current = next;
        }
        depth
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FailureCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Type and reason recovered from a stringified backend exception such as
/// `SearchException[type=query_shard_exception, reason=Failed to parse query [*a]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBackendException {
    pub error_type: String,
    pub reason: String,
}

impl ParsedBackendException {
    pub fn parse(text: &str) -> Option<Self> {
        let type_start = text.find("[type=")? + "[type=".len();
        let after_type = &text[type_start..];
        let reason_marker = after_type.find(", reason=")?;
        let error_type = after_type[..reason_marker].trim();
        let reason = after_type[reason_marker + ", reason=".len()..]
            .trim_end()
            .strip_suffix(']')?;

        if error_type.is_empty() {
            return None;
        }

        Some(Self {
            error_type: error_type.to_string(),
            reason: reason.to_string(),
        })
    }
}

pub fn is_query_rejection_type(error_type: &str) -> bool {
    QUERY_REJECTION_TYPES.contains(&error_type)
}

/// Map a backend failure onto the export error taxonomy.
///
/// `parse_body` turns a raw error body into [`ErrorInfo`]; it is supplied by
/// the query translator so that backend dialects stay out of this module.
pub fn classify_failure<F>(failure: &FailureCause, parse_body: F) -> ExportError
where
    F: Fn(&Value) -> Option<ErrorInfo>,
{
    let innermost = failure.innermost();

    match &innermost.kind {
        FailureKind::Connect | FailureKind::Timeout => {
            ExportError::Unavailable(innermost.message.clone())
        }
        FailureKind::Response { status, body } => {
            let info = body.as_ref().and_then(&parse_body);
            classify_response(*status, info, &innermost.message)
        }
        FailureKind::Other => match ParsedBackendException::parse(&innermost.message) {
            Some(parsed) if is_query_rejection_type(&parsed.error_type) => {
                ExportError::QuerySyntax {
                    error_type: parsed.error_type,
                    reason: parsed.reason,
                }
            }
            _ => ExportError::Backend(innermost.message.clone()),
        },
    }
}

/// Classify an error envelope attached to an otherwise delivered response.
pub fn classify_envelope<F>(body: &Value, parse_body: F) -> ExportError
where
    F: Fn(&Value) -> Option<ErrorInfo>,
{
    let status = body
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(500);
    classify_response(status, parse_body(body), &body.to_string())
}

fn classify_response(status: u16, info: Option<ErrorInfo>, raw: &str) -> ExportError {
    if matches!(status, 408 | 429 | 502 | 503 | 504) {
        return ExportError::Unavailable(format!("HTTP {status}: {raw}"));
    }

    match info {
        Some(info) if (400..500).contains(&status) || info.is_query_rejection() => {
            ExportError::QuerySyntax {
                error_type: info.innermost_type().to_string(),
                reason: info.innermost_reason().to_string(),
            }
        }
        Some(info) => ExportError::Backend(
            info.to_json_compact()
                .unwrap_or_else(|_| format!("HTTP {status}: {raw}")),
        ),
        None => ExportError::Backend(format!("HTTP {status}: {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leading_wildcard_body() -> Value {
        json!({
            "error": {
                "type": "search_phase_execution_exception",
                "reason": "all shards failed",
                "root_cause": [{
                    "type": "query_shard_exception",
                    "reason": "Failed to parse query [*a]"
                }],
                "caused_by": {
                    "type": "query_shard_exception",
                    "reason": "Failed to parse query [*a]",
                    "caused_by": {
                        "type": "parse_exception",
                        "reason": "Leading wildcard is not allowed"
                    }
                }
            },
            "status": 400
        })
    }

    #[test]
    fn test_error_info_prefers_root_cause() {
        let info = ErrorInfo::from_body(&leading_wildcard_body()).unwrap();
        assert_eq!(info.error_type, "search_phase_execution_exception");
        assert_eq!(info.innermost_type(), "query_shard_exception");
        assert_eq!(info.innermost_reason(), "Failed to parse query [*a]");
    }

    #[test]
    fn test_error_cause_follows_caused_by_without_root_cause() {
        let cause: ErrorCause = serde_json::from_value(json!({
            "type": "outer",
            "reason": "outer reason",
            "caused_by": {
                "type": "middle",
                "caused_by": { "type": "inner", "reason": "the real problem" }
            }
        }))
        .unwrap();

        let innermost = cause.innermost();
        assert_eq!(innermost.error_type, "inner");
        assert_eq!(innermost.reason.as_deref(), Some("the real problem"));
    }

    #[test]
    fn test_error_info_without_nesting_has_no_root_cause() {
        let info = ErrorInfo::from_body(&json!({"type": "index_not_found_exception", "reason": "no such index"}))
            .unwrap();
        assert!(info.root_cause.is_none());
        assert_eq!(info.innermost_type(), "index_not_found_exception");
    }

    #[test]
    fn test_error_info_unrecognised_shape() {
        assert!(ErrorInfo::from_body(&json!({"message": "nope"})).is_none());
        assert!(ErrorInfo::from_body(&json!("plain text")).is_none());
    }

    #[test]
    fn test_failure_innermost_and_depth() {
        let failure = FailureCause::connect("connection refused")
            .wrapped_in("I/O reactor failure")
            .wrapped_in("Failed to execute search");
        assert_eq!(failure.depth(), 3);
        assert_eq!(failure.innermost().message, "connection refused");
        assert_eq!(failure.innermost().kind, FailureKind::Connect);
    }

    #[test]
    fn test_classify_nested_rejection_as_query_syntax() {
        let failure = FailureCause::response(400, Some(leading_wildcard_body()), "400 Bad Request")
            .wrapped_in("Unable to perform search query");

        match classify_failure(&failure, ErrorInfo::from_body) {
            ExportError::QuerySyntax { error_type, reason } => {
                assert_eq!(error_type, "query_shard_exception");
                assert_eq!(reason, "Failed to parse query [*a]");
            }
            other => panic!("expected QuerySyntax, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_transport_failures_as_unavailable() {
        let refused = FailureCause::connect("connection refused").wrapped_in("request failed");
        assert!(matches!(
            classify_failure(&refused, ErrorInfo::from_body),
            ExportError::Unavailable(_)
        ));

        let timed_out = FailureCause::timeout("30s elapsed");
        assert!(matches!(
            classify_failure(&timed_out, ErrorInfo::from_body),
            ExportError::Unavailable(_)
        ));

        let overloaded = FailureCause::response(503, None, "Service Unavailable");
        assert!(matches!(
            classify_failure(&overloaded, ErrorInfo::from_body),
            ExportError::Unavailable(_)
        ));
    }

    #[test]
    fn test_classify_stringified_exception() {
        let failure = FailureCause::other(
            "SearchException[type=query_shard_exception, reason=Failed to parse query [*a]]",
        )
        .wrapped_in("search failed");

        match classify_failure(&failure, ErrorInfo::from_body) {
            ExportError::QuerySyntax { error_type, reason } => {
                assert_eq!(error_type, "query_shard_exception");
                assert_eq!(reason, "Failed to parse query [*a]");
            }
            other => panic!("expected QuerySyntax, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unknown_shape_keeps_raw_message() {
        let failure = FailureCause::other("something odd happened").wrapped_in("search failed");
        match classify_failure(&failure, ErrorInfo::from_body) {
            ExportError::Backend(msg) => assert_eq!(msg, "something odd happened"),
            other => panic!("expected Backend, got {other:?}"),
        }

        let server = FailureCause::response(500, Some(json!({"oops": true})), "500");
        assert!(matches!(
            classify_failure(&server, ErrorInfo::from_body),
            ExportError::Backend(_)
        ));
    }

    #[test]
    fn test_classify_envelope() {
        let err = classify_envelope(&leading_wildcard_body(), ErrorInfo::from_body);
        assert!(matches!(err, ExportError::QuerySyntax { .. }));
    }

    #[test]
    fn test_parsed_exception() {
        let parsed = ParsedBackendException::parse(
            "ElasticsearchException[type=parse_exception, reason=Cannot parse 'a:']",
        )
        .unwrap();
        assert_eq!(parsed.error_type, "parse_exception");
        assert_eq!(parsed.reason, "Cannot parse 'a:'");

        assert!(ParsedBackendException::parse("no structure here").is_none());
        assert!(ParsedBackendException::parse("X[type=, reason=y]").is_none());
    }
}
