//! Export command definition and validation

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExportError, Result};

/// Chunk size used when the caller does not set one
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Fields exported when the caller does not name any
pub const DEFAULT_FIELDS: [&str; 3] = ["timestamp", "source", "message"];

/// Half-open absolute time range `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Parse both boundaries from RFC 3339 strings
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        let parse = |label: &str, raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ExportError::Validation(format!("invalid {label} '{raw}': {e}")))
        };
        Ok(Self::new(parse("range start", from)?, parse("range end", to)?))
    }

    /// Whether an instant lies inside the range
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.from && *instant < self.to
    }
}

/// Additional filter predicate, combined with the query via logical AND
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Field equals a value
    Term { field: String, value: Value },

    /// Field equals any of the values
    Terms { field: String, values: Vec<Value> },

    /// Field is present
    Exists { field: String },
}

impl Filter {
    /// Field this filter applies to
    pub fn field(&self) -> &str {
        match self {
            Filter::Term { field, .. } | Filter::Terms { field, .. } | Filter::Exists { field } => {
                field
            }
        }
    }
}

/// Immutable export request
///
/// Built through [`ExportCommand::builder`]. A built command is always valid:
/// non-empty streams, a positive chunk size, a well-ordered time range and a
/// non-empty, duplicate-free field list.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportCommand {
    streams: BTreeSet<String>,
    time_range: TimeRange,
    query_string: Option<String>,
    fields_in_order: Vec<String>,
    chunk_size: usize,
    limit: Option<u64>,
    time_zone: Tz,
    additional_filters: Vec<Filter>,
}

impl ExportCommand {
    /// Start building a command for the given time range
    pub fn builder(time_range: TimeRange) -> ExportCommandBuilder {
        ExportCommandBuilder::new(time_range)
    }

    pub fn streams(&self) -> &BTreeSet<String> {
        &self.streams
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.time_range
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    pub fn fields_in_order(&self) -> &[String] {
        &self.fields_in_order
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hard cap on delivered records, `None` when unbounded
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn additional_filters(&self) -> &[Filter] {
        &self.additional_filters
    }

    /// Check the command invariants
    ///
    /// The builder already enforces these; the orchestrator re-checks them so
    /// that nothing reaches the backend without passing validation.
    pub fn validate(&self) -> Result<()> {
        if self.streams.is_empty() {
            return Err(ExportError::Validation(
                "at least one stream is required".to_string(),
            ));
        }
        if self.streams.iter().any(|s| s.trim().is_empty()) {
            return Err(ExportError::Validation(
                "stream identifiers must not be blank".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ExportError::Validation(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.time_range.from > self.time_range.to {
            return Err(ExportError::Validation(format!(
                "time range start {} is after its end {}",
                self.time_range.from, self.time_range.to
            )));
        }
        if self.fields_in_order.is_empty() {
            return Err(ExportError::Validation(
                "at least one field must be exported".to_string(),
            ));
        }
        if self.fields_in_order.iter().any(|f| f.trim().is_empty()) {
            return Err(ExportError::Validation(
                "field names must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ExportCommand`]
#[derive(Debug, Clone)]
pub struct ExportCommandBuilder {
    streams: BTreeSet<String>,
    time_range: TimeRange,
    query_string: Option<String>,
    fields_in_order: Option<Vec<String>>,
    chunk_size: usize,
    limit: Option<u64>,
    time_zone: Tz,
    time_zone_error: Option<String>,
    additional_filters: Vec<Filter>,
}

impl ExportCommandBuilder {
    fn new(time_range: TimeRange) -> Self {
        Self {
            streams: BTreeSet::new(),
            time_range,
            query_string: None,
            fields_in_order: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            limit: None,
            time_zone: Tz::UTC,
            time_zone_error: None,
            additional_filters: Vec::new(),
        }
    }

    pub fn stream(mut self, stream: impl Into<String>) -> Self {
        self.streams.insert(stream.into());
        self
    }

    pub fn streams<I, S>(mut self, streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams = streams.into_iter().map(Into::into).collect();
        self
    }

    /// Free-text query; blank strings are treated as "match everything"
    pub fn query_string(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query_string = if query.trim().is_empty() {
            None
        } else {
            Some(query)
        };
        self
    }

    /// Fields to export, in output order. Repeated names keep their first position.
    pub fn fields_in_order<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let fields = fields
            .into_iter()
            .map(Into::into)
            .filter(|f: &String| seen.insert(f.clone()))
            .collect();
        self.fields_in_order = Some(fields);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Cap on total records; `0` means unbounded
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self.time_zone_error = None;
        self
    }

    /// Set the presentation time zone from an IANA identifier such as `Europe/Berlin`
    pub fn time_zone_id(mut self, zone: &str) -> Self {
        match zone.parse::<Tz>() {
            Ok(tz) => {
                self.time_zone = tz;
                self.time_zone_error = None;
            }
            Err(e) => self.time_zone_error = Some(format!("unknown time zone '{zone}': {e}")),
        }
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.additional_filters.push(filter);
        self
    }

    /// Validate and build the command
    pub fn build(self) -> Result<ExportCommand> {
        if let Some(err) = self.time_zone_error {
            return Err(ExportError::Validation(err));
        }

        let fields_in_order = self
            .fields_in_order
            .unwrap_or_else(|| DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect());

        let command = ExportCommand {
            streams: self.streams,
            time_range: self.time_range,
            query_string: self.query_string,
            fields_in_order,
            chunk_size: self.chunk_size,
            limit: self.limit,
            time_zone: self.time_zone,
            additional_filters: self.additional_filters,
        };
        command.validate()?;
        Ok(command)
    }
}
