//! Raw search hits as returned by the backend

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

use super::cursor::SortCursor;

/// A single matching record with its sort tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index the record was found in
    pub index: String,
    /// Backend document id
    pub id: String,
    /// Field values for the requested projection
    #[serde(default)]
    pub source: Map<String, Value>,
    /// Sort values, in sort-clause order
    #[serde(default)]
    pub sort: Vec<Value>,
}

impl SearchHit {
    pub fn new(index: impl Into<String>, id: impl Into<String>, source: Map<String, Value>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            source,
            sort: Vec::new(),
        }
    }

    pub fn with_sort(mut self, sort: Vec<Value>) -> Self {
        self.sort = sort;
        self
    }

    /// Cursor pointing just past this hit
    pub fn cursor(&self) -> Result<SortCursor> {
        SortCursor::from_sort_values(&self.sort)
    }

    /// Look up a field, resolving the `_index` and `_id` meta fields
    pub fn field(&self, name: &str) -> Option<Value> {
        match self.source.get(name) {
            Some(value) => Some(value.clone()),
            None => match name {
                "_index" => Some(Value::String(self.index.clone())),
                "_id" => Some(Value::String(self.id.clone())),
                _ => None,
            },
        }
    }
}
