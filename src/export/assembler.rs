//! Chunk assembly: projecting hits onto the requested fields

use chrono_tz::Tz;
use serde_json::Value;

use crate::model::{Chunk, FieldValue, Record, SearchHit};
use crate::utils::time::{format_in_zone, parse_timestamp};

/// Turns one page of hits into a chunk of projected records
#[derive(Debug, Clone)]
pub struct ChunkAssembler {
    timestamp_field: String,
}

impl ChunkAssembler {
    pub fn new(timestamp_field: impl Into<String>) -> Self {
        Self {
            timestamp_field: timestamp_field.into(),
        }
    }

    pub fn timestamp_field(&self) -> &str {
        &self.timestamp_field
    }

    /// Build a chunk from `hits`
    ///
    /// Every record carries exactly `fields`, in that order. Fields a hit
    /// lacks become [`FieldValue::Missing`]; the timestamp field is rendered
    /// in `time_zone`.
    pub fn assemble(
        &self,
        hits: &[SearchHit],
        fields: &[String],
        is_first_chunk: bool,
        time_zone: Tz,
    ) -> Chunk {
        let records = hits
            .iter()
            .map(|hit| {
                let mut record = Record::with_capacity(fields.len());
                for field in fields {
                    let value = match hit.field(field) {
                        Some(value) if *field == self.timestamp_field => {
                            FieldValue::Present(self.render_timestamp(value, time_zone))
                        }
                        Some(value) => FieldValue::Present(value),
                        None => FieldValue::Missing,
                    };
                    record.push(field.as_str(), value);
                }
                record
            })
            .collect();

        Chunk::new(records, is_first_chunk)
    }

    fn render_timestamp(&self, value: Value, time_zone: Tz) -> Value {
        match parse_timestamp(&value) {
            Some(instant) => Value::String(format_in_zone(&instant, time_zone)),
            None => value,
        }
    }
}

impl Default for ChunkAssembler {
    fn default() -> Self {
        Self::new("timestamp")
    }
}
