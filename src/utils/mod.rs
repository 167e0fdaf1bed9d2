//! Utility functions and helpers
//!
//! - Timestamp parsing from the shapes search backends store them in
//! - Time zone aware timestamp rendering
//! - File name helpers for export output

/// Time and timestamp utilities
pub mod time {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use chrono_tz::Tz;
    use serde_json::Value;

    /// Storage format used by log indices: `2015-01-01 01:00:00.000`, always UTC
    const INDEX_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

    /// Parse a timestamp value as stored in a document
    ///
    /// Accepts epoch milliseconds, RFC 3339 strings, and the index storage
    /// format (interpreted as UTC).
    pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Number(n) => n.as_i64().and_then(from_millis),
            Value::String(s) => parse_timestamp_str(s),
            _ => None,
        }
    }

    /// Parse a timestamp string, see [`parse_timestamp`]
    pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, INDEX_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(millis)
    }

    /// Render an instant in the given zone, e.g. `2015-01-01T11:30:00.000+10:30`
    ///
    /// A zero offset is written as `Z`.
    pub fn format_in_zone(instant: &DateTime<Utc>, zone: Tz) -> String {
        instant
            .with_timezone(&zone)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn test_parse_timestamp_shapes() {
            let expected = Utc.with_ymd_and_hms(2015, 1, 1, 1, 0, 0).unwrap();
            assert_eq!(parse_timestamp(&json!("2015-01-01T01:00:00.000Z")), Some(expected));
            assert_eq!(parse_timestamp(&json!("2015-01-01 01:00:00.000")), Some(expected));
            assert_eq!(parse_timestamp(&json!(1420074000000i64)), Some(expected));
            assert_eq!(parse_timestamp(&json!("yesterday")), None);
            assert_eq!(parse_timestamp(&json!(true)), None);
        }

        #[test]
        fn test_format_in_utc_uses_z() {
            let instant = Utc.with_ymd_and_hms(2015, 1, 1, 1, 0, 0).unwrap();
            assert_eq!(format_in_zone(&instant, Tz::UTC), "2015-01-01T01:00:00.000Z");
        }

        #[test]
        fn test_format_in_zone_with_half_hour_offset() {
            let instant = Utc.with_ymd_and_hms(2015, 1, 1, 1, 0, 0).unwrap();
            assert_eq!(
                format_in_zone(&instant, chrono_tz::Australia::Adelaide),
                "2015-01-01T11:30:00.000+10:30"
            );
        }
    }
}

/// File system helpers
pub mod fs {
    use chrono::Local;

    /// Default output file name for an export format extension
    ///
    /// # Arguments
    /// * `extension` - File extension without the dot
    ///
    /// # Returns
    /// * `String` - File name like `export-2024-01-01_12-00-00.jsonl`
    pub fn default_export_filename(extension: &str) -> String {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        format!("export-{}.{}", timestamp, extension)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_default_export_filename() {
            let name = default_export_filename("csv");
            assert!(name.starts_with("export-"));
            assert!(name.ends_with(".csv"));
        }
    }
}
