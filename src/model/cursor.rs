//! Sort cursor for search-after pagination

use std::fmt;

use serde_json::Value;

use crate::error::{ExportError, Result};

/// Stable identifier that breaks timestamp ties
///
/// Keeps the JSON type the backend sorted on, so the value goes back into
/// `search_after` unchanged. Numbers order before strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TieBreaker {
    Num(i64),
    Str(String),
}

impl TieBreaker {
    fn from_sort_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Str(s.clone())),
            Value::Number(n) => integral(n).map(Self::Num),
            _ => None,
        }
    }

    fn to_sort_value(&self) -> Value {
        match self {
            Self::Num(n) => Value::from(*n),
            Self::Str(s) => Value::from(s.clone()),
        }
    }
}

impl From<i64> for TieBreaker {
    fn from(n: i64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for TieBreaker {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for TieBreaker {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl fmt::Display for TieBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Integral value of a JSON number; some backends serialise `long` sort values as floats
fn integral(n: &serde_json::Number) -> Option<i64> {
    n.as_i64()
        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

/// Position in the total order of matching records
///
/// Holds the sort values of the last record of a page: the primary timestamp
/// (epoch milliseconds) and a stable tie-break identifier. Cursors are only
/// ever built from sort values the backend returned, never from counts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortCursor {
    timestamp_millis: i64,
    tie_breaker: TieBreaker,
}

impl SortCursor {
    pub fn new(timestamp_millis: i64, tie_breaker: impl Into<TieBreaker>) -> Self {
        Self {
            timestamp_millis,
            tie_breaker: tie_breaker.into(),
        }
    }

    /// Build a cursor from the sort values attached to a hit
    ///
    /// Expects `[timestamp, tie_breaker]` with an integral timestamp and a
    /// string or integral tie-breaker.
    pub fn from_sort_values(values: &[Value]) -> Result<Self> {
        let [primary, tie_breaker] = values else {
            return Err(ExportError::Backend(format!(
                "expected 2 sort values per hit, got {}",
                values.len()
            )));
        };

        let timestamp_millis = match primary {
            Value::Number(n) => integral(n),
            _ => None,
        }
        .ok_or_else(|| {
            ExportError::Backend(format!("sort value {primary} is not an epoch timestamp"))
        })?;

        let tie_breaker = TieBreaker::from_sort_value(tie_breaker).ok_or_else(|| {
            ExportError::Backend(format!("sort value {tie_breaker} is not a usable tie-breaker"))
        })?;

        Ok(Self {
            timestamp_millis,
            tie_breaker,
        })
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    pub fn tie_breaker(&self) -> &TieBreaker {
        &self.tie_breaker
    }

    /// Sort values in the shape the backend expects for `search_after`
    pub fn to_sort_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.timestamp_millis),
            self.tie_breaker.to_sort_value(),
        ]
    }
}

impl fmt::Display for SortCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.timestamp_millis, self.tie_breaker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_sort_values() {
        let cursor = SortCursor::from_sort_values(&[json!(1420074000000i64), json!("msg-1")]).unwrap();
        assert_eq!(cursor.timestamp_millis(), 1420074000000);
        assert_eq!(cursor.tie_breaker(), &TieBreaker::from("msg-1"));
        assert_eq!(cursor.to_sort_values(), vec![json!(1420074000000i64), json!("msg-1")]);
    }

    #[test]
    fn test_accepts_integral_float_timestamp() {
        let cursor = SortCursor::from_sort_values(&[json!(1000.0), json!(7)]).unwrap();
        assert_eq!(cursor.timestamp_millis(), 1000);
        assert_eq!(cursor.tie_breaker(), &TieBreaker::Num(7));
    }

    #[test]
    fn test_numeric_tie_breaker_keeps_its_type() {
        let cursor = SortCursor::from_sort_values(&[json!(5), json!(2)]).unwrap();
        assert_eq!(cursor.to_sort_values(), vec![json!(5), json!(2)]);
        assert_eq!(cursor.to_string(), "[5, 2]");
    }

    #[test]
    fn test_rejects_malformed_sort_values() {
        assert!(SortCursor::from_sort_values(&[]).is_err());
        assert!(SortCursor::from_sort_values(&[json!(1)]).is_err());
        assert!(SortCursor::from_sort_values(&[json!("x"), json!("id")]).is_err());
        assert!(SortCursor::from_sort_values(&[json!(1.5), json!("id")]).is_err());
        assert!(SortCursor::from_sort_values(&[json!(1), json!(null)]).is_err());
        assert!(SortCursor::from_sort_values(&[json!(1), json!(2.5)]).is_err());
    }

    #[test]
    fn test_total_order_breaks_timestamp_ties() {
        let a = SortCursor::new(10, "a");
        let b = SortCursor::new(10, "b");
        let c = SortCursor::new(11, "a");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_numeric_tie_breakers_order_numerically() {
        assert!(SortCursor::new(10, 9i64) < SortCursor::new(10, 10i64));
        assert!(SortCursor::new(10, 11i64) < SortCursor::new(10, "a"));
    }
}
