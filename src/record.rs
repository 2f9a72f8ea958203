//! Record access – records are opaque `serde_json::Value`s that the engine
//! only reads through dot-separated attribute paths or through callbacks.
//!
//! A path segment selects an object key; on arrays a numeric segment selects
//! an index (`lines.0.amount`).

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// A data record as seen by the engine.
pub type Record = Value;

/// Raised when a path segment cannot be followed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot resolve '{segment}' of path '{path}' on {found} value {record}")]
pub struct AttributeError {
    /// Full path that was being resolved.
    pub path: String,
    /// The segment that failed.
    pub segment: String,
    /// JSON type of the value the segment was applied to.
    pub found: &'static str,
    /// Compact rendering of the record the path started from.
    pub record: String,
}

/// A parsed, non-empty attribute path.
#[derive(Clone, PartialEq, Eq)]
pub struct AttrPath {
    raw: String,
    segments: Vec<String>,
}

impl AttrPath {
    /// Parse `a.b.c`. Empty paths and empty segments are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Walk the path from `record`.
    pub fn resolve<'v>(&self, record: &'v Value) -> Result<&'v Value, AttributeError> {
        let mut current = record;
        for segment in &self.segments {
            let next = match current {
                Value::Object(map) => map.get(segment.as_str()),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = match next {
                Some(v) => v,
                None => {
                    return Err(AttributeError {
                        path: self.raw.clone(),
                        segment: segment.clone(),
                        found: type_name(current),
                        record: preview(record),
                    })
                }
            };
        }
        Ok(current)
    }
}

impl fmt::Debug for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttrPath({})", self.raw)
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Default textual form of a value: strings unquoted, `null` empty,
/// containers as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(record: &Value) -> String {
    let s = record.to_string();
    if s.chars().count() > 80 {
        let cut: String = s.chars().take(77).collect();
        format!("{cut}...")
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_objects_and_indices() {
        let rec = json!({"customer": {"name": "Ada"}, "lines": [{"qty": 2}, {"qty": 5}]});
        let name = AttrPath::parse("customer.name").unwrap();
        assert_eq!(name.resolve(&rec).unwrap(), &json!("Ada"));
        let qty = AttrPath::parse("lines.1.qty").unwrap();
        assert_eq!(qty.resolve(&rec).unwrap(), &json!(5));
    }

    #[test]
    fn missing_segment_reports_context() {
        let rec = json!({"customer": "Ada"});
        let path = AttrPath::parse("customer.address.city").unwrap();
        let err = path.resolve(&rec).unwrap_err();
        assert_eq!(err.segment, "address");
        assert_eq!(err.found, "string");
        assert_eq!(err.path, "customer.address.city");
        assert!(err.record.contains("Ada"));
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(AttrPath::parse("").is_none());
        assert!(AttrPath::parse("a..b").is_none());
    }

    #[test]
    fn display_strips_quotes_and_nulls() {
        assert_eq!(display_value(&json!("x")), "x");
        assert_eq!(display_value(&json!(null)), "");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }
}
