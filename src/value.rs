//! Cell and literal values
//!
//! A single scalar type shared by row data, filter literals and the date
//! normalizer. Row cells loaded from delimited files are always `Text` (or
//! `Null` when empty); inline JSON rows keep their JSON scalar types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// One materialized row: column name → cell
pub type Row = HashMap<String, Value>;

/// A scalar cell or literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing or empty
    Null,
    /// Boolean
    Bool(bool),
    /// Number (all JSON numbers are read as f64)
    Number(f64),
    /// Free text
    Text(String),
    /// Native timestamp, only produced by typed backends
    #[serde(skip_deserializing)]
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Build a cell from raw text, treating blank text as `Null`
    pub fn from_cell(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Self::Null
        } else {
            Self::Text(raw.to_string())
        }
    }

    /// Convert a JSON scalar; arrays and objects yield `None`
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// True for `Null` and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for grouping and string comparison
    ///
    /// Integral numbers render without a fractional part so `100.0` groups
    /// with the text cell `"100"`.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Number(n) => Cow::Owned(format_number(*n)),
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Timestamp(ts) => Cow::Owned(ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }

    /// Numeric reading; unparsable text yields `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => parse_number(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Parse trimmed text as a finite float
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Render a float without a trailing `.0` when it is integral
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
