//! Filter planning
//!
//! Classifies each filter once into the comparison every backend performs,
//! so the in-memory engine and both SQL dialects agree on semantics:
//!
//! | Filter | Predicate |
//! |---|---|
//! | `=` on text | case-insensitive equality |
//! | `IN` | case-insensitive membership |
//! | `LIKE` | case-insensitive substring; `%` and `_` match literally |
//! | `>`,`<`,`>=`,`<=` | numeric, unparsable cells fail |
//! | any comparison on a date-like column with a date literal | day-granularity date comparison |

use crate::dates::{self, CalendarDate};
use crate::heuristics;
use crate::query::{Filter, FilterOp};
use crate::value::{parse_number, Value};

/// A filter lowered to the comparison backends execute
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Lowercased text equality
    TextEquals { column: String, value: String },
    /// Lowercased membership
    OneOf { column: String, values: Vec<String> },
    /// Lowercased substring
    Contains { column: String, needle: String },
    /// Numeric ordering comparison
    Number { column: String, op: FilterOp, value: f64 },
    /// Day-granularity date comparison
    Date { column: String, op: FilterOp, date: CalendarDate },
    /// A comparison that can never hold (non-numeric literal for `>` etc.)
    Never { column: String },
}

impl Predicate {
    /// Lower a validated filter
    pub fn plan(filter: &Filter) -> Self {
        let column = filter.column.clone();

        if let Some(date) = date_operand(filter) {
            return Self::Date {
                column,
                op: filter.operator,
                date,
            };
        }

        match filter.operator {
            FilterOp::Eq => Self::TextEquals {
                column,
                value: first_text(filter),
            },
            FilterOp::In => Self::OneOf {
                column,
                values: filter
                    .value
                    .values()
                    .into_iter()
                    .map(|v| v.as_text().to_lowercase())
                    .collect(),
            },
            FilterOp::Like => Self::Contains {
                column,
                needle: first_text(filter),
            },
            op => match filter.value.first().and_then(Value::as_f64) {
                Some(value) => Self::Number { column, op, value },
                None => Self::Never { column },
            },
        }
    }

    /// Column the predicate reads
    pub fn column(&self) -> &str {
        match self {
            Self::TextEquals { column, .. }
            | Self::OneOf { column, .. }
            | Self::Contains { column, .. }
            | Self::Number { column, .. }
            | Self::Date { column, .. }
            | Self::Never { column } => column,
        }
    }

    /// Evaluate against one cell
    pub fn matches(&self, cell: &Value) -> bool {
        match self {
            Self::TextEquals { value, .. } => {
                !cell.is_blank() && cell.as_text().to_lowercase() == *value
            }
            Self::OneOf { values, .. } => {
                if cell.is_blank() {
                    return false;
                }
                let text = cell.as_text().to_lowercase();
                values.iter().any(|v| *v == text)
            }
            Self::Contains { needle, .. } => {
                !cell.is_blank() && cell.as_text().to_lowercase().contains(needle.as_str())
            }
            Self::Number { op, value, .. } => cell
                .as_f64()
                .map(|n| op.compare_f64(n, *value))
                .unwrap_or(false),
            Self::Date { op, date, .. } => dates::normalize(cell)
                .map(|d| dates::compare(&d, *op, date))
                .unwrap_or(false),
            Self::Never { .. } => false,
        }
    }
}

fn first_text(filter: &Filter) -> String {
    filter
        .value
        .first()
        .map(|v| v.as_text().to_lowercase())
        .unwrap_or_default()
}

/// The date literal of a comparison on a date-like column
///
/// Numeric literals stay numeric so `Year >= 2016` style filters keep
/// their meaning.
fn date_operand(filter: &Filter) -> Option<CalendarDate> {
    if !filter.operator.is_comparison() || !heuristics::looks_like_date_column(&filter.column) {
        return None;
    }
    match filter.value.first()? {
        Value::Text(text) if parse_number(text).is_none() => dates::normalize_str(text),
        Value::Timestamp(ts) => Some(CalendarDate::from(ts.date())),
        _ => None,
    }
}
