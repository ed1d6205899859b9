//! Naming and phrasing heuristics
//!
//! Every guess the engine makes from names or free text lives here so the
//! aggregation code never inlines one:
//!
//! - [`looks_like_date_column`]: a grouping column whose name matches is
//!   month-bucketed by every adapter.
//! - [`mentions_comparison`]: the question contains "vs"/"versus".
//! - [`multi_series_promotion`]: the repair the validator applies when a
//!   comparison question was emitted as a single series.

use crate::query::{DataQuerySpec, FilterOp, FilterValue};
use regex::Regex;
use std::sync::OnceLock;

fn date_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // "Order Date", "timestamp", "created_at", "Ship Time", "posted_on"
        Regex::new(r"(?i)(date|timestamp|(^|[_\s])(time|at|on)$)").expect("valid regex")
    })
}

fn comparison_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b(vs|versus)\b").expect("valid regex"))
}

/// Whether a column name suggests it holds dates
pub fn looks_like_date_column(name: &str) -> bool {
    date_column_pattern().is_match(name.trim())
}

/// Whether the free-text question asks for a side-by-side comparison
pub fn mentions_comparison(question: &str) -> bool {
    comparison_pattern().is_match(question)
}

/// Column to promote to the series dimension, if the repair applies
///
/// Applies when the spec is single-series, groups by a date-like dimension,
/// has an `IN` filter over a list, and the question mentions "vs"/"versus".
/// The first qualifying `IN` filter wins. The validator passes only filters
/// whose value arrived as a list, so a scalar repaired into a one-element
/// list never triggers the promotion.
pub fn multi_series_promotion(spec: &DataQuerySpec, question: Option<&str>) -> Option<String> {
    if spec.multi_series {
        return None;
    }
    let dimension = spec.dimension.as_deref()?;
    if !looks_like_date_column(dimension) {
        return None;
    }
    if !question.map(mentions_comparison).unwrap_or(false) {
        return None;
    }

    spec.filters
        .iter()
        .find(|f| f.operator == FilterOp::In && matches!(f.value, FilterValue::List(_)))
        .map(|f| f.column.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;

    #[test]
    fn test_date_column_names() {
        for name in ["OrderDate", "Order Date", "ship_date", "timestamp", "created_at", "Ship Time", "posted_on"] {
            assert!(looks_like_date_column(name), "{name}");
        }
        for name in ["State", "Sales", "Location", "Category", "Region"] {
            assert!(!looks_like_date_column(name), "{name}");
        }
    }

    #[test]
    fn test_comparison_phrasing() {
        assert!(mentions_comparison("Kentucky vs California sales"));
        assert!(mentions_comparison("Kentucky vs. California"));
        assert!(mentions_comparison("kentucky VERSUS california"));
        assert!(!mentions_comparison("sales in canvas bags"));
        assert!(!mentions_comparison("total revenue"));
    }

    fn candidate() -> DataQuerySpec {
        DataQuerySpec::sum("Sales")
            .group_by("OrderDate")
            .filter(Filter::one_of("State", &["Kentucky", "California"]))
    }

    #[test]
    fn test_promotion_applies() {
        let column = multi_series_promotion(&candidate(), Some("Kentucky vs California by month"));
        assert_eq!(column.as_deref(), Some("State"));
    }

    #[test]
    fn test_promotion_needs_every_condition() {
        assert_eq!(multi_series_promotion(&candidate(), Some("Kentucky and California")), None);
        assert_eq!(multi_series_promotion(&candidate(), None), None);

        let mut not_date = candidate();
        not_date.dimension = Some("Region".into());
        assert_eq!(multi_series_promotion(&not_date, Some("a vs b")), None);

        let no_in = DataQuerySpec::sum("Sales")
            .group_by("OrderDate")
            .filter(Filter::eq("State", "Kentucky"));
        assert_eq!(multi_series_promotion(&no_in, Some("a vs b")), None);

        let already = candidate().split_by("Region");
        assert_eq!(multi_series_promotion(&already, Some("a vs b")), None);
    }
}
