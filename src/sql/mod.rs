//! SQL statement builders
//!
//! Lowers a [`DataQuerySpec`] into one aggregate SELECT for a given
//! [`Dialect`]. Dialects only decide *spelling* (quoting, placeholders,
//! the month-bucket function, numeric coercion); the statement shape and
//! the filter semantics come from [`Predicate`] and are shared.
//!
//! Filter values are always bound as parameters. [`SqlStatement::display`]
//! inlines them as escaped literals for humans only.
//!
//! # Statement shape
//!
//! ```text
//! SELECT <bucket> AS bucket_key[, <series> AS series_key], <AGG> AS metric_value
//! FROM <table>
//! [WHERE <bucket> IS NOT NULL AND <filters...>]
//! [GROUP BY bucket_key[, series_key]]
//! [HAVING <AGG> != 0]          -- dialects that drop zero sums
//! [ORDER BY bucket_key[, series_key]]
//! [LIMIT n]                    -- dialects with a hard row cap
//! ```

pub mod ansi;
pub mod bigquery;
pub mod sqlite;

use crate::dates::CalendarDate;
use crate::heuristics;
use crate::query::{AggregationType, DataQuerySpec, Predicate};

pub use ansi::AnsiDialect;
pub use bigquery::BigQueryDialect;
pub use sqlite::SqliteDialect;

/// Output column aliases
pub const BUCKET_ALIAS: &str = "bucket_key";
pub const SERIES_ALIAS: &str = "series_key";
pub const VALUE_ALIAS: &str = "metric_value";

/// A bound parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Number(f64),
    /// A whole list bound as one array parameter
    TextList(Vec<String>),
    Date(CalendarDate),
}

/// A parameter with its dialect spelling
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    /// Parameter name as the backend expects it (`1`, `p0`)
    pub name: String,
    /// Placeholder as it appears in the text (`?1`, `@p0`)
    pub placeholder: String,
    pub value: SqlParam,
    /// Escaped literal used by [`SqlStatement::display`]
    pub literal: String,
}

/// A parameterised statement
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<BoundParam>,
}

impl SqlStatement {
    /// The statement with every placeholder replaced by its literal
    pub fn display(&self) -> String {
        let mut by_length: Vec<&BoundParam> = self.params.iter().collect();
        by_length.sort_by(|a, b| b.placeholder.len().cmp(&a.placeholder.len()));

        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(ch) = rest.chars().next() {
            match by_length.iter().find(|p| rest.starts_with(p.placeholder.as_str())) {
                Some(param) => {
                    out.push_str(&param.literal);
                    rest = &rest[param.placeholder.len()..];
                }
                None => {
                    out.push(ch);
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        out
    }
}

/// Spelling rules of one SQL backend
pub trait Dialect {
    /// Quote a column identifier
    fn quote_ident(&self, ident: &str) -> String;

    /// Render the FROM target
    fn table_ref(&self, table: &str) -> String;

    /// `(name, placeholder)` for the zero-based parameter `index`
    fn placeholder(&self, index: usize) -> (String, String);

    /// Escaped literal for display
    fn literal(&self, param: &SqlParam) -> String;

    /// `YYYY-MM` bucket of a quoted column, NULL when it is not a date
    fn month_bucket(&self, column: &str) -> String;

    /// Day-granularity comparable form of a quoted column
    fn day_value(&self, column: &str) -> String;

    /// Numeric value of a quoted column, NULL when unparsable
    fn to_number(&self, column: &str) -> String;

    /// Lowercased text of a quoted column
    fn lower_text(&self, column: &str) -> String;

    /// Case-folded substring test; `needle` is an already-lowercased, escaped placeholder
    fn contains(&self, lhs: &str, needle: &str) -> String;

    /// Whether `IN` lists bind one placeholder per element
    fn expands_lists(&self) -> bool;

    /// Membership test over the bound placeholders
    fn in_list(&self, lhs: &str, placeholders: &[String]) -> String;

    /// Drop buckets whose sum is zero
    fn excludes_zero_sums(&self) -> bool {
        false
    }

    /// Hard cap on returned rows
    fn row_limit(&self) -> Option<usize> {
        None
    }
}

struct Binder<'a> {
    dialect: &'a dyn Dialect,
    params: Vec<BoundParam>,
}

impl<'a> Binder<'a> {
    fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: SqlParam) -> String {
        let (name, placeholder) = self.dialect.placeholder(self.params.len());
        let literal = self.dialect.literal(&value);
        self.params.push(BoundParam {
            name,
            placeholder: placeholder.clone(),
            value,
            literal,
        });
        placeholder
    }

    fn bind_list(&mut self, values: &[String]) -> Vec<String> {
        if self.dialect.expands_lists() {
            values
                .iter()
                .map(|v| self.bind(SqlParam::Text(v.clone())))
                .collect()
        } else {
            vec![self.bind(SqlParam::TextList(values.to_vec()))]
        }
    }
}

/// Build the aggregate SELECT for a spec
pub fn build_select(dialect: &dyn Dialect, spec: &DataQuerySpec, table: &str) -> SqlStatement {
    let mut binder = Binder::new(dialect);
    let mut select = Vec::new();
    let mut conditions = Vec::new();
    let mut keys = Vec::new();

    if let Some(dimension) = spec.dimension.as_deref() {
        let expr = group_expr(dialect, dimension, &mut conditions);
        select.push(format!("{} AS {}", expr, BUCKET_ALIAS));
        keys.push(BUCKET_ALIAS);
    }
    if let Some(series) = spec.active_series() {
        let expr = group_expr(dialect, series, &mut conditions);
        select.push(format!("{} AS {}", expr, SERIES_ALIAS));
        keys.push(SERIES_ALIAS);
    }

    let aggregate = aggregate_expr(dialect, spec);
    select.push(format!("{} AS {}", aggregate, VALUE_ALIAS));

    for filter in &spec.filters {
        let predicate = Predicate::plan(filter);
        conditions.push(filter_condition(dialect, &mut binder, &predicate));
    }

    let mut text = format!("SELECT {}\nFROM {}", select.join(", "), dialect.table_ref(table));
    if !conditions.is_empty() {
        text.push_str(&format!("\nWHERE {}", conditions.join("\n  AND ")));
    }
    if !keys.is_empty() {
        text.push_str(&format!("\nGROUP BY {}", keys.join(", ")));
    }
    if dialect.excludes_zero_sums() && spec.aggregation == AggregationType::Sum {
        text.push_str(&format!("\nHAVING {} != 0", aggregate));
    }
    if !keys.is_empty() {
        text.push_str(&format!("\nORDER BY {}", keys.join(", ")));
    }
    if let Some(limit) = dialect.row_limit() {
        text.push_str(&format!("\nLIMIT {}", limit));
    }

    SqlStatement {
        text,
        params: binder.params,
    }
}

/// Grouping expression; date-like columns are month-bucketed and rows
/// whose date does not parse are excluded
fn group_expr(dialect: &dyn Dialect, column: &str, conditions: &mut Vec<String>) -> String {
    let quoted = dialect.quote_ident(column);
    if heuristics::looks_like_date_column(column) {
        let bucket = dialect.month_bucket(&quoted);
        conditions.push(format!("{} IS NOT NULL", bucket));
        bucket
    } else {
        quoted
    }
}

fn aggregate_expr(dialect: &dyn Dialect, spec: &DataQuerySpec) -> String {
    let measure = spec.measure.as_deref().unwrap_or_default();
    match spec.aggregation {
        AggregationType::Count => "COUNT(*)".to_string(),
        agg => format!(
            "{}(COALESCE({}, 0))",
            agg.sql_function(),
            dialect.to_number(&dialect.quote_ident(measure))
        ),
    }
}

fn filter_condition(dialect: &dyn Dialect, binder: &mut Binder<'_>, predicate: &Predicate) -> String {
    let column = dialect.quote_ident(predicate.column());
    match predicate {
        Predicate::TextEquals { value, .. } => {
            let ph = binder.bind(SqlParam::Text(value.clone()));
            format!("{} = {}", dialect.lower_text(&column), ph)
        }
        Predicate::OneOf { values, .. } => {
            let phs = binder.bind_list(values);
            dialect.in_list(&dialect.lower_text(&column), &phs)
        }
        Predicate::Contains { needle, .. } => {
            let ph = binder.bind(SqlParam::Text(escape_like(needle)));
            dialect.contains(&dialect.lower_text(&column), &ph)
        }
        Predicate::Number { op, value, .. } => {
            let ph = binder.bind(SqlParam::Number(*value));
            format!("{} {} {}", dialect.to_number(&column), op, ph)
        }
        Predicate::Date { op, date, .. } => {
            let ph = binder.bind(SqlParam::Date(*date));
            format!("{} {} {}", dialect.day_value(&column), op, ph)
        }
        Predicate::Never { .. } => "1 = 0".to_string(),
    }
}

/// Escape `LIKE` wildcards with backslashes
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Standard single-quoted string literal (quotes doubled)
pub fn quote_string(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, FilterOp};

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_display_handles_multi_digit_placeholders() {
        let values: Vec<String> = (0..11).map(|i| format!("v{}", i)).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let spec = DataQuerySpec::count().filter(Filter::one_of("Code", &refs));

        let stmt = build_select(&SqliteDialect, &spec, "t");
        assert_eq!(stmt.params.len(), 11);
        let shown = stmt.display();
        assert!(shown.contains("'v0'"));
        assert!(shown.contains("'v10'"));
        assert!(!shown.contains('?'));
    }

    #[test]
    fn test_no_dimension_has_no_grouping() {
        let stmt = build_select(&SqliteDialect, &DataQuerySpec::count(), "t");
        assert!(!stmt.text.contains("GROUP BY"));
        assert!(!stmt.text.contains("ORDER BY"));
        assert!(stmt.text.starts_with("SELECT COUNT(*) AS metric_value"));
    }

    #[test]
    fn test_series_only_when_multi_series() {
        let mut spec = DataQuerySpec::sum("Sales").group_by("Region");
        spec.series_dimension = Some("State".into());
        let single = build_select(&SqliteDialect, &spec, "t");
        assert!(!single.text.contains(SERIES_ALIAS));

        let multi = build_select(&SqliteDialect, &spec.split_by("State"), "t");
        assert!(multi.text.contains("GROUP BY bucket_key, series_key"));
        assert!(multi.text.contains("ORDER BY bucket_key, series_key"));
    }

    #[test]
    fn test_never_predicate() {
        let spec = DataQuerySpec::count().filter(Filter::compare("Sales", FilterOp::Gt, "many"));
        let stmt = build_select(&SqliteDialect, &spec, "t");
        assert!(stmt.text.contains("WHERE 1 = 0"));
        assert!(stmt.params.is_empty());
    }
}
