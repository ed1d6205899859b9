//! Warehouse SQL dialect (BigQuery standard SQL)
//!
//! Differences from the embedded dialect:
//! - identifiers are backtick-quoted only when they contain characters
//!   outside `[A-Za-z0-9_]` (or start with a digit)
//! - tables are fully qualified: `` `project.dataset.table` ``
//! - named parameters (`@p0`), `IN` lists bound as one `ARRAY<STRING>`
//! - `FORMAT_DATE('%Y-%m', DATE(col))` month buckets
//! - zero-valued sums are dropped with `HAVING`, results capped with `LIMIT`

use super::{Dialect, SqlParam};
use crate::value::format_number;

/// BigQuery spelling
#[derive(Debug, Clone, Copy)]
pub struct BigQueryDialect {
    pub row_limit: usize,
}

impl Default for BigQueryDialect {
    fn default() -> Self {
        Self { row_limit: 1000 }
    }
}

impl BigQueryDialect {
    pub fn new(row_limit: usize) -> Self {
        Self { row_limit }
    }
}

fn needs_quoting(ident: &str) -> bool {
    ident.is_empty()
        || ident.starts_with(|c: char| c.is_ascii_digit())
        || !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// BigQuery string literal (backslash escapes)
fn string_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl Dialect for BigQueryDialect {
    fn quote_ident(&self, ident: &str) -> String {
        if needs_quoting(ident) {
            format!("`{}`", ident.replace('`', "\\`"))
        } else {
            ident.to_string()
        }
    }

    fn table_ref(&self, table: &str) -> String {
        format!("`{}`", table.replace('`', "\\`"))
    }

    fn placeholder(&self, index: usize) -> (String, String) {
        let name = format!("p{}", index);
        let placeholder = format!("@{}", name);
        (name, placeholder)
    }

    fn literal(&self, param: &SqlParam) -> String {
        match param {
            SqlParam::Text(s) => string_literal(s),
            SqlParam::Number(n) => format_number(*n),
            SqlParam::TextList(values) => format!(
                "[{}]",
                values
                    .iter()
                    .map(|v| string_literal(v))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            SqlParam::Date(date) => format!("DATE '{}'", date.day_key()),
        }
    }

    fn month_bucket(&self, column: &str) -> String {
        format!("FORMAT_DATE('%Y-%m', DATE({}))", column)
    }

    fn day_value(&self, column: &str) -> String {
        format!("DATE({})", column)
    }

    fn to_number(&self, column: &str) -> String {
        format!("SAFE_CAST({} AS FLOAT64)", column)
    }

    fn lower_text(&self, column: &str) -> String {
        format!("LOWER(CAST({} AS STRING))", column)
    }

    fn contains(&self, lhs: &str, needle: &str) -> String {
        format!("{} LIKE CONCAT('%', {}, '%')", lhs, needle)
    }

    fn expands_lists(&self) -> bool {
        false
    }

    fn in_list(&self, lhs: &str, placeholders: &[String]) -> String {
        format!("{} IN UNNEST({})", lhs, placeholders.join(", "))
    }

    fn excludes_zero_sums(&self) -> bool {
        true
    }

    fn row_limit(&self) -> Option<usize> {
        Some(self.row_limit)
    }
}
