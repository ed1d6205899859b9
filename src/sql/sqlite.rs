//! Embedded SQL dialect (SQLite)
//!
//! Relies on two scalar functions the embedded adapter registers on every
//! connection, both backed by the crate's own parsers so the embedded
//! engine and the in-memory engine read cells identically:
//!
//! - `DATE_FORMAT(value, fmt)`: normalizes `value` with the date
//!   normalizer and formats it (`'%Y-%m'` for buckets), NULL when unparsable
//! - `TO_NUMBER(value)`: trimmed float parse, NULL when unparsable

use super::{quote_string, Dialect, SqlParam};
use crate::value::format_number;

/// Table the delimited file is loaded into
pub const TABLE_NAME: &str = "dataset";

/// SQLite spelling
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn table_ref(&self, table: &str) -> String {
        self.quote_ident(table)
    }

    fn placeholder(&self, index: usize) -> (String, String) {
        let n = index + 1;
        (n.to_string(), format!("?{}", n))
    }

    fn literal(&self, param: &SqlParam) -> String {
        match param {
            SqlParam::Text(s) => quote_string(s),
            SqlParam::Number(n) => format_number(*n),
            SqlParam::TextList(values) => values
                .iter()
                .map(|v| quote_string(v))
                .collect::<Vec<_>>()
                .join(", "),
            SqlParam::Date(date) => quote_string(&date.day_key()),
        }
    }

    fn month_bucket(&self, column: &str) -> String {
        format!("DATE_FORMAT({}, '%Y-%m')", column)
    }

    fn day_value(&self, column: &str) -> String {
        format!("DATE_FORMAT({}, '%Y-%m-%d')", column)
    }

    fn to_number(&self, column: &str) -> String {
        format!("TO_NUMBER({})", column)
    }

    fn lower_text(&self, column: &str) -> String {
        format!("LOWER({})", column)
    }

    fn contains(&self, lhs: &str, needle: &str) -> String {
        format!("{} LIKE '%' || {} || '%' ESCAPE '\\'", lhs, needle)
    }

    fn expands_lists(&self) -> bool {
        true
    }

    fn in_list(&self, lhs: &str, placeholders: &[String]) -> String {
        format!("{} IN ({})", lhs, placeholders.join(", "))
    }
}
