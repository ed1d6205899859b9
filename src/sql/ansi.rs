//! Generic ANSI spelling
//!
//! Only used to show what an aggregation *means* for sources that execute
//! no SQL (in-memory rows). Never executed.

use super::{build_select, quote_string, Dialect, SqlParam};
use crate::query::DataQuerySpec;
use crate::value::format_number;

/// Portable, display-only dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn table_ref(&self, table: &str) -> String {
        self.quote_ident(table)
    }

    fn placeholder(&self, index: usize) -> (String, String) {
        let n = index + 1;
        (n.to_string(), format!("${}", n))
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
            SqlParam::Date(date) => format!("DATE {}", quote_string(&date.day_key())),
        }
    }

    fn month_bucket(&self, column: &str) -> String {
        format!("DATE_FORMAT({}, '%Y-%m')", column)
    }

    fn day_value(&self, column: &str) -> String {
        format!("CAST({} AS DATE)", column)
    }

    fn to_number(&self, column: &str) -> String {
        format!("CAST({} AS NUMERIC)", column)
    }

    fn lower_text(&self, column: &str) -> String {
        format!("LOWER({})", column)
    }

    fn contains(&self, lhs: &str, needle: &str) -> String {
        format!("{} LIKE '%' || {} || '%'", lhs, needle)
    }

    fn expands_lists(&self) -> bool {
        true
    }

    fn in_list(&self, lhs: &str, placeholders: &[String]) -> String {
        format!("{} IN ({})", lhs, placeholders.join(", "))
    }
}

/// Human-readable statement equivalent to an in-memory aggregation
pub fn describe(spec: &DataQuerySpec, table: &str) -> String {
    build_select(&AnsiDialect, spec, table).display()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;

    #[test]
    fn test_describe_inlines_literals() {
        let spec = DataQuerySpec::sum("Sales")
            .group_by("OrderDate")
            .split_by("State")
            .filter(Filter::one_of("State", &["Kentucky", "California"]));

        let sql = describe(&spec, "orders");
        assert_eq!(
            sql,
            "SELECT DATE_FORMAT(\"OrderDate\", '%Y-%m') AS bucket_key, \"State\" AS series_key, \
SUM(COALESCE(CAST(\"Sales\" AS NUMERIC), 0)) AS metric_value\n\
FROM \"orders\"\n\
WHERE DATE_FORMAT(\"OrderDate\", '%Y-%m') IS NOT NULL\n  \
AND LOWER(\"State\") IN ('kentucky', 'california')\n\
GROUP BY bucket_key, series_key\n\
ORDER BY bucket_key, series_key"
        );
    }

    #[test]
    fn test_describe_count_total() {
        assert_eq!(
            describe(&DataQuerySpec::count(), "orders"),
            "SELECT COUNT(*) AS metric_value\nFROM \"orders\""
        );
    }
}
