//! In-Memory Rows Adapter
//!
//! Filters and aggregates materialized rows without any SQL engine.
//! Rows come inline from the descriptor or from a delimited file read with
//! the `csv` crate (every cell `Text`, blank cells `Null`).

use super::{cell_key, AdapterOutput, AggregateRow, SourceAdapter, TOTAL_BUCKET};
use crate::error::{ChartError, EngineResult, NotFound};
use crate::query::{AggregationType, DataQuerySpec, Predicate};
use crate::source::{RowsSource, SourceKind};
use crate::sql::ansi;
use crate::value::{Row, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// A loaded table
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub name: String,
    /// Header order for files, sorted key union for inline rows
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    /// Wrap inline rows
    pub fn from_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect();
        columns.sort();
        columns.dedup();

        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Read a delimited stream with a header row
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R, delimiter: u8) -> csv::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Row = columns
                .iter()
                .enumerate()
                .map(|(idx, col)| (col.clone(), Value::from_cell(record.get(idx).unwrap_or(""))))
                .collect();
            rows.push(row);
        }

        Ok(Self {
            name: name.into(),
            columns,
            rows,
        })
    }

    /// Read a delimited file
    pub fn from_path(name: impl Into<String>, path: &Path, delimiter: u8) -> EngineResult<Self> {
        let name = name.into();
        if !path.exists() {
            return Err(NotFound::FileMissing {
                path: path.to_path_buf(),
            }
            .into());
        }
        let file = std::fs::File::open(path).map_err(|e| ChartError::execution(source_id(&name), e))?;
        Self::from_reader(name.clone(), file, delimiter).map_err(|e| ChartError::execution(source_id(&name), e))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn source_id(name: &str) -> String {
    format!("{}:{}", SourceKind::InMemoryRows, name)
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

/// Filter, group and aggregate a row set
///
/// Groups keep first-appearance order. A spec naming a column the set does
/// not have is an execution error; an empty set yields no groups.
pub fn aggregate(spec: &DataQuerySpec, set: &RowSet) -> EngineResult<Vec<AggregateRow>> {
    if !set.is_empty() {
        check_columns(spec, set)?;
    }

    let predicates: Vec<Predicate> = spec.filters.iter().map(Predicate::plan).collect();
    let dimension = spec.dimension.as_deref();
    let series = spec.active_series();

    let mut order: Vec<(String, Option<String>)> = Vec::new();
    let mut groups: HashMap<(String, Option<String>), Accumulator> = HashMap::new();

    for row in &set.rows {
        let passes = predicates
            .iter()
            .all(|p| p.matches(row.get(p.column()).unwrap_or(&Value::Null)));
        if !passes {
            continue;
        }

        let group = match dimension {
            Some(col) => match cell_key(col, row.get(col).unwrap_or(&Value::Null)) {
                Some(key) => key,
                None => continue,
            },
            None => TOTAL_BUCKET.to_string(),
        };
        let series_key = match series {
            Some(col) => match cell_key(col, row.get(col).unwrap_or(&Value::Null)) {
                Some(key) => Some(key),
                None => continue,
            },
            None => None,
        };

        let key = (group, series_key);
        let acc = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Accumulator::default()
        });
        acc.count += 1;
        if let Some(measure) = spec.measure.as_deref() {
            acc.sum += row.get(measure).and_then(Value::as_f64).unwrap_or(0.0);
        }
    }

    // An ungrouped aggregate always has one row, as in SQL
    if dimension.is_none() && series.is_none() && order.is_empty() {
        order.push((TOTAL_BUCKET.to_string(), None));
        groups.insert((TOTAL_BUCKET.to_string(), None), Accumulator::default());
    }

    Ok(order
        .into_iter()
        .map(|key| {
            let acc = &groups[&key];
            let value = match spec.aggregation {
                AggregationType::Count => acc.count as f64,
                AggregationType::Sum => acc.sum,
                AggregationType::Average if acc.count > 0 => acc.sum / acc.count as f64,
                AggregationType::Average => 0.0,
            };
            AggregateRow::new(key.0, key.1, value)
        })
        .collect())
}

fn check_columns(spec: &DataQuerySpec, set: &RowSet) -> EngineResult<()> {
    let referenced = spec
        .measure
        .iter()
        .chain(spec.dimension.iter())
        .map(String::as_str)
        .chain(spec.active_series())
        .chain(spec.filters.iter().map(|f| f.column.as_str()));

    for column in referenced {
        if !set.has_column(column) {
            return Err(ChartError::execution(
                source_id(&set.name),
                format!("unknown column `{}`", column),
            ));
        }
    }
    Ok(())
}

/// Aggregates inline or file-backed rows
#[derive(Debug, Clone)]
pub struct InMemoryAdapter {
    delimiter: u8,
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new(b',')
    }
}

impl InMemoryAdapter {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Materialize a descriptor's rows
    pub fn load(&self, source: &RowsSource) -> EngineResult<RowSet> {
        match &source.path {
            Some(path) => RowSet::from_path(source.label(), path, self.delimiter),
            None => Ok(RowSet::from_rows(source.label(), source.rows.clone())),
        }
    }
}

#[async_trait]
impl SourceAdapter for InMemoryAdapter {
    type Source = RowsSource;

    fn kind(&self) -> SourceKind {
        SourceKind::InMemoryRows
    }

    fn describe(&self, spec: &DataQuerySpec, source: &RowsSource) -> String {
        ansi::describe(spec, &source.label())
    }

    async fn execute(&self, spec: &DataQuerySpec, source: &RowsSource) -> EngineResult<AdapterOutput> {
        let id = source_id(&source.label());
        let adapter = self.clone();
        let task_spec = spec.clone();
        let task_source = source.clone();

        let rows = tokio::task::spawn_blocking(move || {
            let set = adapter.load(&task_source)?;
            debug!(source = %set.name, rows = set.len(), "Rows loaded");
            aggregate(&task_spec, &set)
        })
        .await
        .map_err(|e| ChartError::execution(id, e))??;

        Ok(AdapterOutput::aggregated(spec, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, FilterOp};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ORDERS: &str = "\
OrderDate,State,Sales,Region
15/01/2016,Kentucky,100,South
20/01/2016,California,200,West
03/02/2016,Kentucky,50,South
11/03/2016,California,30,West
12/03/2016,Texas,999,
not a date,Kentucky,7,South
";

    fn orders() -> RowSet {
        RowSet::from_reader("orders", ORDERS.as_bytes(), b',').unwrap()
    }

    fn find(rows: &[AggregateRow], group: &str, series: Option<&str>) -> Option<f64> {
        rows.iter()
            .find(|r| r.group == group && r.series.as_deref() == series)
            .map(|r| r.value)
    }

    #[test]
    fn test_sum_by_month_and_state() {
        let spec = DataQuerySpec::sum("Sales")
            .group_by("OrderDate")
            .split_by("State")
            .filter(Filter::one_of("State", &["kentucky", "CALIFORNIA"]));

        let rows = aggregate(&spec, &orders()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(find(&rows, "2016-01", Some("Kentucky")), Some(100.0));
        assert_eq!(find(&rows, "2016-01", Some("California")), Some(200.0));
        assert_eq!(find(&rows, "2016-02", Some("Kentucky")), Some(50.0));
        assert_eq!(find(&rows, "2016-03", Some("California")), Some(30.0));
    }

    #[test]
    fn test_groups_keep_first_appearance_order() {
        let rows = aggregate(&DataQuerySpec::count().group_by("State"), &orders()).unwrap();
        let groups: Vec<&str> = rows.iter().map(|r| r.group.as_str()).collect();
        assert_eq!(groups, ["Kentucky", "California", "Texas"]);
        assert_eq!(rows[0].value, 3.0);
    }

    #[test]
    fn test_blank_and_unparsable_keys() {
        let by_region = aggregate(&DataQuerySpec::sum("Sales").group_by("Region"), &orders()).unwrap();
        assert_eq!(find(&by_region, "(blank)", None), Some(999.0));

        // "not a date" drops out of the month grouping
        let by_month = aggregate(&DataQuerySpec::count().group_by("OrderDate"), &orders()).unwrap();
        let total: f64 = by_month.iter().map(|r| r.value).sum();
        assert_eq!(total, 5.0);
    }

    #[test]
    fn test_average_and_total() {
        let avg = aggregate(
            &DataQuerySpec::average("Sales").filter(Filter::eq("State", "kentucky")),
            &orders(),
        )
        .unwrap();
        assert_eq!(avg, vec![AggregateRow::new("Total", None, 157.0 / 3.0)]);

        let none = aggregate(
            &DataQuerySpec::count().filter(Filter::compare("Sales", FilterOp::Gt, 10_000.0)),
            &orders(),
        )
        .unwrap();
        assert_eq!(none, vec![AggregateRow::new("Total", None, 0.0)]);
    }

    #[test]
    fn test_unparsable_measure_sums_as_zero() {
        let set = RowSet::from_reader("t", "Region,Sales\nWest,10\nWest,n/a\n".as_bytes(), b',').unwrap();
        let rows = aggregate(&DataQuerySpec::average("Sales").group_by("Region"), &set).unwrap();
        assert_eq!(rows, vec![AggregateRow::new("West", None, 5.0)]);
    }

    #[test]
    fn test_unknown_column_is_execution_error() {
        let err = aggregate(&DataQuerySpec::sum("Revenue"), &orders()).unwrap_err();
        assert_eq!(err.code(), "EXECUTION_ERROR");
        assert!(err.to_string().contains("unknown column `Revenue`"));
    }

    #[test]
    fn test_inline_rows_mix_json_types() {
        let rows: Vec<Row> = serde_json::from_str(
            r#"[{"Region": "West", "Sales": 10}, {"Region": "West", "Sales": "2.5"}, {"Region": null, "Sales": 1}]"#,
        )
        .unwrap();
        let set = RowSet::from_rows("inline", rows);
        let out = aggregate(&DataQuerySpec::sum("Sales").group_by("Region"), &set).unwrap();
        assert_eq!(find(&out, "West", None), Some(12.5));
        assert_eq!(find(&out, "(blank)", None), Some(1.0));
    }

    #[tokio::test]
    async fn test_adapter_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(ORDERS.replace(',', ";").as_bytes()).unwrap();

        let adapter = InMemoryAdapter::new(b';');
        let out = adapter
            .execute(&DataQuerySpec::count().group_by("OrderDate"), &RowsSource::file(file.path()))
            .await
            .unwrap();
        assert!(out.date_bucketed);
        assert!(out.statement.is_none());
        assert_eq!(out.rows[0], AggregateRow::new("2016-01", None, 2.0));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let adapter = InMemoryAdapter::default();
        let err = adapter
            .execute(&DataQuerySpec::count(), &RowsSource::file("/nonexistent/orders.csv"))
            .await
            .unwrap_err();
        assert!(err.is_empty_outcome());
    }
}
