//! Warehouse-SQL Adapter
//!
//! Checks that the dataset and then the table exist, then runs one
//! BigQuery statement. A missing dataset and a missing table surface as
//! distinct [`NotFound`] variants before any query is sent.

mod client;

pub use client::{BigQueryClient, QueryRows, WarehouseClient, WarehouseError};

use super::{keyed_row, AdapterOutput, AggregateRow, SourceAdapter};
use crate::error::{ChartError, EngineResult, NotFound};
use crate::query::DataQuerySpec;
use crate::source::{SourceKind, WarehouseTable};
use crate::sql::{build_select, BigQueryDialect, SqlStatement, BUCKET_ALIAS, SERIES_ALIAS, VALUE_ALIAS};
use crate::value::parse_number;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs specs against a warehouse table
#[derive(Clone)]
pub struct WarehouseAdapter {
    client: Arc<dyn WarehouseClient>,
    dialect: BigQueryDialect,
}

impl WarehouseAdapter {
    pub fn new(client: Arc<dyn WarehouseClient>, row_limit: usize) -> Self {
        Self {
            client,
            dialect: BigQueryDialect::new(row_limit),
        }
    }

    /// The statement run for a spec
    pub fn plan(&self, spec: &DataQuerySpec, table: &WarehouseTable) -> SqlStatement {
        build_select(&self.dialect, spec, &table.qualified_name())
    }

    /// Fail fast when the dataset or table is missing
    async fn ensure_exists(&self, table: &WarehouseTable, source_id: &str) -> EngineResult<()> {
        let dataset_exists = self
            .client
            .dataset_exists(table)
            .await
            .map_err(|e| ChartError::execution(source_id, e))?;
        if !dataset_exists {
            return Err(NotFound::DatasetMissing {
                project: table.project.clone(),
                dataset: table.dataset.clone(),
            }
            .into());
        }

        let table_exists = self
            .client
            .table_exists(table)
            .await
            .map_err(|e| ChartError::execution(source_id, e))?;
        if !table_exists {
            return Err(NotFound::TableMissing {
                project: table.project.clone(),
                dataset: table.dataset.clone(),
                table: table.table.clone(),
            }
            .into());
        }

        Ok(())
    }
}

impl std::fmt::Debug for WarehouseAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseAdapter")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

/// Map result columns by alias
fn collect_rows(spec: &DataQuerySpec, result: &QueryRows) -> Result<Vec<AggregateRow>, String> {
    let value_idx = result
        .column_index(VALUE_ALIAS)
        .ok_or_else(|| format!("result has no `{}` column", VALUE_ALIAS))?;
    let bucket_idx = result.column_index(BUCKET_ALIAS);
    let series_idx = result.column_index(SERIES_ALIAS);

    let cell = |row: &[Option<String>], idx: Option<usize>| idx.and_then(|i| row.get(i).cloned().flatten());

    Ok(result
        .rows
        .iter()
        .map(|row| {
            let value = cell(row, Some(value_idx)).as_deref().and_then(parse_number);
            keyed_row(spec, cell(row, bucket_idx), cell(row, series_idx), value)
        })
        .collect())
}

#[async_trait]
impl SourceAdapter for WarehouseAdapter {
    type Source = WarehouseTable;

    fn kind(&self) -> SourceKind {
        SourceKind::WarehouseSql
    }

    fn describe(&self, spec: &DataQuerySpec, source: &WarehouseTable) -> String {
        self.plan(spec, source).display()
    }

    async fn execute(&self, spec: &DataQuerySpec, source: &WarehouseTable) -> EngineResult<AdapterOutput> {
        let source_id = format!("{}:{}", self.kind(), source.qualified_name());
        self.ensure_exists(source, &source_id).await?;

        let statement = self.plan(spec, source);
        info!(source = %source_id, params = statement.params.len(), "Running warehouse query");

        let result = self
            .client
            .run_query(source, &statement)
            .await
            .map_err(|e| ChartError::execution(&source_id, e).with_sql(statement.display()))?;

        let rows = collect_rows(spec, &result)
            .map_err(|e| ChartError::execution(&source_id, e).with_sql(statement.display()))?;
        debug!(source = %source_id, groups = rows.len(), "Warehouse query finished");

        Ok(AdapterOutput::aggregated(spec, rows).with_statement(statement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use std::sync::Mutex;

    /// In-process stand-in for the REST client
    #[derive(Default)]
    struct FakeWarehouse {
        datasets: Vec<String>,
        tables: Vec<String>,
        result: QueryRows,
        executed: Mutex<Vec<SqlStatement>>,
    }

    #[async_trait]
    impl WarehouseClient for FakeWarehouse {
        async fn dataset_exists(&self, table: &WarehouseTable) -> Result<bool, WarehouseError> {
            Ok(self.datasets.contains(&table.dataset))
        }

        async fn table_exists(&self, table: &WarehouseTable) -> Result<bool, WarehouseError> {
            Ok(self.tables.contains(&table.table))
        }

        async fn run_query(&self, _table: &WarehouseTable, statement: &SqlStatement) -> Result<QueryRows, WarehouseError> {
            self.executed.lock().unwrap().push(statement.clone());
            Ok(self.result.clone())
        }
    }

    fn grid(columns: &[&str], rows: &[&[Option<&str>]]) -> QueryRows {
        QueryRows {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.map(str::to_string)).collect())
                .collect(),
        }
    }

    fn orders() -> WarehouseTable {
        WarehouseTable::new("acme", "sales", "orders")
    }

    #[tokio::test]
    async fn test_missing_dataset_and_table_are_distinct() {
        let no_dataset = WarehouseAdapter::new(Arc::new(FakeWarehouse::default()), 1000);
        let err = no_dataset.execute(&DataQuerySpec::count(), &orders()).await.unwrap_err();
        assert!(matches!(err, ChartError::NotFound(NotFound::DatasetMissing { .. })));

        let fake = FakeWarehouse {
            datasets: vec!["sales".into()],
            ..Default::default()
        };
        let no_table = WarehouseAdapter::new(Arc::new(fake), 1000);
        let err = no_table.execute(&DataQuerySpec::count(), &orders()).await.unwrap_err();
        assert!(matches!(err, ChartError::NotFound(NotFound::TableMissing { ref table, .. }) if table == "orders"));
    }

    #[tokio::test]
    async fn test_rows_are_keyed_by_alias() {
        let fake = Arc::new(FakeWarehouse {
            datasets: vec!["sales".into()],
            tables: vec!["orders".into()],
            result: grid(
                &["bucket_key", "series_key", "metric_value"],
                &[
                    &[Some("2016-01"), Some("Kentucky"), Some("100")],
                    &[Some("2016-01"), None, Some("7.5")],
                ],
            ),
            ..Default::default()
        });
        let adapter = WarehouseAdapter::new(fake.clone(), 250);
        let spec = DataQuerySpec::sum("Sales")
            .group_by("OrderDate")
            .split_by("State")
            .filter(Filter::one_of("State", &["Kentucky"]));

        let out = adapter.execute(&spec, &orders()).await.unwrap();
        assert!(out.date_bucketed);
        assert_eq!(out.rows[0], AggregateRow::new("2016-01", Some("Kentucky".into()), 100.0));
        assert_eq!(out.rows[1], AggregateRow::new("2016-01", Some("(blank)".into()), 7.5));

        let executed = fake.executed.lock().unwrap();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].text.contains("FROM `acme.sales.orders`"));
        assert!(executed[0].text.contains("HAVING"));
        assert!(executed[0].text.ends_with("LIMIT 250"));
    }

    #[tokio::test]
    async fn test_missing_value_column_is_execution_error() {
        let fake = FakeWarehouse {
            datasets: vec!["sales".into()],
            tables: vec!["orders".into()],
            result: grid(&["something_else"], &[&[Some("1")]]),
            ..Default::default()
        };
        let adapter = WarehouseAdapter::new(Arc::new(fake), 1000);
        let err = adapter.execute(&DataQuerySpec::count(), &orders()).await.unwrap_err();
        assert_eq!(err.code(), "EXECUTION_ERROR");
        assert!(err.sql().unwrap().contains("COUNT(*)"));
    }
}
