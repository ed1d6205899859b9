//! Embedded-SQL Adapter
//!
//! Loads a delimited file into an in-memory SQLite table and runs one
//! parameterised aggregate statement against it.
//!
//! Every column is `TEXT` and empty cells are `NULL`. Two scalar functions
//! are registered on the connection so SQLite reads cells exactly like the
//! in-memory engine:
//!
//! - `DATE_FORMAT(value, fmt)`: date normalizer, NULL when unparsable
//! - `TO_NUMBER(value)`: float parse, NULL when unparsable
//!
//! # Fallback
//!
//! When enabled, any failure (missing or corrupt file, bad column, SQL
//! error) returns a single `Sample` bucket holding the number of rows
//! loaded (0 if none) with `degraded` set, instead of an error.

use super::{keyed_row, AdapterOutput, AggregateRow, SourceAdapter, SAMPLE_BUCKET};
use crate::dates;
use crate::error::{ChartError, EngineResult, NotFound};
use crate::query::DataQuerySpec;
use crate::source::{FileSource, SourceKind};
use crate::sql::sqlite::TABLE_NAME;
use crate::sql::{build_select, Dialect, SqlParam, SqlStatement, SqliteDialect, BUCKET_ALIAS, SERIES_ALIAS, VALUE_ALIAS};
use crate::value::Value;
use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, warn};

/// Runs specs against a file through SQLite
#[derive(Debug, Clone)]
pub struct EmbeddedSqlAdapter {
    delimiter: u8,
    fallback: bool,
}

impl Default for EmbeddedSqlAdapter {
    fn default() -> Self {
        Self::new(b',', true)
    }
}

impl EmbeddedSqlAdapter {
    pub fn new(delimiter: u8, fallback: bool) -> Self {
        Self { delimiter, fallback }
    }

    /// The statement run for a spec
    pub fn plan(&self, spec: &DataQuerySpec) -> SqlStatement {
        build_select(&SqliteDialect, spec, TABLE_NAME)
    }

    fn delimiter_for(&self, source: &FileSource) -> u8 {
        source.delimiter.map(super::delimiter_byte).unwrap_or(self.delimiter)
    }

    /// Load, query, and degrade on failure when configured to
    fn run_blocking(&self, spec: &DataQuerySpec, source: &FileSource) -> EngineResult<AdapterOutput> {
        let source_id = format!("{}:{}", SourceKind::EmbeddedSql, source.path.display());
        let statement = self.plan(spec);
        let mut loaded = 0;

        match query_file(spec, &source.path, self.delimiter_for(source), &statement, &mut loaded) {
            Ok(rows) => {
                debug!(source = %source_id, loaded, groups = rows.len(), "Embedded query finished");
                Ok(AdapterOutput::aggregated(spec, rows).with_statement(statement))
            }
            Err(err) if self.fallback => {
                warn!(source = %source_id, loaded, error = %err, "Embedded query failed, returning sample count");
                Ok(AdapterOutput {
                    rows: vec![AggregateRow::new(SAMPLE_BUCKET, None, loaded as f64)],
                    date_bucketed: false,
                    statement: Some(statement),
                    degraded: true,
                })
            }
            Err(EmbeddedError::Missing) => Err(NotFound::FileMissing {
                path: source.path.clone(),
            }
            .into()),
            Err(err) => Err(ChartError::execution(source_id, err).with_sql(statement.display())),
        }
    }
}

/// Failures inside the blocking task
#[derive(Debug, thiserror::Error)]
enum EmbeddedError {
    #[error("source file does not exist")]
    Missing,

    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

fn query_file(
    spec: &DataQuerySpec,
    path: &Path,
    delimiter: u8,
    statement: &SqlStatement,
    loaded: &mut usize,
) -> Result<Vec<AggregateRow>, EmbeddedError> {
    if !path.exists() {
        return Err(EmbeddedError::Missing);
    }

    let mut conn = Connection::open_in_memory()?;
    register_functions(&conn)?;
    let headers = load_csv(&mut conn, path, delimiter, loaded)?;
    check_columns(spec, &headers)?;
    run_statement(&conn, spec, statement)
}

/// SQLite reads an unknown double-quoted name as a string literal
fn check_columns(spec: &DataQuerySpec, headers: &[String]) -> Result<(), EmbeddedError> {
    let referenced = spec
        .measure
        .iter()
        .chain(spec.dimension.iter())
        .map(String::as_str)
        .chain(spec.active_series())
        .chain(spec.filters.iter().map(|f| f.column.as_str()));

    for column in referenced {
        if !headers.iter().any(|h| h == column) {
            return Err(EmbeddedError::UnknownColumn(column.to_string()));
        }
    }
    Ok(())
}

/// Create the table and insert every record in one transaction
///
/// Returns the header names; `loaded` counts inserted records.
fn load_csv(
    conn: &mut Connection,
    path: &Path,
    delimiter: u8,
    loaded: &mut usize,
) -> Result<Vec<String>, EmbeddedError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns: Vec<String> = headers
        .iter()
        .map(|h| format!("{} TEXT", SqliteDialect.quote_ident(h)))
        .collect();
    conn.execute(
        &format!("CREATE TABLE {} ({})", SqliteDialect.quote_ident(TABLE_NAME), columns.join(", ")),
        [],
    )?;

    let placeholders: Vec<String> = (1..=headers.len()).map(|i| format!("?{}", i)).collect();
    let insert = format!(
        "INSERT INTO {} VALUES ({})",
        SqliteDialect.quote_ident(TABLE_NAME),
        placeholders.join(", ")
    );

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&insert)?;
        for record in reader.records() {
            let record = record?;
            let cells = (0..headers.len()).map(|idx| {
                record
                    .get(idx)
                    .filter(|cell| !cell.trim().is_empty())
                    .map(str::to_string)
            });
            stmt.execute(rusqlite::params_from_iter(cells))?;
            *loaded += 1;
        }
    }
    tx.commit()?;
    Ok(headers)
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("DATE_FORMAT", 2, flags, |ctx| {
        let fmt: String = ctx.get(1)?;
        let cell = cell_value(ctx.get_raw(0));
        Ok(dates::normalize(&cell).map(|d| d.format(&fmt)))
    })?;

    conn.create_scalar_function("TO_NUMBER", 1, flags, |ctx| {
        Ok(cell_value(ctx.get_raw(0)).as_f64())
    })?;

    Ok(())
}

fn cell_value(raw: ValueRef<'_>) -> Value {
    match raw {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::Number(i as f64),
        ValueRef::Real(f) => Value::Number(f),
        ValueRef::Text(bytes) => Value::from_cell(&String::from_utf8_lossy(bytes)),
    }
}

fn bind_value(param: &SqlParam) -> SqlValue {
    match param {
        SqlParam::Text(s) => SqlValue::Text(s.clone()),
        SqlParam::Number(n) => SqlValue::Real(*n),
        SqlParam::Date(date) => SqlValue::Text(date.day_key()),
        // SQLite binds one placeholder per element
        SqlParam::TextList(_) => SqlValue::Null,
    }
}

fn run_statement(
    conn: &Connection,
    spec: &DataQuerySpec,
    statement: &SqlStatement,
) -> Result<Vec<AggregateRow>, EmbeddedError> {
    let mut stmt = conn.prepare(&statement.text)?;
    let params: Vec<SqlValue> = statement.params.iter().map(|p| bind_value(&p.value)).collect();
    let has_bucket = spec.dimension.is_some();
    let has_series = spec.active_series().is_some();

    let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
        let bucket: Option<String> = if has_bucket { row.get(BUCKET_ALIAS)? } else { None };
        let series: Option<String> = if has_series { row.get(SERIES_ALIAS)? } else { None };
        let value: Option<f64> = row.get(VALUE_ALIAS)?;
        Ok(keyed_row(spec, bucket, series, value))
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[async_trait]
impl SourceAdapter for EmbeddedSqlAdapter {
    type Source = FileSource;

    fn kind(&self) -> SourceKind {
        SourceKind::EmbeddedSql
    }

    fn describe(&self, spec: &DataQuerySpec, _source: &FileSource) -> String {
        self.plan(spec).display()
    }

    async fn execute(&self, spec: &DataQuerySpec, source: &FileSource) -> EngineResult<AdapterOutput> {
        let source_id = format!("{}:{}", self.kind(), source.path.display());
        let adapter = self.clone();
        let task_spec = spec.clone();
        let task_source = source.clone();

        tokio::task::spawn_blocking(move || adapter.run_blocking(&task_spec, &task_source))
            .await
            .map_err(|e| ChartError::execution(source_id, e))?
    }
}
