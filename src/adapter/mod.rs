//! Source Adapters
//!
//! One adapter per [`SourceKind`], all producing the same
//! [`AdapterOutput`] so the shaper never knows which backend ran:
//!
//! - **memory**: filters and aggregates materialized rows in Rust
//! - **embedded**: loads a delimited file into in-memory SQLite
//! - **warehouse**: runs one parameterised BigQuery statement over REST
//!
//! Shared grouping rules:
//!
//! - a dimension or series column whose name looks like a date is
//!   month-bucketed (`YYYY-MM`); rows whose date does not parse drop out
//! - without a dimension the whole filtered set is one [`TOTAL_BUCKET`]
//! - blank group values land in [`BLANK_BUCKET`]

pub mod embedded;
pub mod memory;
pub mod warehouse;

pub use embedded::EmbeddedSqlAdapter;
pub use memory::{InMemoryAdapter, RowSet};
pub use warehouse::{BigQueryClient, WarehouseAdapter, WarehouseClient, WarehouseError};

use crate::config::Config;
use crate::dates;
use crate::error::EngineResult;
use crate::heuristics;
use crate::query::DataQuerySpec;
use crate::source::{SourceDescriptor, SourceKind};
use crate::sql::SqlStatement;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;

/// Group key when the spec has no dimension
pub const TOTAL_BUCKET: &str = "Total";
/// Group key for null or empty values
pub const BLANK_BUCKET: &str = "(blank)";
/// Group key of the degraded embedded result
pub const SAMPLE_BUCKET: &str = "Sample";

/// One aggregated bucket
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub group: String,
    /// Present only for multi-series specs
    pub series: Option<String>,
    pub value: f64,
}

impl AggregateRow {
    pub fn new(group: impl Into<String>, series: Option<String>, value: f64) -> Self {
        Self {
            group: group.into(),
            series,
            value,
        }
    }
}

/// What every adapter hands to the shaper
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    pub rows: Vec<AggregateRow>,
    /// Group keys are `YYYY-MM` month buckets
    pub date_bucketed: bool,
    /// Statement actually executed (SQL adapters)
    pub statement: Option<SqlStatement>,
    /// The embedded fallback result was returned instead of a real aggregation
    pub degraded: bool,
}

impl AdapterOutput {
    /// Output of a successful aggregation
    pub fn aggregated(spec: &DataQuerySpec, rows: Vec<AggregateRow>) -> Self {
        Self {
            rows,
            date_bucketed: is_date_bucketed(spec),
            statement: None,
            degraded: false,
        }
    }

    /// Attach the executed statement
    pub fn with_statement(mut self, statement: SqlStatement) -> Self {
        self.statement = Some(statement);
        self
    }
}

/// Common adapter contract
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Descriptor payload this adapter reads
    type Source: Send + Sync;

    /// Dispatch tag
    fn kind(&self) -> SourceKind;

    /// Human-readable SQL for the spec, without executing anything
    fn describe(&self, spec: &DataQuerySpec, source: &Self::Source) -> String;

    /// Run the aggregation
    async fn execute(&self, spec: &DataQuerySpec, source: &Self::Source) -> EngineResult<AdapterOutput>;
}

/// The three adapters, selected by a match on the descriptor
#[derive(Clone)]
pub struct Adapters {
    pub memory: InMemoryAdapter,
    pub embedded: EmbeddedSqlAdapter,
    pub warehouse: WarehouseAdapter,
}

impl Adapters {
    pub fn new(memory: InMemoryAdapter, embedded: EmbeddedSqlAdapter, warehouse: WarehouseAdapter) -> Self {
        Self {
            memory,
            embedded,
            warehouse,
        }
    }

    /// Build all adapters from configuration
    pub fn from_config(config: &Config) -> Result<Self, WarehouseError> {
        let delimiter = delimiter_byte(config.engine.csv_delimiter);
        let client = BigQueryClient::new(&config.warehouse.base_url, config.warehouse.request_timeout_ms)?;

        Ok(Self {
            memory: InMemoryAdapter::new(delimiter),
            embedded: EmbeddedSqlAdapter::new(delimiter, config.engine.embedded_fallback),
            warehouse: WarehouseAdapter::new(Arc::new(client), config.warehouse.row_limit),
        })
    }

    /// Run the adapter matching the descriptor
    pub async fn execute(&self, spec: &DataQuerySpec, source: &SourceDescriptor) -> EngineResult<AdapterOutput> {
        match source {
            SourceDescriptor::InMemoryRows(src) => self.memory.execute(spec, src).await,
            SourceDescriptor::EmbeddedSql(src) => self.embedded.execute(spec, src).await,
            SourceDescriptor::WarehouseSql(src) => self.warehouse.execute(spec, src).await,
        }
    }

    /// SQL the matching adapter would run, or the reconstruction for rows
    pub fn describe(&self, spec: &DataQuerySpec, source: &SourceDescriptor) -> String {
        match source {
            SourceDescriptor::InMemoryRows(src) => self.memory.describe(spec, src),
            SourceDescriptor::EmbeddedSql(src) => self.embedded.describe(spec, src),
            SourceDescriptor::WarehouseSql(src) => self.warehouse.describe(spec, src),
        }
    }
}

/// Whether the label axis holds month buckets
pub fn is_date_bucketed(spec: &DataQuerySpec) -> bool {
    spec.dimension
        .as_deref()
        .map(heuristics::looks_like_date_column)
        .unwrap_or(false)
}

/// Group key of one cell; `None` drops the row (unparsable date)
pub(crate) fn cell_key(column: &str, cell: &Value) -> Option<String> {
    if heuristics::looks_like_date_column(column) {
        return dates::month_bucket(cell);
    }
    if cell.is_blank() {
        Some(BLANK_BUCKET.to_string())
    } else {
        Some(cell.as_text().into_owned())
    }
}

/// Build a row from SQL result keys, applying the shared key rules
pub(crate) fn keyed_row(
    spec: &DataQuerySpec,
    bucket: Option<String>,
    series: Option<String>,
    value: Option<f64>,
) -> AggregateRow {
    let group = match spec.dimension {
        Some(_) => non_blank(bucket),
        None => TOTAL_BUCKET.to_string(),
    };
    let series = spec.active_series().map(|_| non_blank(series));
    AggregateRow::new(group, series, value.unwrap_or(0.0))
}

fn non_blank(key: Option<String>) -> String {
    key.filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| BLANK_BUCKET.to_string())
}

/// Single-byte CSV delimiter, `,` for anything else
pub(crate) fn delimiter_byte(c: char) -> u8 {
    if c.is_ascii() {
        c as u8
    } else {
        b','
    }
}
