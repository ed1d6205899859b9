//! # Chartwise
//!
//! Natural-language charting engine core: turns a structured chart intent
//! (as produced by a language model) into chart-ready data, against one of
//! three interchangeable backends.
//!
//! ## Features
//!
//! - **Validation**: untrusted intent JSON is repaired or rejected with the offending field named
//! - **Three backends**: materialized rows, SQLite over a CSV file, BigQuery over REST
//! - **Consistent semantics**: every backend shares one filter planner and one date normalizer
//! - **Chart-ready output**: dense `{labels, datasets}` with month labels and styling
//!
//! ## Modules
//!
//! - [`query`]: query contracts and the validator
//! - [`dates`]: date normalizer and month buckets
//! - [`sql`]: SQL dialect builders (SQLite, BigQuery, display-only ANSI)
//! - [`adapter`]: source adapters
//! - [`shaper`]: adapter rows → chart datasets
//! - [`pipeline`]: validate → execute → shape
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chartwise::{ChartPipeline, Config, RowsSource, SourceDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = ChartPipeline::from_config(&Config::default())?;
//!     let source = SourceDescriptor::InMemoryRows(RowsSource::file("orders.csv"));
//!
//!     let intent = serde_json::json!({
//!         "chartType": "line",
//!         "dataQuery": {
//!             "type": "sum", "measure": "Sales", "dimension": "OrderDate",
//!             "filters": [{"column": "State", "operator": "IN", "value": ["Kentucky", "California"]}]
//!         }
//!     });
//!
//!     let chart = pipeline
//!         .run_intent(&intent, Some("Kentucky vs California sales"), &source)
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&chart)?);
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod dates;
pub mod error;
pub mod heuristics;
pub mod pipeline;
pub mod query;
pub mod shaper;
pub mod source;
pub mod sql;
pub mod value;

// Re-export top-level types for convenience
pub use adapter::{
    AdapterOutput, Adapters, AggregateRow, BigQueryClient, EmbeddedSqlAdapter, InMemoryAdapter,
    SourceAdapter, WarehouseAdapter, WarehouseClient, WarehouseError,
};

pub use config::{Config, ConfigError, EngineConfig, LoggingConfig, WarehouseConfig};

pub use error::{ChartError, EngineResult, NotFound};

pub use pipeline::{ChartMeta, ChartPipeline, ChartResponse, PipelineError};

pub use query::{
    AggregationType, ChartIntent, ChartType, DataQuerySpec, Filter, FilterOp, FilterValue,
};

pub use shaper::{ChartDataset, ChartResult};

pub use source::{Credentials, FileSource, RowsSource, SourceDescriptor, SourceKind, WarehouseTable};

pub use sql::SqlStatement;

pub use value::{Row, Value};
