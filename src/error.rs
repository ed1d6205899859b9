//! Engine error types
//!
//! The three failure classes callers handle:
//!
//! - `Validation`: the spec is malformed; raised before any adapter runs.
//! - `NotFound`: the source, dataset or table is missing, or the query
//!   produced no rows. Callers treat this as an empty outcome.
//! - `Execution`: a backend failed; carries the source identifier and the
//!   statement that was running.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the chart engine
#[derive(Error, Debug)]
pub enum ChartError {
    /// The query spec is missing or has an invalid field
    #[error("Validation error: `{field}` {message}")]
    Validation { field: String, message: String },

    /// Source, dataset or table missing, or no rows
    #[error("Not found: {0}")]
    NotFound(#[from] NotFound),

    /// Backend failure
    #[error("Execution error on {source_id}: {message}")]
    Execution {
        source_id: String,
        sql: Option<String>,
        message: String,
    },
}

/// What could not be found
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("dataset `{project}.{dataset}` does not exist")]
    DatasetMissing { project: String, dataset: String },

    #[error("table `{project}.{dataset}.{table}` does not exist")]
    TableMissing {
        project: String,
        dataset: String,
        table: String,
    },

    #[error("source file {path:?} does not exist")]
    FileMissing { path: PathBuf },

    #[error("query returned no rows from {source_id}")]
    NoRows { source_id: String },
}

impl ChartError {
    /// Validation failure for a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Execution failure without a statement
    pub fn execution(source_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Execution {
            source_id: source_id.into(),
            sql: None,
            message: message.to_string(),
        }
    }

    /// Attach the offending statement to an execution failure
    pub fn with_sql(self, statement: impl Into<String>) -> Self {
        match self {
            Self::Execution {
                source_id, message, ..
            } => Self::Execution {
                source_id,
                sql: Some(statement.into()),
                message,
            },
            other => other,
        }
    }

    /// Whether the caller should render an empty chart instead of an error
    pub fn is_empty_outcome(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Execution { .. } => "EXECUTION_ERROR",
        }
    }

    /// Offending statement, if any
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Execution { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, ChartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = ChartError::validation("measure", "is required for sum");
        assert_eq!(err.to_string(), "Validation error: `measure` is required for sum");
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(!err.is_empty_outcome());
    }

    #[test]
    fn test_not_found_variants_are_distinct() {
        let dataset = ChartError::from(NotFound::DatasetMissing {
            project: "p".into(),
            dataset: "d".into(),
        });
        let table = ChartError::from(NotFound::TableMissing {
            project: "p".into(),
            dataset: "d".into(),
            table: "t".into(),
        });
        assert!(dataset.is_empty_outcome());
        assert!(dataset.to_string().contains("dataset `p.d`"));
        assert!(table.to_string().contains("table `p.d.t`"));
    }

    #[test]
    fn test_with_sql_keeps_context() {
        let err = ChartError::execution("warehouse-sql:p.d.t", "boom").with_sql("SELECT 1");
        assert_eq!(err.sql(), Some("SELECT 1"));
        assert!(err.to_string().contains("warehouse-sql:p.d.t"));
    }
}
