//! Source descriptors
//!
//! Where and how a dataset is reached. Loaded read-only by the
//! persistence layer and never mutated during a query.
//!
//! ```text
//! {"kind": "in-memory-rows", "name": "orders", "path": "orders.csv"}
//! {"kind": "embedded-sql", "path": "orders.csv"}
//! {"kind": "warehouse-sql", "project": "acme", "dataset": "sales", "table": "orders",
//!  "credentials": {"access_token": "..."}}
//! ```

use crate::value::Row;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backend kind, the dispatch tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    InMemoryRows,
    EmbeddedSql,
    WarehouseSql,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemoryRows => write!(f, "in-memory-rows"),
            Self::EmbeddedSql => write!(f, "embedded-sql"),
            Self::WarehouseSql => write!(f, "warehouse-sql"),
        }
    }
}

/// Identification of one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SourceDescriptor {
    InMemoryRows(RowsSource),
    EmbeddedSql(FileSource),
    WarehouseSql(WarehouseTable),
}

impl SourceDescriptor {
    /// The dispatch tag
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::InMemoryRows(_) => SourceKind::InMemoryRows,
            Self::EmbeddedSql(_) => SourceKind::EmbeddedSql,
            Self::WarehouseSql(_) => SourceKind::WarehouseSql,
        }
    }

    /// Stable `kind:location` identifier for errors and logs
    pub fn source_id(&self) -> String {
        match self {
            Self::InMemoryRows(src) => format!("{}:{}", self.kind(), src.label()),
            Self::EmbeddedSql(src) => format!("{}:{}", self.kind(), src.path.display()),
            Self::WarehouseSql(src) => format!("{}:{}", self.kind(), src.qualified_name()),
        }
    }
}

/// Materialized rows: inline, or a delimited file read into memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowsSource {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl RowsSource {
    /// Inline rows
    pub fn inline(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: Some(name.into()),
            path: None,
            rows,
        }
    }

    /// Rows read from a delimited file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            path: Some(path.into()),
            rows: Vec::new(),
        }
    }

    /// Name, falling back to the file stem
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "rows".to_string())
    }
}

/// A delimited file queried through the embedded SQL engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub path: PathBuf,
    #[serde(default)]
    pub delimiter: Option<char>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: None,
        }
    }
}

/// A warehouse table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseTable {
    pub project: String,
    pub dataset: String,
    pub table: String,
    #[serde(default)]
    pub credentials: Credentials,
}

impl WarehouseTable {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
            credentials: Credentials::default(),
        }
    }

    /// `project.dataset.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Opaque credential blob; never printed
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub serde_json::Value);

impl Credentials {
    /// Bearer token: a bare string, or an `access_token` / `token` field
    pub fn bearer_token(&self) -> Option<&str> {
        match &self.0 {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.as_str()),
            serde_json::Value::Object(map) => ["access_token", "token"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_null() {
            write!(f, "Credentials(none)")
        } else {
            write!(f, "Credentials(<redacted>)")
        }
    }
}
