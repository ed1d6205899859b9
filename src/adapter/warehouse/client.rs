//! BigQuery REST client
//!
//! Three calls, all against the v2 REST API:
//!
//! - `GET  /projects/{p}/datasets/{d}`: dataset existence (404 = missing)
//! - `GET  /projects/{p}/datasets/{d}/tables/{t}`: table existence
//! - `POST /projects/{p}/queries`: synchronous standard-SQL query with
//!   named parameters

use crate::source::WarehouseTable;
use crate::sql::{SqlParam, SqlStatement};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result grid: column names plus string-or-null cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryRows {
    /// Index of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Transport to a warehouse
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Whether `project.dataset` exists
    async fn dataset_exists(&self, table: &WarehouseTable) -> Result<bool, WarehouseError>;

    /// Whether `project.dataset.table` exists
    async fn table_exists(&self, table: &WarehouseTable) -> Result<bool, WarehouseError>;

    /// Run a parameterised statement
    async fn run_query(&self, table: &WarehouseTable, statement: &SqlStatement) -> Result<QueryRows, WarehouseError>;
}

/// Warehouse transport errors
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Warehouse API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Warehouse unavailable")]
    Unavailable,

    #[error("Query did not complete within the request timeout")]
    Incomplete,
}

/// reqwest-backed BigQuery client
pub struct BigQueryClient {
    client: Client,
    base_url: String,
    request_timeout_ms: u64,
}

impl BigQueryClient {
    /// Create a client for an API root such as `https://bigquery.googleapis.com/bigquery/v2`
    pub fn new(base_url: &str, request_timeout_ms: u64) -> Result<Self, WarehouseError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout_ms,
        })
    }

    fn project_url(&self, project: &str) -> String {
        format!("{}/projects/{}", self.base_url, urlencoding::encode(project))
    }

    fn dataset_url(&self, table: &WarehouseTable) -> String {
        format!(
            "{}/datasets/{}",
            self.project_url(&table.project),
            urlencoding::encode(&table.dataset)
        )
    }

    fn authorize(&self, request: RequestBuilder, table: &WarehouseTable) -> RequestBuilder {
        match table.credentials.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn exists(&self, url: &str, table: &WarehouseTable) -> Result<bool, WarehouseError> {
        let response = self
            .authorize(self.client.get(url), table)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        match existence(status) {
            Some(found) => Ok(found),
            None => Err(WarehouseError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Existence answer of a metadata GET; `None` means the call itself failed
fn existence(status: StatusCode) -> Option<bool> {
    if status.is_success() {
        Some(true)
    } else if status == StatusCode::NOT_FOUND {
        Some(false)
    } else {
        None
    }
}

fn map_send_error(e: reqwest::Error) -> WarehouseError {
    if e.is_timeout() {
        WarehouseError::Timeout
    } else if e.is_connect() {
        WarehouseError::Unavailable
    } else {
        WarehouseError::Request(e)
    }
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    async fn dataset_exists(&self, table: &WarehouseTable) -> Result<bool, WarehouseError> {
        self.exists(&self.dataset_url(table), table).await
    }

    async fn table_exists(&self, table: &WarehouseTable) -> Result<bool, WarehouseError> {
        let url = format!("{}/tables/{}", self.dataset_url(table), urlencoding::encode(&table.table));
        self.exists(&url, table).await
    }

    async fn run_query(&self, table: &WarehouseTable, statement: &SqlStatement) -> Result<QueryRows, WarehouseError> {
        let url = format!("{}/queries", self.project_url(&table.project));
        let body = QueryRequest::new(statement, self.request_timeout_ms);

        let response = self
            .authorize(self.client.post(&url), table)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(WarehouseError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let result: QueryResponse = response.json().await?;
        result.into_rows()
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<QueryParameter>,
    timeout_ms: u64,
}

impl QueryRequest {
    fn new(statement: &SqlStatement, timeout_ms: u64) -> Self {
        Self {
            query: statement.text.clone(),
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: statement
                .params
                .iter()
                .map(|p| QueryParameter::new(&p.name, &p.value))
                .collect(),
            timeout_ms,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameter {
    name: String,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    array_type: Option<Box<ParameterType>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParameterValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    array_values: Option<Vec<ParameterValue>>,
}

impl ParameterValue {
    fn scalar(value: String) -> Self {
        Self {
            value: Some(value),
            array_values: None,
        }
    }
}

impl QueryParameter {
    fn new(name: &str, value: &SqlParam) -> Self {
        let scalar_type = |kind: &'static str| ParameterType {
            kind,
            array_type: None,
        };
        let (parameter_type, parameter_value) = match value {
            SqlParam::Text(s) => (scalar_type("STRING"), ParameterValue::scalar(s.clone())),
            SqlParam::Number(n) => (scalar_type("FLOAT64"), ParameterValue::scalar(n.to_string())),
            SqlParam::Date(date) => (scalar_type("DATE"), ParameterValue::scalar(date.day_key())),
            SqlParam::TextList(values) => (
                ParameterType {
                    kind: "ARRAY",
                    array_type: Some(Box::new(scalar_type("STRING"))),
                },
                ParameterValue {
                    value: None,
                    array_values: Some(values.iter().cloned().map(ParameterValue::scalar).collect()),
                },
            ),
        };

        Self {
            name: name.to_string(),
            parameter_type,
            parameter_value,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<Schema>,
    #[serde(default)]
    rows: Vec<ResponseRow>,
}

#[derive(Debug, Deserialize)]
struct Schema {
    #[serde(default)]
    fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct Field {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResponseRow {
    #[serde(default)]
    f: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    v: Option<serde_json::Value>,
}

impl QueryResponse {
    fn into_rows(self) -> Result<QueryRows, WarehouseError> {
        if !self.job_complete {
            return Err(WarehouseError::Incomplete);
        }

        let columns = self
            .schema
            .map(|s| s.fields.into_iter().map(|f| f.name).collect())
            .unwrap_or_default();
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.f
                    .into_iter()
                    .map(|cell| match cell.v {
                        Some(serde_json::Value::String(s)) => Some(s),
                        Some(serde_json::Value::Null) | None => None,
                        Some(other) => Some(other.to_string()),
                    })
                    .collect()
            })
            .collect();

        Ok(QueryRows { columns, rows })
    }
}
