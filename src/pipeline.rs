//! Chart Pipeline
//!
//! One request runs sequentially: validate the intent, execute one adapter
//! (bounded by the query timeout), shape the rows. Failures leave as a
//! [`PipelineError`] carrying the spec and source they happened on.
//!
//! ```text
//! raw JSON ──validate──▶ ChartIntent ──adapter──▶ AdapterOutput ──shape──▶ ChartResponse
//! ```

use crate::adapter::{Adapters, WarehouseError};
use crate::config::Config;
use crate::error::{ChartError, NotFound};
use crate::query::{self, ChartIntent, ChartType, DataQuerySpec};
use crate::shaper::{self, ChartResult};
use crate::source::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// A chart ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub chart_type: ChartType,
    pub title: String,
    pub data: ChartResult,
    /// Statement that produced the data, literals inlined
    pub sql: String,
    pub meta: ChartMeta,
}

/// Response metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    /// Aggregated rows returned by the adapter
    pub row_count: usize,
    pub date_bucketed: bool,
    /// The embedded engine failed and returned its sample count
    pub degraded: bool,
    pub execution_time_ms: u64,
}

/// A failure with the request context attached
#[derive(Error, Debug)]
#[error("{error}")]
pub struct PipelineError {
    #[source]
    pub error: ChartError,
    pub source_id: String,
    /// Absent when validation itself failed
    pub spec: Option<DataQuerySpec>,
}

impl PipelineError {
    fn new(error: ChartError, source_id: &str, spec: Option<&DataQuerySpec>) -> Self {
        Self {
            error,
            source_id: source_id.to_string(),
            spec: spec.cloned(),
        }
    }

    /// Whether the caller should show an empty chart
    pub fn is_empty_outcome(&self) -> bool {
        self.error.is_empty_outcome()
    }
}

/// Validate → execute → shape
pub struct ChartPipeline {
    adapters: Adapters,
    timeout: Duration,
}

impl ChartPipeline {
    pub fn new(adapters: Adapters, timeout: Duration) -> Self {
        Self { adapters, timeout }
    }

    /// Build adapters and timeout from configuration
    pub fn from_config(config: &Config) -> Result<Self, WarehouseError> {
        Ok(Self::new(
            Adapters::from_config(config)?,
            Duration::from_secs(config.engine.query_timeout_secs),
        ))
    }

    /// Run raw model output against a source
    pub async fn run_intent(
        &self,
        raw: &serde_json::Value,
        question: Option<&str>,
        source: &SourceDescriptor,
    ) -> Result<ChartResponse, PipelineError> {
        let intent = query::validate_intent(raw, question)
            .map_err(|e| PipelineError::new(e, &source.source_id(), None))?;
        self.run(intent, source).await
    }

    /// Run a typed intent against a source
    pub async fn run(&self, intent: ChartIntent, source: &SourceDescriptor) -> Result<ChartResponse, PipelineError> {
        let source_id = source.source_id();
        let span = info_span!(
            "chart_request",
            request_id = %Uuid::new_v4(),
            source = %source_id,
        );

        async move {
            let spec = &intent.data_query;
            let fail = |error: ChartError| PipelineError::new(error, &source_id, Some(spec));
            query::check_spec(spec).map_err(fail)?;

            let started = Instant::now();
            let output = tokio::time::timeout(self.timeout, self.adapters.execute(spec, source))
                .await
                .map_err(|_| {
                    fail(ChartError::execution(
                        &source_id,
                        format!("query exceeded the {:?} timeout", self.timeout),
                    ))
                })?
                .map_err(fail)?;

            if output.rows.is_empty() {
                return Err(fail(
                    NotFound::NoRows {
                        source_id: source_id.clone(),
                    }
                    .into(),
                ));
            }

            let data = shaper::shape(spec, &output);
            let sql = match &output.statement {
                Some(statement) => statement.display(),
                None => self.adapters.describe(spec, source),
            };
            let execution_time_ms = started.elapsed().as_millis() as u64;

            info!(
                kind = %source.kind(),
                rows = output.rows.len(),
                degraded = output.degraded,
                elapsed_ms = execution_time_ms,
                "Chart query completed"
            );

            Ok(ChartResponse {
                chart_type: intent.chart_type,
                title: intent.title.clone().unwrap_or_else(|| default_title(spec)),
                data,
                sql,
                meta: ChartMeta {
                    row_count: output.rows.len(),
                    date_bucketed: output.date_bucketed,
                    degraded: output.degraded,
                    execution_time_ms,
                },
            })
        }
        .instrument(span)
        .await
    }

    /// SQL the spec would run against a source, without executing it
    pub fn describe(&self, spec: &DataQuerySpec, source: &SourceDescriptor) -> String {
        self.adapters.describe(spec, source)
    }
}

/// `Sales by OrderDate`, `Count by Region`, `Sales`
fn default_title(spec: &DataQuerySpec) -> String {
    match &spec.dimension {
        Some(dimension) => format!("{} by {}", spec.value_label(), dimension),
        None => spec.value_label(),
    }
}
