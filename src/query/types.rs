//! Query contract types
//!
//! The backend-independent description of an aggregation request, as
//! produced by the language model and repaired by the validator.
//!
//! # Example
//!
//! ```text
//! {"type": "sum", "measure": "Sales", "dimension": "OrderDate",
//!  "multiSeries": true, "seriesDimension": "State",
//!  "filters": [{"column": "State", "operator": "IN", "value": ["Kentucky", "California"]}]}
//! ```

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Aggregation applied per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    /// Number of rows
    Count,
    /// Arithmetic sum of the measure
    Sum,
    /// Sum of the measure divided by row count
    Average,
}

impl AggregationType {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "count" => Some(Self::Count),
            "sum" | "total" => Some(Self::Sum),
            "average" | "avg" | "mean" => Some(Self::Average),
            _ => None,
        }
    }

    /// Whether a measure column is required
    pub fn requires_measure(&self) -> bool {
        !matches!(self, Self::Count)
    }

    /// SQL aggregate function name
    pub fn sql_function(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Average => "AVG",
        }
    }
}

impl std::fmt::Display for AggregationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count => write!(f, "count"),
            Self::Sum => write!(f, "sum"),
            Self::Average => write!(f, "average"),
        }
    }
}

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "LIKE")]
    Like,
}

impl FilterOp {
    /// Parse from string (keywords are case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "=" | "==" => Some(Self::Eq),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            "IN" => Some(Self::In),
            "LIKE" => Some(Self::Like),
            _ => None,
        }
    }

    /// True for `=`, `>`, `<`, `>=`, `<=`
    pub fn is_comparison(&self) -> bool {
        !matches!(self, Self::In | Self::Like)
    }

    /// Compare two f64 values
    pub fn compare_f64(&self, a: f64, b: f64) -> bool {
        match self {
            Self::Eq => (a - b).abs() < f64::EPSILON,
            Self::Gt => a > b,
            Self::Gte => a >= b,
            Self::Lt => a < b,
            Self::Lte => a <= b,
            Self::In | Self::Like => false,
        }
    }

    /// Compare two ordered values
    pub fn compare_ord<T: Ord>(&self, a: &T, b: &T) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Gt => a > b,
            Self::Gte => a >= b,
            Self::Lt => a < b,
            Self::Lte => a <= b,
            Self::In | Self::Like => false,
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Gte => write!(f, ">="),
            Self::Lte => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Lt => write!(f, "<"),
            Self::In => write!(f, "IN"),
            Self::Like => write!(f, "LIKE"),
        }
    }
}

/// Filter literal: a scalar, or a list for `IN`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<Value>),
    Scalar(Value),
}

impl FilterValue {
    /// The scalar, or the first list element
    pub fn first(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            Self::List(values) => values.first(),
        }
    }

    /// All values as a slice-like iterator
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Self::Scalar(v) => vec![v],
            Self::List(values) => values.iter().collect(),
        }
    }
}

/// A single filter condition; filters combine with AND
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    /// Create a new filter
    pub fn new(column: impl Into<String>, operator: FilterOp, value: FilterValue) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, FilterValue::Scalar(value.into()))
    }

    /// `column IN (values...)`
    pub fn one_of(column: impl Into<String>, values: &[&str]) -> Self {
        let values = values.iter().map(|v| Value::from(*v)).collect();
        Self::new(column, FilterOp::In, FilterValue::List(values))
    }

    /// `column LIKE %needle%`
    pub fn contains(column: impl Into<String>, needle: &str) -> Self {
        Self::new(column, FilterOp::Like, FilterValue::Scalar(Value::from(needle)))
    }

    /// `column <op> value` for ordering comparisons
    pub fn compare(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self::new(column, op, FilterValue::Scalar(value.into()))
    }
}

/// Backend-independent aggregation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuerySpec {
    #[serde(rename = "type")]
    pub aggregation: AggregationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(default)]
    pub multi_series: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_dimension: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl DataQuerySpec {
    fn with_aggregation(aggregation: AggregationType, measure: Option<String>) -> Self {
        Self {
            aggregation,
            measure,
            dimension: None,
            multi_series: false,
            series_dimension: None,
            filters: Vec::new(),
        }
    }

    /// Row count
    pub fn count() -> Self {
        Self::with_aggregation(AggregationType::Count, None)
    }

    /// Sum of a measure column
    pub fn sum(measure: impl Into<String>) -> Self {
        Self::with_aggregation(AggregationType::Sum, Some(measure.into()))
    }

    /// Average of a measure column
    pub fn average(measure: impl Into<String>) -> Self {
        Self::with_aggregation(AggregationType::Average, Some(measure.into()))
    }

    /// Group by a dimension column
    pub fn group_by(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self
    }

    /// Split into one series per value of a column
    pub fn split_by(mut self, series: impl Into<String>) -> Self {
        self.multi_series = true;
        self.series_dimension = Some(series.into());
        self
    }

    /// Add a filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// The series column, only when multi-series is on
    pub fn active_series(&self) -> Option<&str> {
        if self.multi_series {
            self.series_dimension.as_deref()
        } else {
            None
        }
    }

    /// Name of the value being charted (`Count` for count queries)
    pub fn value_label(&self) -> String {
        match (&self.aggregation, &self.measure) {
            (AggregationType::Count, _) | (_, None) => "Count".to_string(),
            (_, Some(measure)) => measure.clone(),
        }
    }
}

/// Chart types the renderer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Area,
    Pie,
    Doughnut,
}

impl ChartType {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bar" | "column" => Some(Self::Bar),
            "line" => Some(Self::Line),
            "area" => Some(Self::Area),
            "pie" => Some(Self::Pie),
            "doughnut" | "donut" => Some(Self::Doughnut),
            _ => None,
        }
    }
}

/// The full structured output of the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartIntent {
    pub chart_type: ChartType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub data_query: DataQuerySpec,
}

impl ChartIntent {
    /// Wrap a spec as a default bar chart
    pub fn bar(data_query: DataQuerySpec) -> Self {
        Self {
            chart_type: ChartType::Bar,
            title: None,
            data_query,
        }
    }
}
