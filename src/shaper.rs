//! Result Shaper
//!
//! Turns adapter rows into the `{labels, datasets}` structure chart
//! renderers consume. Every dataset has exactly one value per label:
//! a bucket a series never reached is filled with 0.

use crate::adapter::{AdapterOutput, AggregateRow};
use crate::dates;
use crate::query::DataQuerySpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Dataset colours, cycled by dataset index
pub const PALETTE: [&str; 6] = ["#4CAF50", "#2196F3", "#FF9800", "#9C27B0", "#F44336", "#00BCD4"];

/// Line width of every dataset
pub const BORDER_WIDTH: u32 = 2;

/// Dataset label of a degraded result, whose only value is a loaded-row count
pub const SAMPLE_COUNT_LABEL: &str = "Sample count";

/// One series of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub background_color: String,
    pub border_color: String,
    pub border_width: u32,
    pub fill: bool,
}

impl ChartDataset {
    fn styled(label: String, data: Vec<f64>, index: usize) -> Self {
        let color = PALETTE[index % PALETTE.len()].to_string();
        Self {
            label,
            data,
            background_color: color.clone(),
            border_color: color,
            border_width: BORDER_WIDTH,
            fill: false,
        }
    }
}

/// Chart-ready data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartResult {
    /// Rendered bucket labels (x-axis)
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

impl ChartResult {
    /// Whether every dataset has one value per label
    pub fn is_aligned(&self) -> bool {
        self.datasets.iter().all(|d| d.data.len() == self.labels.len())
    }
}

/// Shape adapter output for a spec
pub fn shape(spec: &DataQuerySpec, output: &AdapterOutput) -> ChartResult {
    let keys = label_axis(&output.rows, output.date_bucketed);
    let labels: Vec<String> = keys
        .iter()
        .map(|k| {
            if output.date_bucketed {
                dates::render_label(k)
            } else {
                k.clone()
            }
        })
        .collect();

    let measure = spec.value_label();
    let datasets = if output.degraded {
        // The value counts loaded rows, not the requested measure
        vec![single_series(&output.rows, &keys, SAMPLE_COUNT_LABEL.to_string())]
    } else {
        match spec.active_series() {
            Some(_) => multi_series(&output.rows, &keys, &measure),
            None => vec![single_series(&output.rows, &keys, measure)],
        }
    };

    let result = ChartResult { labels, datasets };
    debug!(
        labels = result.labels.len(),
        datasets = result.datasets.len(),
        "Chart shaped"
    );
    result
}

/// Distinct group keys: chronological for month buckets, otherwise first appearance
fn label_axis(rows: &[AggregateRow], chronological: bool) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for row in rows {
        if !keys.contains(&row.group) {
            keys.push(row.group.clone());
        }
    }

    if chronological {
        // Stable: anything that is not a month key keeps its place at the end
        keys.sort_by_key(|k| dates::parse_month_key(k).map_or((1, 0, 0), |(y, m)| (0, y, m)));
    }
    keys
}

fn single_series(rows: &[AggregateRow], keys: &[String], label: String) -> ChartDataset {
    let values: HashMap<&str, f64> = rows.iter().map(|r| (r.group.as_str(), r.value)).collect();
    let data = keys
        .iter()
        .map(|k| values.get(k.as_str()).copied().unwrap_or(0.0))
        .collect();
    ChartDataset::styled(label, data, 0)
}

fn multi_series(rows: &[AggregateRow], keys: &[String], measure: &str) -> Vec<ChartDataset> {
    let mut order: Vec<&str> = Vec::new();
    let mut matrix: HashMap<&str, HashMap<&str, f64>> = HashMap::new();

    for row in rows {
        let series = row.series.as_deref().unwrap_or(crate::adapter::BLANK_BUCKET);
        if !matrix.contains_key(series) {
            order.push(series);
        }
        matrix
            .entry(series)
            .or_default()
            .insert(row.group.as_str(), row.value);
    }

    order
        .into_iter()
        .enumerate()
        .map(|(idx, series)| {
            let values = &matrix[series];
            let data = keys
                .iter()
                .map(|k| values.get(k.as_str()).copied().unwrap_or(0.0))
                .collect();
            ChartDataset::styled(format!("{} - {}", series, measure), data, idx)
        })
        .collect()
}
