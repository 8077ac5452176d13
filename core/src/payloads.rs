//! Presentation payloads handed to the rendering layer.
//!
//! These are the whole contract with whatever draws the charts: every field
//! serialises in camelCase and optional side channels are omitted when empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    StackedBar,
    Line,
    Area,
    Donut,
    Pie,
    Composed,
    Radar,
    Scatter,
    Treemap,
    Funnel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Left,
    Right,
}

/// How one series of a composed chart is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<Axis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_as: Option<SeriesKind>,
}

impl Dataset {
    pub fn new(label: impl Into<String>, data: Vec<f64>, color: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data,
            color: color.into(),
            stack: None,
            y_axis: None,
            render_as: None,
        }
    }

    pub fn stacked(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn on_axis(mut self, axis: Axis, render_as: SeriesKind) -> Self {
        self.y_axis = Some(axis);
        self.render_as = Some(render_as);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreemapLeaf {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPayload {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<ScatterPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leaves: Vec<TreemapLeaf>,
    /// Which data source produced the payload when more than one was tried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ChartPayload {
    pub fn new(title: impl Into<String>, kind: ChartKind, labels: Vec<String>) -> Self {
        Self {
            title: title.into(),
            kind,
            labels,
            datasets: Vec::new(),
            points: Vec::new(),
            leaves: Vec::new(),
            source: None,
        }
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }

    /// Every dataset carries exactly one value per label.
    pub fn is_aligned(&self) -> bool {
        self.datasets
            .iter()
            .all(|dataset| dataset.data.len() == self.labels.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiPayload {
    pub label: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<f64>,
    /// Percent change against the previous period, one decimal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    /// Declared per metric by the tool author; never inferred.
    pub up_is_good: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparkline: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineColumn {
    pub status: String,
    pub label: String,
    pub color: String,
    pub count: usize,
    pub total: f64,
    pub items: Vec<RecordSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelinePayload {
    pub title: String,
    pub columns: Vec<PipelineColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStage {
    pub label: String,
    pub count: usize,
    pub total: f64,
    pub conversion_rate: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelPayload {
    pub title: String,
    pub stages: Vec<FunnelStage>,
}

/// Result of a list-shaped tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPayload {
    pub doctype: String,
    pub count: usize,
    pub data: Vec<Value>,
}

impl ListPayload {
    pub fn new(doctype: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            doctype: doctype.into(),
            count: data.len(),
            data,
        }
    }
}
