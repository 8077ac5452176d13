use chrono::NaiveDate;
use erp_core::{Axis, ChartKind, ChartPayload, Dataset, SeriesKind};
use serde_json::Value;

use super::Metric;
use super::tables::palette_color;
use super::timeseries::{month_labels, month_window, monthly_totals};

#[derive(Debug, Clone, Copy)]
pub struct SeriesSpec<'a> {
    pub label: &'a str,
    pub metric: Metric<'a>,
}

#[derive(Debug, Clone, Copy)]
pub struct ComposedSpec<'a> {
    pub title: &'a str,
    pub date_field: &'a str,
    pub months: u32,
    /// Drawn as bars on the left axis.
    pub bars: SeriesSpec<'a>,
    /// Drawn as a line on the right axis.
    pub line: SeriesSpec<'a>,
}

/// Two metrics of different scale over the same monthly window.
pub fn build_composed(records: &[Value], spec: &ComposedSpec<'_>, today: NaiveDate) -> ChartPayload {
    let window = month_window(today, spec.months);
    let bars = monthly_totals(records, spec.date_field, spec.bars.metric, &window);
    let line = monthly_totals(records, spec.date_field, spec.line.metric, &window);
    dual_axis(spec.title, month_labels(&window), (spec.bars.label, bars), (spec.line.label, line))
}

/// Composed chart from already aligned series.
pub fn dual_axis(
    title: &str,
    labels: Vec<String>,
    bars: (&str, Vec<f64>),
    line: (&str, Vec<f64>),
) -> ChartPayload {
    ChartPayload::new(title, ChartKind::Composed, labels)
        .with_dataset(Dataset::new(bars.0, bars.1, palette_color(0)).on_axis(Axis::Left, SeriesKind::Bar))
        .with_dataset(Dataset::new(line.0, line.1, palette_color(2)).on_axis(Axis::Right, SeriesKind::Line))
}
