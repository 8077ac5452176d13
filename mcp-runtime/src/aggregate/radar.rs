use std::collections::BTreeMap;

use erp_core::{ChartKind, ChartPayload, Dataset};
use serde_json::Value;

use super::tables::palette_color;
use super::{Metric, ratio, round1, text};

#[derive(Debug, Clone, Copy)]
pub struct RadarDimension<'a> {
    pub label: &'a str,
    pub metric: Metric<'a>,
}

#[derive(Debug, Clone)]
pub struct RadarSpec<'a> {
    pub title: &'a str,
    pub entity_field: &'a str,
    pub dimensions: Vec<RadarDimension<'a>>,
    /// Entities to compare, in display order.
    pub entities: Vec<String>,
}

/// One polygon per entity. Each axis is scaled 0-100 against the largest value
/// among the compared entities, so scores are relative to the selection.
pub fn build_radar(records: &[Value], spec: &RadarSpec<'_>) -> ChartPayload {
    let mut groups: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for record in records {
        if let Some(entity) = text(record, spec.entity_field) {
            groups.entry(entity).or_default().push(record);
        }
    }

    let raw: Vec<Vec<f64>> = spec
        .entities
        .iter()
        .map(|entity| {
            let members = groups.get(entity.as_str()).map(Vec::as_slice).unwrap_or_default();
            spec.dimensions
                .iter()
                .map(|dimension| dimension.metric.evaluate(members.iter().copied()))
                .collect()
        })
        .collect();

    let maxima: Vec<f64> = (0..spec.dimensions.len())
        .map(|axis| raw.iter().map(|row| row[axis]).fold(0.0, f64::max))
        .collect();

    let labels = spec.dimensions.iter().map(|d| d.label.to_string()).collect();
    let mut chart = ChartPayload::new(spec.title, ChartKind::Radar, labels);
    for (index, (entity, row)) in spec.entities.iter().zip(raw).enumerate() {
        let scores = row
            .iter()
            .zip(&maxima)
            .map(|(value, max)| round1(100.0 * ratio(*value, *max)))
            .collect();
        chart = chart.with_dataset(Dataset::new(entity.as_str(), scores, palette_color(index)));
    }
    chart
}

/// Entities with the most records, ties broken by name.
pub fn busiest_entities(records: &[Value], entity_field: &str, limit: usize) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        if let Some(entity) = text(record, entity_field) {
            *counts.entry(entity).or_default() += 1;
        }
    }
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(entity, _)| entity.to_string())
        .collect()
}
