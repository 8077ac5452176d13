use std::collections::BTreeMap;

use erp_core::{ChartKind, ChartPayload, Dataset};
use serde_json::Value;

use super::tables::{HORIZONTAL_BAR_THRESHOLD, palette_color};
use super::{Metric, round2, text};

pub const UNSPECIFIED: &str = "Unspecified";

#[derive(Debug, Clone, Copy)]
pub struct CategoricalSpec<'a> {
    pub title: &'a str,
    pub dimension: &'a str,
    pub metric: Metric<'a>,
    pub series_label: &'a str,
    pub top_n: usize,
    /// Share breakdown (donut) instead of a ranking (bars).
    pub share: bool,
}

/// Group by `dimension`, collapse each group with `metric`, rank descending
/// (ties by label) and keep the top `top_n`. Records without a dimension value
/// are grouped under [`UNSPECIFIED`].
pub fn build_categorical(records: &[Value], spec: &CategoricalSpec<'_>) -> ChartPayload {
    let ranked = rank(records, spec.dimension, spec.metric, spec.top_n);
    let kind = if spec.share {
        ChartKind::Donut
    } else {
        bar_kind(ranked.len())
    };

    let (labels, values): (Vec<String>, Vec<f64>) = ranked.into_iter().unzip();
    ChartPayload::new(spec.title, kind, labels)
        .with_dataset(Dataset::new(spec.series_label, values, palette_color(0)))
}

/// Vertical bars up to the legibility threshold, horizontal beyond.
pub fn bar_kind(categories: usize) -> ChartKind {
    if categories > HORIZONTAL_BAR_THRESHOLD {
        ChartKind::HorizontalBar
    } else {
        ChartKind::Bar
    }
}

pub fn rank(records: &[Value], dimension: &str, metric: Metric<'_>, top_n: usize) -> Vec<(String, f64)> {
    let mut groups: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for record in records {
        let key = text(record, dimension).unwrap_or(UNSPECIFIED);
        groups.entry(key).or_default().push(record);
    }

    let mut ranked: Vec<(String, f64)> = groups
        .into_iter()
        .map(|(label, members)| (label.to_string(), round2(metric.evaluate(members))))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(top_n: usize) -> CategoricalSpec<'static> {
        CategoricalSpec {
            title: "Sales by Customer",
            dimension: "customer",
            metric: Metric::Sum("grand_total"),
            series_label: "Revenue",
            top_n,
            share: false,
        }
    }

    #[test]
    fn ranks_descending_with_label_tie_break() {
        let records = vec![
            json!({"customer": "Zeta", "grand_total": 100}),
            json!({"customer": "Alpha", "grand_total": 100}),
            json!({"customer": "Mid", "grand_total": 250}),
            json!({"customer": "Mid", "grand_total": 50}),
        ];
        let chart = build_categorical(&records, &spec(10));
        assert_eq!(chart.labels, vec!["Mid", "Alpha", "Zeta"]);
        assert_eq!(chart.datasets[0].data, vec![300.0, 100.0, 100.0]);
        assert_eq!(chart.kind, ChartKind::Bar);
        assert!(chart.is_aligned());
    }

    #[test]
    fn switches_to_horizontal_past_threshold_and_truncates() {
        let records: Vec<_> = (0..9)
            .map(|i| json!({"customer": format!("C{i}"), "grand_total": 10 * (i + 1)}))
            .collect();
        let chart = build_categorical(&records, &spec(7));
        assert_eq!(chart.labels.len(), 7);
        assert_eq!(chart.labels[0], "C8");
        assert_eq!(chart.kind, ChartKind::HorizontalBar);

        let chart = build_categorical(&records, &spec(6));
        assert_eq!(chart.kind, ChartKind::Bar);
    }

    #[test]
    fn missing_dimension_is_grouped_not_dropped() {
        let records = vec![
            json!({"customer": "A", "grand_total": 5}),
            json!({"grand_total": 7}),
        ];
        let chart = build_categorical(&records, &spec(10));
        assert_eq!(chart.labels, vec![UNSPECIFIED, "A"]);
        let total: f64 = chart.datasets[0].data.iter().sum();
        assert_eq!(total, 12.0);
    }

    #[test]
    fn share_variant_is_donut() {
        let records = vec![json!({"customer": "A", "grand_total": 5})];
        let mut spec = spec(10);
        spec.share = true;
        assert_eq!(build_categorical(&records, &spec).kind, ChartKind::Donut);
    }

    #[test]
    fn output_is_deterministic() {
        let records: Vec<_> = (0..20)
            .map(|i| json!({"customer": format!("C{}", i % 4), "grand_total": i}))
            .collect();
        let first = serde_json::to_string(&build_categorical(&records, &spec(10))).unwrap();
        let second = serde_json::to_string(&build_categorical(&records, &spec(10))).unwrap();
        assert_eq!(first, second);
    }
}
