use std::collections::BTreeMap;

use erp_core::{ChartKind, ChartPayload, ScatterPoint};
use serde_json::Value;

use super::{Metric, round2, text};

#[derive(Debug, Clone, Copy)]
pub struct ScatterSpec<'a> {
    pub entity_field: &'a str,
    pub x: Metric<'a>,
    pub y: Metric<'a>,
}

/// One point per entity; entities are ordered by name.
pub fn entity_points(records: &[Value], spec: &ScatterSpec<'_>) -> Vec<ScatterPoint> {
    let mut groups: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for record in records {
        if let Some(entity) = text(record, spec.entity_field) {
            groups.entry(entity).or_default().push(record);
        }
    }
    groups
        .into_iter()
        .map(|(entity, members)| ScatterPoint {
            label: entity.to_string(),
            x: round2(spec.x.evaluate(members.iter().copied())),
            y: round2(spec.y.evaluate(members)),
        })
        .collect()
}

/// Scatter chart from `primary`; `fallback` is only used when `primary` is
/// empty, and the payload then says so in `source`.
pub fn build_scatter(
    title: &str,
    primary: Vec<ScatterPoint>,
    fallback: Vec<ScatterPoint>,
    fallback_source: &str,
) -> ChartPayload {
    let mut chart = ChartPayload::new(title, ChartKind::Scatter, Vec::new());
    if primary.is_empty() && !fallback.is_empty() {
        chart.points = fallback;
        chart.source = Some(fallback_source.to_string());
    } else {
        chart.points = primary;
    }
    chart
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPEC: ScatterSpec<'static> = ScatterSpec {
        entity_field: "customer",
        x: Metric::Count,
        y: Metric::Sum("grand_total"),
    };

    #[test]
    fn groups_points_per_entity() {
        let records = vec![
            json!({"customer": "B", "grand_total": 10}),
            json!({"customer": "A", "grand_total": 5}),
            json!({"customer": "B", "grand_total": 15}),
        ];
        let points = entity_points(&records, &SPEC);
        assert_eq!(
            points,
            vec![
                ScatterPoint { label: "A".into(), x: 1.0, y: 5.0 },
                ScatterPoint { label: "B".into(), x: 2.0, y: 25.0 },
            ]
        );
    }

    #[test]
    fn fallback_only_when_primary_is_empty() {
        let primary = vec![ScatterPoint { label: "A".into(), x: 1.0, y: 1.0 }];
        let fallback = vec![ScatterPoint { label: "Z".into(), x: 9.0, y: 9.0 }];

        let chart = build_scatter("t", primary.clone(), fallback.clone(), "Sales Order");
        assert_eq!(chart.points, primary);
        assert_eq!(chart.source, None);

        let chart = build_scatter("t", Vec::new(), fallback.clone(), "Sales Order");
        assert_eq!(chart.points, fallback);
        assert_eq!(chart.source.as_deref(), Some("Sales Order"));
        assert_eq!(chart.kind, ChartKind::Scatter);
    }
}
