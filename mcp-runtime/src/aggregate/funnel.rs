use erp_core::{FunnelPayload, FunnelStage};
use serde_json::Value;

use super::tables::palette_color;
use super::{number, ratio, round2};

#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub label: &'a str,
    pub records: &'a [Value],
    pub amount_field: Option<&'a str>,
}

/// Ordered stages with stage-to-stage conversion. The first stage reports 100;
/// later stages report `round(100 * count / previous count)`, 0 after an empty
/// stage.
pub fn build_funnel(title: &str, stages: &[StageInput<'_>]) -> FunnelPayload {
    let mut previous: Option<usize> = None;
    let stages = stages
        .iter()
        .enumerate()
        .map(|(index, stage)| {
            let count = stage.records.len();
            let total: f64 = stage
                .amount_field
                .map(|field| stage.records.iter().map(|r| number(r, field)).sum())
                .unwrap_or(0.0);
            let conversion_rate = match previous {
                None => 100.0,
                Some(prev) => (100.0 * ratio(count as f64, prev as f64)).round(),
            };
            previous = Some(count);
            FunnelStage {
                label: stage.label.to_string(),
                count,
                total: round2(total),
                conversion_rate,
                color: palette_color(index).to_string(),
            }
        })
        .collect();
    FunnelPayload {
        title: title.to_string(),
        stages,
    }
}
