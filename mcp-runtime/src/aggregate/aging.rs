use chrono::NaiveDate;
use erp_core::ChartPayload;
use serde_json::Value;

use super::composed::dual_axis;
use super::tables::{AGING_BUCKETS, aging_bucket_index};
use super::{date, number, round2};

#[derive(Debug, Clone, Copy)]
pub struct AgingSpec<'a> {
    pub title: &'a str,
    /// Usually the due date.
    pub primary_date: &'a str,
    /// Used when the primary date is null, usually the posting date.
    pub fallback_date: &'a str,
    pub amount_field: &'a str,
}

/// Days between `today` and the record's reference date, clamped at 0.
/// `None` when the record carries neither date.
pub fn age_in_days(record: &Value, spec: &AgingSpec<'_>, today: NaiveDate) -> Option<i64> {
    let reference = date(record, spec.primary_date).or_else(|| date(record, spec.fallback_date))?;
    Some((today - reference).num_days().max(0))
}

/// Outstanding amount (bars, left axis) and document count (line, right axis)
/// per aging bucket. Each record lands in exactly one bucket.
pub fn build_aging(records: &[Value], spec: &AgingSpec<'_>, today: NaiveDate) -> ChartPayload {
    let mut amounts = [0.0_f64; AGING_BUCKETS.len()];
    let mut counts = [0.0_f64; AGING_BUCKETS.len()];
    for record in records {
        let Some(days) = age_in_days(record, spec, today) else {
            continue;
        };
        let bucket = aging_bucket_index(days);
        amounts[bucket] += number(record, spec.amount_field);
        counts[bucket] += 1.0;
    }

    let labels = AGING_BUCKETS.iter().map(|b| b.label.to_string()).collect();
    dual_axis(
        spec.title,
        labels,
        ("Outstanding", amounts.iter().copied().map(round2).collect()),
        ("Documents", counts.to_vec()),
    )
}
