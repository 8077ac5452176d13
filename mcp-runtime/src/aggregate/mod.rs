//! Pure transforms from fetched record lists to presentation payloads.
//!
//! Nothing in here performs I/O or reads the clock: the reference date is
//! always a parameter. Groupings go through `BTreeMap` and every sort is stable
//! with a label tie-break, so the same input always serialises identically.

pub mod aging;
pub mod categorical;
pub mod composed;
pub mod funnel;
pub mod kpi;
pub mod pipeline;
pub mod radar;
pub mod scatter;
pub mod tables;
pub mod timeseries;
pub mod treemap;

use chrono::NaiveDate;
use serde_json::Value;

/// How a group of records collapses to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric<'a> {
    Count,
    Sum(&'a str),
    Average(&'a str),
    Distinct(&'a str),
}

impl Metric<'_> {
    pub fn evaluate<'v>(&self, records: impl IntoIterator<Item = &'v Value>) -> f64 {
        match *self {
            Metric::Count => records.into_iter().count() as f64,
            Metric::Sum(field) => records.into_iter().map(|r| number(r, field)).sum(),
            Metric::Average(field) => {
                let (sum, n) = records
                    .into_iter()
                    .fold((0.0, 0usize), |(sum, n), r| (sum + number(r, field), n + 1));
                ratio(sum, n as f64)
            }
            Metric::Distinct(field) => {
                let mut seen = std::collections::BTreeSet::new();
                for record in records {
                    if let Some(value) = text(record, field) {
                        seen.insert(value.to_string());
                    }
                }
                seen.len() as f64
            }
        }
    }

    /// Contribution of a single record, for metrics that are additive.
    pub fn single(&self, record: &Value) -> f64 {
        match *self {
            Metric::Count | Metric::Distinct(_) => 1.0,
            Metric::Sum(field) | Metric::Average(field) => number(record, field),
        }
    }
}

/// Numeric field value. Numeric strings are accepted since some list
/// endpoints return decimals as text; anything else counts as 0.
pub fn number(record: &Value, field: &str) -> f64 {
    match record.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn optional_number(record: &Value, field: &str) -> Option<f64> {
    match record.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn text<'v>(record: &'v Value, field: &str) -> Option<&'v str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Accepts `YYYY-MM-DD` with or without a trailing time part.
pub fn date(record: &Value, field: &str) -> Option<NaiveDate> {
    let raw = text(record, field)?;
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `numerator / denominator`, 0 when the denominator is 0.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_reads_numeric_strings_and_defaults_to_zero() {
        let record = json!({"a": 12.5, "b": "7.25", "c": "n/a", "d": null});
        assert_eq!(number(&record, "a"), 12.5);
        assert_eq!(number(&record, "b"), 7.25);
        assert_eq!(number(&record, "c"), 0.0);
        assert_eq!(number(&record, "d"), 0.0);
        assert_eq!(number(&record, "missing"), 0.0);
    }

    #[test]
    fn date_accepts_datetime_strings() {
        let record = json!({"creation": "2026-03-04 10:11:12.000001", "bad": "03/04/2026"});
        assert_eq!(
            date(&record, "creation"),
            NaiveDate::from_ymd_opt(2026, 3, 4)
        );
        assert_eq!(date(&record, "bad"), None);
    }

    #[test]
    fn metrics_collapse_groups() {
        let rows = [
            json!({"customer": "A", "total": 10}),
            json!({"customer": "B", "total": 30}),
            json!({"customer": "A", "total": 20}),
        ];
        assert_eq!(Metric::Count.evaluate(&rows), 3.0);
        assert_eq!(Metric::Sum("total").evaluate(&rows), 60.0);
        assert_eq!(Metric::Average("total").evaluate(&rows), 20.0);
        assert_eq!(Metric::Distinct("customer").evaluate(&rows), 2.0);
        assert_eq!(Metric::Average("total").evaluate(&[] as &[Value]), 0.0);
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(ratio(5.0, 2.0), 2.5);
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round1(33.333), 33.3);
    }
}
