use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use erp_core::{ChartKind, ChartPayload, Dataset};
use serde_json::Value;

use super::tables::{TOP_ENTITIES, palette_color};
use super::{Metric, date, round2, text};

/// Calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(day: NaiveDate) -> Self {
        Self {
            year: day.year(),
            month: day.month(),
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    fn label(self, with_year: bool) -> String {
        let Some(day) = self.first_day() else {
            return format!("{}-{:02}", self.year, self.month);
        };
        if with_year {
            day.format("%b %Y").to_string()
        } else {
            day.format("%b").to_string()
        }
    }
}

/// `months` consecutive calendar months ending with the month of `reference`,
/// oldest first.
pub fn month_window(reference: NaiveDate, months: u32) -> Vec<YearMonth> {
    let Some(anchor) = reference.with_day(1) else {
        return Vec::new();
    };
    (0..months)
        .rev()
        .filter_map(|back| anchor.checked_sub_months(Months::new(back)))
        .map(YearMonth::of)
        .collect()
}

/// Month labels; the year is appended once the window can repeat a month name.
pub fn month_labels(window: &[YearMonth]) -> Vec<String> {
    let with_year = window.len() > 12;
    window.iter().map(|ym| ym.label(with_year)).collect()
}

/// Per-month totals over `window`. Every month is present, zeros included;
/// records dated outside the window or without a date are ignored.
pub fn monthly_totals(records: &[Value], date_field: &str, metric: Metric<'_>, window: &[YearMonth]) -> Vec<f64> {
    let mut buckets: BTreeMap<YearMonth, Vec<&Value>> = BTreeMap::new();
    for record in records {
        if let Some(day) = date(record, date_field) {
            buckets.entry(YearMonth::of(day)).or_default().push(record);
        }
    }
    window
        .iter()
        .map(|ym| {
            buckets
                .get(ym)
                .map(|members| round2(metric.evaluate(members.iter().copied())))
                .unwrap_or(0.0)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesSpec<'a> {
    pub title: &'a str,
    pub date_field: &'a str,
    pub metric: Metric<'a>,
    pub series_label: &'a str,
    pub months: u32,
    pub kind: ChartKind,
    /// Split into one series per entity, keeping the largest few.
    pub split_by: Option<&'a str>,
}

pub fn build_time_series(records: &[Value], spec: &TimeSeriesSpec<'_>, today: NaiveDate) -> ChartPayload {
    let window = month_window(today, spec.months);
    let mut chart = ChartPayload::new(spec.title, spec.kind, month_labels(&window));

    let Some(split_field) = spec.split_by else {
        let values = monthly_totals(records, spec.date_field, spec.metric, &window);
        return chart.with_dataset(Dataset::new(spec.series_label, values, palette_color(0)));
    };

    let first = window.first().copied();
    let last = window.last().copied();
    let in_window = |record: &Value| {
        date(record, spec.date_field)
            .map(YearMonth::of)
            .is_some_and(|ym| Some(ym) >= first && Some(ym) <= last)
    };

    let mut per_entity: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for record in records.iter().filter(|r| in_window(*r)) {
        if let Some(entity) = text(record, split_field) {
            per_entity.entry(entity).or_default().push(record.clone());
        }
    }

    let mut ranked: Vec<(&str, f64)> = per_entity
        .iter()
        .map(|(entity, rows)| (*entity, spec.metric.evaluate(rows)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(TOP_ENTITIES);

    let stacked = spec.kind == ChartKind::StackedBar;
    for (index, (entity, _)) in ranked.into_iter().enumerate() {
        let rows = per_entity.get(entity).map(Vec::as_slice).unwrap_or_default();
        let values = monthly_totals(rows, spec.date_field, spec.metric, &window);
        let mut dataset = Dataset::new(entity, values, palette_color(index));
        if stacked {
            dataset = dataset.stacked("entities");
        }
        chart = chart.with_dataset(dataset);
    }
    chart
}
