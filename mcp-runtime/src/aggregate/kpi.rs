use chrono::{Months, NaiveDate};
use erp_core::{KpiPayload, Trend};
use serde_json::Value;

use super::tables::SPARKLINE_MONTHS;
use super::timeseries::{YearMonth, month_window, monthly_totals};
use super::{Metric, date, ratio, round1, round2};

#[derive(Debug, Clone, Copy)]
pub struct KpiSpec<'a> {
    pub label: &'a str,
    pub metric: Metric<'a>,
    /// Date that places a record in a month. Without one the card is a
    /// snapshot: value only, no comparison.
    pub date_field: Option<&'a str>,
    pub up_is_good: bool,
    pub sparkline: bool,
    pub unit: Option<&'a str>,
}

/// Percent change, one decimal; 0 when there is nothing to compare against.
pub fn delta_percent(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    round1(100.0 * ratio(current - previous, previous.abs()))
}

pub fn trend(current: f64, previous: f64) -> Trend {
    if current > previous {
        Trend::Up
    } else if current < previous {
        Trend::Down
    } else {
        Trend::Flat
    }
}

/// Inclusive day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// Month to date, and the previous month up to the same day of month. A day
/// the previous month lacks clamps to its last day (Mar 31 pairs with Feb 28).
pub fn comparable_periods(today: NaiveDate) -> Option<(Period, Period)> {
    let current = Period {
        start: YearMonth::of(today).first_day()?,
        end: today,
    };
    let prior_end = today.checked_sub_months(Months::new(1))?;
    let prior = Period {
        start: YearMonth::of(prior_end).first_day()?,
        end: prior_end,
    };
    Some((current, prior))
}

fn metric_within(records: &[Value], spec: &KpiSpec<'_>, date_field: &str, period: Period) -> f64 {
    spec.metric.evaluate(
        records
            .iter()
            .filter(|record| date(record, date_field).is_some_and(|day| period.contains(day))),
    )
}

/// Month to date against the same stretch of the previous month. `records`
/// should cover the sparkline window when a sparkline is requested; the
/// sparkline itself is whole calendar months.
pub fn build_kpi(records: &[Value], spec: &KpiSpec<'_>, today: NaiveDate) -> KpiPayload {
    let mut payload = KpiPayload {
        label: spec.label.to_string(),
        value: 0.0,
        previous: None,
        delta: None,
        trend: None,
        up_is_good: spec.up_is_good,
        sparkline: None,
        unit: spec.unit.map(str::to_string),
    };

    let Some(date_field) = spec.date_field else {
        payload.value = round2(spec.metric.evaluate(records));
        return payload;
    };

    let (current, previous) = match comparable_periods(today) {
        Some((current, prior)) => (
            round2(metric_within(records, spec, date_field, current)),
            round2(metric_within(records, spec, date_field, prior)),
        ),
        None => (0.0, 0.0),
    };

    payload.value = current;
    payload.previous = Some(previous);
    payload.delta = Some(delta_percent(current, previous));
    payload.trend = Some(trend(current, previous));
    if spec.sparkline {
        let window = month_window(today, SPARKLINE_MONTHS);
        payload.sparkline = Some(monthly_totals(records, date_field, spec.metric, &window));
    }
    payload
}
