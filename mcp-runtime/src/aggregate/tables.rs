//! Fixed display tables: thresholds, palette and status-to-column maps.

/// Above this many categories a vertical bar chart becomes horizontal.
pub const HORIZONTAL_BAR_THRESHOLD: usize = 6;

/// Months in a KPI sparkline, ending with the current month.
pub const SPARKLINE_MONTHS: u32 = 6;

/// Per-entity splits of a time series keep this many entities.
pub const TOP_ENTITIES: usize = 5;

pub const PALETTE: [&str; 10] = [
    "#2563eb", "#16a34a", "#f59e0b", "#dc2626", "#7c3aed", "#0891b2", "#db2777", "#65a30d",
    "#ea580c", "#475569",
];

pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusColumn {
    pub status: &'static str,
    pub label: &'static str,
    pub color: &'static str,
}

const fn column(status: &'static str, label: &'static str, color: &'static str) -> StatusColumn {
    StatusColumn {
        status,
        label,
        color,
    }
}

pub const SALES_ORDER_COLUMNS: &[StatusColumn] = &[
    column("Draft", "Draft", "#94a3b8"),
    column("On Hold", "On Hold", "#f59e0b"),
    column("To Deliver and Bill", "To Deliver & Bill", "#2563eb"),
    column("To Bill", "To Bill", "#7c3aed"),
    column("To Deliver", "To Deliver", "#0891b2"),
    column("Completed", "Completed", "#16a34a"),
];

pub const PURCHASE_ORDER_COLUMNS: &[StatusColumn] = &[
    column("Draft", "Draft", "#94a3b8"),
    column("On Hold", "On Hold", "#f59e0b"),
    column("To Receive and Bill", "To Receive & Bill", "#2563eb"),
    column("To Bill", "To Bill", "#7c3aed"),
    column("To Receive", "To Receive", "#0891b2"),
    column("Completed", "Completed", "#16a34a"),
];

pub const TASK_COLUMNS: &[StatusColumn] = &[
    column("Open", "Open", "#94a3b8"),
    column("Working", "Working", "#2563eb"),
    column("Pending Review", "Pending Review", "#7c3aed"),
    column("Overdue", "Overdue", "#dc2626"),
    column("Completed", "Completed", "#16a34a"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgingBucket {
    pub label: &'static str,
    pub min_days: i64,
    /// Inclusive; `None` is open-ended.
    pub max_days: Option<i64>,
}

pub const AGING_BUCKETS: [AgingBucket; 4] = [
    AgingBucket {
        label: "0-30",
        min_days: 0,
        max_days: Some(30),
    },
    AgingBucket {
        label: "31-60",
        min_days: 31,
        max_days: Some(60),
    },
    AgingBucket {
        label: "61-90",
        min_days: 61,
        max_days: Some(90),
    },
    AgingBucket {
        label: "90+",
        min_days: 91,
        max_days: None,
    },
];

/// Index into [`AGING_BUCKETS`]. Negative ages clamp to 0.
pub fn aging_bucket_index(days: i64) -> usize {
    let days = days.max(0);
    AGING_BUCKETS
        .iter()
        .position(|bucket| days >= bucket.min_days && bucket.max_days.is_none_or(|max| days <= max))
        .unwrap_or(AGING_BUCKETS.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aging_bounds_are_contiguous_and_start_at_zero() {
        assert_eq!(AGING_BUCKETS[0].min_days, 0);
        for pair in AGING_BUCKETS.windows(2) {
            assert_eq!(pair[0].max_days, Some(pair[1].min_days - 1));
        }
        assert_eq!(AGING_BUCKETS[AGING_BUCKETS.len() - 1].max_days, None);
    }

    #[test]
    fn aging_bucket_edges() {
        assert_eq!(AGING_BUCKETS[aging_bucket_index(0)].label, "0-30");
        assert_eq!(AGING_BUCKETS[aging_bucket_index(30)].label, "0-30");
        assert_eq!(AGING_BUCKETS[aging_bucket_index(31)].label, "31-60");
        assert_eq!(AGING_BUCKETS[aging_bucket_index(90)].label, "61-90");
        assert_eq!(AGING_BUCKETS[aging_bucket_index(91)].label, "90+");
        assert_eq!(AGING_BUCKETS[aging_bucket_index(-12)].label, "0-30");
    }

    #[test]
    fn status_tables_have_unique_statuses() {
        for table in [SALES_ORDER_COLUMNS, PURCHASE_ORDER_COLUMNS, TASK_COLUMNS] {
            let mut statuses: Vec<_> = table.iter().map(|c| c.status).collect();
            statuses.sort_unstable();
            statuses.dedup();
            assert_eq!(statuses.len(), table.len());
        }
    }

    #[test]
    fn palette_wraps() {
        assert_eq!(palette_color(0), palette_color(PALETTE.len()));
    }
}
