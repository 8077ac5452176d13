use std::collections::BTreeMap;

use erp_core::{PipelineColumn, PipelinePayload, RecordSummary};
use serde_json::Value;

use super::tables::StatusColumn;
use super::{number, round2, text};

#[derive(Debug, Clone, Copy)]
pub struct PipelineSpec<'a> {
    pub title: &'a str,
    pub status_field: &'a str,
    pub amount_field: Option<&'a str>,
    pub title_field: Option<&'a str>,
    pub date_field: Option<&'a str>,
    pub columns: &'a [StatusColumn],
    /// Record summaries kept per column; counts and totals still cover all.
    pub max_items: usize,
}

/// Kanban board: one column per row of the status table, in table order,
/// empty columns included. Records whose status has no column are left out.
pub fn build_pipeline(records: &[Value], spec: &PipelineSpec<'_>) -> PipelinePayload {
    let mut grouped: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for record in records {
        let Some(status) = text(record, spec.status_field) else {
            continue;
        };
        if spec.columns.iter().any(|column| column.status == status) {
            grouped.entry(status).or_default().push(record);
        }
    }

    let columns = spec
        .columns
        .iter()
        .map(|column| {
            let members = grouped.get(column.status).map(Vec::as_slice).unwrap_or_default();
            let total: f64 = spec
                .amount_field
                .map(|field| members.iter().map(|r| number(r, field)).sum())
                .unwrap_or(0.0);
            let items = members
                .iter()
                .take(spec.max_items)
                .map(|record| summarize(record, spec))
                .collect();
            PipelineColumn {
                status: column.status.to_string(),
                label: column.label.to_string(),
                color: column.color.to_string(),
                count: members.len(),
                total: round2(total),
                items,
            }
        })
        .collect();

    PipelinePayload {
        title: spec.title.to_string(),
        columns,
    }
}

fn summarize(record: &Value, spec: &PipelineSpec<'_>) -> RecordSummary {
    RecordSummary {
        name: text(record, "name").unwrap_or_default().to_string(),
        title: spec
            .title_field
            .and_then(|field| text(record, field))
            .map(str::to_string),
        amount: spec
            .amount_field
            .map(|field| round2(number(record, field)))
            .unwrap_or(0.0),
        date: spec
            .date_field
            .and_then(|field| text(record, field))
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tables::SALES_ORDER_COLUMNS;
    use serde_json::json;

    fn spec() -> PipelineSpec<'static> {
        PipelineSpec {
            title: "Sales Pipeline",
            status_field: "status",
            amount_field: Some("grand_total"),
            title_field: Some("customer"),
            date_field: None,
            columns: SALES_ORDER_COLUMNS,
            max_items: 20,
        }
    }

    fn column<'p>(payload: &'p PipelinePayload, status: &str) -> &'p PipelineColumn {
        payload
            .columns
            .iter()
            .find(|c| c.status == status)
            .expect("column present")
    }

    #[test]
    fn groups_counts_and_sums_per_status() {
        let records = vec![
            json!({"name": "SO-1", "status": "Draft", "grand_total": 1000, "customer": "A"}),
            json!({"name": "SO-2", "status": "Draft", "grand_total": 2000, "customer": "B"}),
            json!({"name": "SO-3", "status": "Completed", "grand_total": 1500, "customer": "A"}),
        ];
        let payload = build_pipeline(&records, &spec());

        let draft = column(&payload, "Draft");
        assert_eq!((draft.count, draft.total), (2, 3000.0));
        assert_eq!(draft.items[1].title.as_deref(), Some("B"));
        let completed = column(&payload, "Completed");
        assert_eq!((completed.count, completed.total), (1, 1500.0));
        assert_eq!(column(&payload, "To Bill").count, 0);
    }

    #[test]
    fn emits_every_mapped_column_in_table_order_and_drops_unmapped() {
        let records = vec![
            json!({"name": "SO-9", "status": "Closed", "grand_total": 99}),
            json!({"name": "SO-8", "status": "To Bill", "grand_total": 10}),
        ];
        let payload = build_pipeline(&records, &spec());
        let statuses: Vec<_> = payload.columns.iter().map(|c| c.status.as_str()).collect();
        let expected: Vec<_> = SALES_ORDER_COLUMNS.iter().map(|c| c.status).collect();
        assert_eq!(statuses, expected);
        let counted: usize = payload.columns.iter().map(|c| c.count).sum();
        assert_eq!(counted, 1);
    }

    #[test]
    fn item_cap_does_not_change_totals() {
        let records: Vec<_> = (0..5)
            .map(|i| json!({"name": format!("SO-{i}"), "status": "Draft", "grand_total": 10}))
            .collect();
        let mut spec = spec();
        spec.max_items = 2;
        let payload = build_pipeline(&records, &spec);
        let draft = column(&payload, "Draft");
        assert_eq!(draft.items.len(), 2);
        assert_eq!((draft.count, draft.total), (5, 50.0));
    }
}
