//! Analytics tools: fetch a bounded slice of live records, then hand them to
//! the aggregation engine. The reference date is read here, once per call.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use erp_core::{ChartKind, Filter, FilterOperator, ListOptions};
use serde::Serialize;
use serde_json::{Value, json};

use crate::aggregate::aging::{AgingSpec, build_aging};
use crate::aggregate::categorical::{CategoricalSpec, build_categorical};
use crate::aggregate::composed::{ComposedSpec, SeriesSpec, build_composed};
use crate::aggregate::funnel::{StageInput, build_funnel};
use crate::aggregate::kpi::{KpiSpec, build_kpi};
use crate::aggregate::pipeline::{PipelineSpec, build_pipeline};
use crate::aggregate::radar::{RadarDimension, RadarSpec, build_radar, busiest_entities};
use crate::aggregate::scatter::{ScatterSpec, build_scatter, entity_points};
use crate::aggregate::tables::{
    PURCHASE_ORDER_COLUMNS, SALES_ORDER_COLUMNS, SPARKLINE_MONTHS, TASK_COLUMNS,
};
use crate::aggregate::timeseries::{TimeSeriesSpec, build_time_series, month_window};
use crate::aggregate::treemap::{build_treemap, flatten_leaves, tree_from_parent_links};
use crate::aggregate::{Metric, number, text};
use crate::client::RemoteRecordClient;
use crate::tool::{Invocation, ToolError, UiResource};

const PIPELINE_FETCH_CAP: u32 = 500;
const CHART_FETCH_CAP: u32 = 1000;
const FUNNEL_STAGE_FETCH_CAP: u32 = 500;
const ACCOUNT_FETCH_CAP: u32 = 1000;
const KPI_FETCH_CAP: u32 = 1000;
const RADAR_DEFAULT_ENTITIES: usize = 3;
const PIPELINE_ITEMS_PER_COLUMN: usize = 25;
const DEFAULT_MONTHS: u64 = 12;
const MAX_MONTHS: u64 = 36;
const DEFAULT_TOP: u64 = 10;
const MAX_TOP: u64 = 50;
const FUNNEL_DEFAULT_DAYS: u64 = 90;
const FUNNEL_MAX_DAYS: u64 = 3650;

/// Submitted, not cancelled.
const SUBMITTED: (&str, i64) = ("docstatus", 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Report {
    SalesPipeline,
    PurchasePipeline,
    TaskBoard,
    SalesByCustomer,
    SalesByTerritory,
    StockByWarehouse,
    SalesTrend,
    RevenueVsOrders,
    CustomerRadar,
    CustomerOrderScatter,
    ExpenseTreemap,
    ReceivablesAging,
    PayablesAging,
    SalesFunnel,
    KpiRevenue,
    KpiOpenOrders,
    KpiOverdueReceivables,
    KpiNewCustomers,
}

impl Report {
    pub const ALL: [Report; 18] = [
        Report::SalesPipeline,
        Report::PurchasePipeline,
        Report::TaskBoard,
        Report::SalesByCustomer,
        Report::SalesByTerritory,
        Report::StockByWarehouse,
        Report::SalesTrend,
        Report::RevenueVsOrders,
        Report::CustomerRadar,
        Report::CustomerOrderScatter,
        Report::ExpenseTreemap,
        Report::ReceivablesAging,
        Report::PayablesAging,
        Report::SalesFunnel,
        Report::KpiRevenue,
        Report::KpiOpenOrders,
        Report::KpiOverdueReceivables,
        Report::KpiNewCustomers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Report::SalesPipeline => "sales_pipeline",
            Report::PurchasePipeline => "purchase_pipeline",
            Report::TaskBoard => "task_board",
            Report::SalesByCustomer => "sales_by_customer",
            Report::SalesByTerritory => "sales_by_territory",
            Report::StockByWarehouse => "stock_by_warehouse",
            Report::SalesTrend => "sales_trend",
            Report::RevenueVsOrders => "revenue_vs_orders",
            Report::CustomerRadar => "customer_radar",
            Report::CustomerOrderScatter => "customer_order_scatter",
            Report::ExpenseTreemap => "expense_treemap",
            Report::ReceivablesAging => "receivables_aging",
            Report::PayablesAging => "payables_aging",
            Report::SalesFunnel => "sales_funnel",
            Report::KpiRevenue => "kpi_revenue",
            Report::KpiOpenOrders => "kpi_open_orders",
            Report::KpiOverdueReceivables => "kpi_overdue_receivables",
            Report::KpiNewCustomers => "kpi_new_customers",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Report::SalesPipeline => "Kanban board of sales orders by status with order totals per column.",
            Report::PurchasePipeline => "Kanban board of purchase orders by status with order totals per column.",
            Report::TaskBoard => "Kanban board of tasks by status. Optional 'project' narrows to one project.",
            Report::SalesByCustomer => "Bar chart of submitted invoice revenue per customer, largest first. 'top' limits the customer count.",
            Report::SalesByTerritory => "Donut chart of submitted invoice revenue share per territory.",
            Report::StockByWarehouse => "Bar chart of stock value per warehouse from bin levels.",
            Report::SalesTrend => "Monthly revenue line over 'months' months (default 12). 'split_by_customer' stacks the top five customers.",
            Report::RevenueVsOrders => "Composed chart: monthly revenue as bars (left axis) and order count as a line (right axis).",
            Report::CustomerRadar => "Radar comparing customers on revenue, invoice count, average invoice and outstanding amount, scaled 0-100 within the selection.",
            Report::CustomerOrderScatter => "Scatter of customers: invoice count (x) against revenue (y). Falls back to sales orders when there are no invoices.",
            Report::ExpenseTreemap => "Treemap of net booked expense per leaf expense account.",
            Report::ReceivablesAging => "Outstanding customer invoices by age bucket (0-30, 31-60, 61-90, 90+ days past due).",
            Report::PayablesAging => "Outstanding supplier invoices by age bucket (0-30, 31-60, 61-90, 90+ days past due).",
            Report::SalesFunnel => "Lead to opportunity to quotation to sales order funnel with stage conversion over the last 'days' days (default 90).",
            Report::KpiRevenue => "KPI card: invoiced revenue month to date vs the same days of last month, with a six-month sparkline.",
            Report::KpiOpenOrders => "KPI card: number of submitted sales orders still to deliver or bill.",
            Report::KpiOverdueReceivables => "KPI card: total outstanding on customer invoices past their due date.",
            Report::KpiNewCustomers => "KPI card: customers created month to date vs the same days of last month, with a six-month sparkline.",
        }
    }

    pub fn ui(self) -> UiResource {
        match self {
            Report::SalesPipeline | Report::PurchasePipeline | Report::TaskBoard => {
                UiResource::Kanban
            }
            Report::SalesFunnel => UiResource::Funnel,
            Report::KpiRevenue
            | Report::KpiOpenOrders
            | Report::KpiOverdueReceivables
            | Report::KpiNewCustomers => UiResource::Kpi,
            Report::SalesByCustomer
            | Report::SalesByTerritory
            | Report::StockByWarehouse
            | Report::SalesTrend
            | Report::RevenueVsOrders
            | Report::CustomerRadar
            | Report::CustomerOrderScatter
            | Report::ExpenseTreemap
            | Report::ReceivablesAging
            | Report::PayablesAging => UiResource::Chart,
        }
    }

    pub fn input_schema(self) -> Value {
        let mut properties = serde_json::Map::new();
        match self {
            Report::TaskBoard => {
                properties.insert(
                    "project".into(),
                    json!({ "type": "string", "description": "Project name to narrow the board to" }),
                );
            }
            Report::SalesByCustomer | Report::StockByWarehouse => {
                properties.insert("top".into(), top_schema());
            }
            Report::SalesTrend => {
                properties.insert("months".into(), months_schema());
                properties.insert(
                    "split_by_customer".into(),
                    json!({ "type": "boolean", "description": "One stacked series per top customer" }),
                );
            }
            Report::RevenueVsOrders => {
                properties.insert("months".into(), months_schema());
            }
            Report::CustomerRadar => {
                properties.insert(
                    "customers".into(),
                    json!({
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Customers to compare; defaults to the three with most invoices"
                    }),
                );
            }
            Report::SalesFunnel => {
                properties.insert(
                    "days".into(),
                    json!({ "type": "integer", "minimum": 1, "description": "Lookback in days (default 90)" }),
                );
            }
            _ => {}
        }
        json!({ "type": "object", "properties": properties })
    }

    pub async fn run(
        self,
        client: &RemoteRecordClient,
        call: &Invocation<'_>,
        today: NaiveDate,
    ) -> Result<Value, ToolError> {
        tracing::debug!(report = self.name(), %today, "building report");
        let payload = match self {
            Report::SalesPipeline => {
                let rows = fetch(
                    client,
                    "Sales Order",
                    &["name", "customer", "status", "grand_total", "transaction_date"],
                    vec![Filter::new("docstatus", FilterOperator::Lt, 2)],
                    PIPELINE_FETCH_CAP,
                )
                .await?;
                to_json(build_pipeline(
                    &rows,
                    &PipelineSpec {
                        title: "Sales Pipeline",
                        status_field: "status",
                        amount_field: Some("grand_total"),
                        title_field: Some("customer"),
                        date_field: Some("transaction_date"),
                        columns: SALES_ORDER_COLUMNS,
                        max_items: PIPELINE_ITEMS_PER_COLUMN,
                    },
                ))
            }
            Report::PurchasePipeline => {
                let rows = fetch(
                    client,
                    "Purchase Order",
                    &["name", "supplier", "status", "grand_total", "transaction_date"],
                    vec![Filter::new("docstatus", FilterOperator::Lt, 2)],
                    PIPELINE_FETCH_CAP,
                )
                .await?;
                to_json(build_pipeline(
                    &rows,
                    &PipelineSpec {
                        title: "Purchase Pipeline",
                        status_field: "status",
                        amount_field: Some("grand_total"),
                        title_field: Some("supplier"),
                        date_field: Some("transaction_date"),
                        columns: PURCHASE_ORDER_COLUMNS,
                        max_items: PIPELINE_ITEMS_PER_COLUMN,
                    },
                ))
            }
            Report::TaskBoard => {
                let mut filters = Vec::new();
                if let Some(project) = call.optional_str("project")? {
                    filters.push(Filter::eq("project", project));
                }
                let rows = fetch(
                    client,
                    "Task",
                    &["name", "subject", "status", "exp_end_date"],
                    filters,
                    PIPELINE_FETCH_CAP,
                )
                .await?;
                to_json(build_pipeline(
                    &rows,
                    &PipelineSpec {
                        title: "Task Board",
                        status_field: "status",
                        amount_field: None,
                        title_field: Some("subject"),
                        date_field: Some("exp_end_date"),
                        columns: TASK_COLUMNS,
                        max_items: PIPELINE_ITEMS_PER_COLUMN,
                    },
                ))
            }
            Report::SalesByCustomer => {
                let rows = fetch(
                    client,
                    "Sales Invoice",
                    &["customer", "grand_total"],
                    vec![submitted()],
                    CHART_FETCH_CAP,
                )
                .await?;
                to_json(build_categorical(
                    &rows,
                    &CategoricalSpec {
                        title: "Sales by Customer",
                        dimension: "customer",
                        metric: Metric::Sum("grand_total"),
                        series_label: "Revenue",
                        top_n: top(call)?,
                        share: false,
                    },
                ))
            }
            Report::SalesByTerritory => {
                let rows = fetch(
                    client,
                    "Sales Invoice",
                    &["territory", "grand_total"],
                    vec![submitted()],
                    CHART_FETCH_CAP,
                )
                .await?;
                to_json(build_categorical(
                    &rows,
                    &CategoricalSpec {
                        title: "Sales by Territory",
                        dimension: "territory",
                        metric: Metric::Sum("grand_total"),
                        series_label: "Revenue",
                        top_n: MAX_TOP as usize,
                        share: true,
                    },
                ))
            }
            Report::StockByWarehouse => {
                let rows = fetch(
                    client,
                    "Bin",
                    &["warehouse", "actual_qty", "stock_value"],
                    Vec::new(),
                    CHART_FETCH_CAP,
                )
                .await?;
                to_json(build_categorical(
                    &rows,
                    &CategoricalSpec {
                        title: "Stock Value by Warehouse",
                        dimension: "warehouse",
                        metric: Metric::Sum("stock_value"),
                        series_label: "Stock Value",
                        top_n: top(call)?,
                        share: false,
                    },
                ))
            }
            Report::SalesTrend => {
                let months = months(call)?;
                let split = call.bool_or("split_by_customer", false)?;
                let rows = fetch(
                    client,
                    "Sales Invoice",
                    &["customer", "posting_date", "grand_total"],
                    vec![submitted(), since("posting_date", today, months)],
                    CHART_FETCH_CAP,
                )
                .await?;
                to_json(build_time_series(
                    &rows,
                    &TimeSeriesSpec {
                        title: "Sales Trend",
                        date_field: "posting_date",
                        metric: Metric::Sum("grand_total"),
                        series_label: "Revenue",
                        months,
                        kind: if split {
                            ChartKind::StackedBar
                        } else {
                            ChartKind::Line
                        },
                        split_by: split.then_some("customer"),
                    },
                    today,
                ))
            }
            Report::RevenueVsOrders => {
                let months = months(call)?;
                let rows = fetch(
                    client,
                    "Sales Order",
                    &["transaction_date", "grand_total"],
                    vec![submitted(), since("transaction_date", today, months)],
                    CHART_FETCH_CAP,
                )
                .await?;
                to_json(build_composed(
                    &rows,
                    &ComposedSpec {
                        title: "Revenue vs Orders",
                        date_field: "transaction_date",
                        months,
                        bars: SeriesSpec {
                            label: "Revenue",
                            metric: Metric::Sum("grand_total"),
                        },
                        line: SeriesSpec {
                            label: "Orders",
                            metric: Metric::Count,
                        },
                    },
                    today,
                ))
            }
            Report::CustomerRadar => {
                let rows = fetch(
                    client,
                    "Sales Invoice",
                    &["customer", "grand_total", "outstanding_amount"],
                    vec![submitted()],
                    CHART_FETCH_CAP,
                )
                .await?;
                let entities = match call.optional_string_array("customers")? {
                    Some(customers) if !customers.is_empty() => customers,
                    _ => busiest_entities(&rows, "customer", RADAR_DEFAULT_ENTITIES),
                };
                to_json(build_radar(
                    &rows,
                    &RadarSpec {
                        title: "Customer Comparison",
                        entity_field: "customer",
                        dimensions: vec![
                            RadarDimension {
                                label: "Revenue",
                                metric: Metric::Sum("grand_total"),
                            },
                            RadarDimension {
                                label: "Invoices",
                                metric: Metric::Count,
                            },
                            RadarDimension {
                                label: "Average Invoice",
                                metric: Metric::Average("grand_total"),
                            },
                            RadarDimension {
                                label: "Outstanding",
                                metric: Metric::Sum("outstanding_amount"),
                            },
                        ],
                        entities,
                    },
                ))
            }
            Report::CustomerOrderScatter => {
                let spec = ScatterSpec {
                    entity_field: "customer",
                    x: Metric::Count,
                    y: Metric::Sum("grand_total"),
                };
                let fields = ["customer", "grand_total"];
                let invoices = fetch(client, "Sales Invoice", &fields, vec![submitted()], CHART_FETCH_CAP)
                    .await?;
                let primary = entity_points(&invoices, &spec);
                let fallback = if primary.is_empty() {
                    let orders = fetch(client, "Sales Order", &fields, vec![submitted()], CHART_FETCH_CAP)
                        .await?;
                    entity_points(&orders, &spec)
                } else {
                    Vec::new()
                };
                to_json(build_scatter(
                    "Customers: Invoices vs Revenue",
                    primary,
                    fallback,
                    "Sales Order",
                ))
            }
            Report::ExpenseTreemap => {
                let accounts = fetch(
                    client,
                    "Account",
                    &["name", "parent_account", "is_group"],
                    vec![Filter::eq("root_type", "Expense")],
                    ACCOUNT_FETCH_CAP,
                )
                .await?;
                let leaf_accounts: Vec<Value> = accounts
                    .iter()
                    .filter(|a| number(a, "is_group") == 0.0)
                    .filter_map(|a| text(a, "name").map(|n| Value::String(n.to_string())))
                    .collect();
                let entries = if leaf_accounts.is_empty() {
                    Vec::new()
                } else {
                    fetch(
                        client,
                        "GL Entry",
                        &["account", "debit", "credit"],
                        vec![
                            Filter::eq("is_cancelled", 0),
                            Filter::new("account", FilterOperator::In, Value::Array(leaf_accounts)),
                        ],
                        CHART_FETCH_CAP,
                    )
                    .await?
                };
                let mut net: BTreeMap<String, f64> = BTreeMap::new();
                for entry in &entries {
                    if let Some(account) = text(entry, "account") {
                        *net.entry(account.to_string()).or_default() +=
                            number(entry, "debit") - number(entry, "credit");
                    }
                }
                let tree = tree_from_parent_links(&accounts, "name", "parent_account", &net);
                let leaves = flatten_leaves(&tree)
                    .into_iter()
                    .filter(|leaf| leaf.value > 0.0)
                    .collect();
                to_json(build_treemap("Expenses by Account", leaves))
            }
            Report::ReceivablesAging => {
                let rows = outstanding(client, "Sales Invoice", "customer").await?;
                to_json(build_aging(
                    &rows,
                    &AgingSpec {
                        title: "Receivables Aging",
                        primary_date: "due_date",
                        fallback_date: "posting_date",
                        amount_field: "outstanding_amount",
                    },
                    today,
                ))
            }
            Report::PayablesAging => {
                let rows = outstanding(client, "Purchase Invoice", "supplier").await?;
                to_json(build_aging(
                    &rows,
                    &AgingSpec {
                        title: "Payables Aging",
                        primary_date: "due_date",
                        fallback_date: "posting_date",
                        amount_field: "outstanding_amount",
                    },
                    today,
                ))
            }
            Report::SalesFunnel => {
                let days = call
                    .optional_u64("days")?
                    .map_or(FUNNEL_DEFAULT_DAYS, |d| d.clamp(1, FUNNEL_MAX_DAYS));
                let from = (today - Days::new(days)).format("%Y-%m-%d").to_string();
                let created_since = || Filter::new("creation", FilterOperator::Gte, from.as_str());

                let leads = fetch(client, "Lead", &["name"], vec![created_since()], FUNNEL_STAGE_FETCH_CAP).await?;
                let opportunities = fetch(
                    client,
                    "Opportunity",
                    &["name", "opportunity_amount"],
                    vec![created_since()],
                    FUNNEL_STAGE_FETCH_CAP,
                )
                .await?;
                let quotations = fetch(
                    client,
                    "Quotation",
                    &["name", "grand_total"],
                    vec![submitted(), created_since()],
                    FUNNEL_STAGE_FETCH_CAP,
                )
                .await?;
                let orders = fetch(
                    client,
                    "Sales Order",
                    &["name", "grand_total"],
                    vec![submitted(), created_since()],
                    FUNNEL_STAGE_FETCH_CAP,
                )
                .await?;
                to_json(build_funnel(
                    "Sales Funnel",
                    &[
                        StageInput { label: "Leads", records: &leads, amount_field: None },
                        StageInput {
                            label: "Opportunities",
                            records: &opportunities,
                            amount_field: Some("opportunity_amount"),
                        },
                        StageInput { label: "Quotations", records: &quotations, amount_field: Some("grand_total") },
                        StageInput { label: "Sales Orders", records: &orders, amount_field: Some("grand_total") },
                    ],
                ))
            }
            Report::KpiRevenue => {
                let rows = fetch(
                    client,
                    "Sales Invoice",
                    &["posting_date", "grand_total"],
                    vec![submitted(), since("posting_date", today, SPARKLINE_MONTHS)],
                    KPI_FETCH_CAP,
                )
                .await?;
                to_json(build_kpi(
                    &rows,
                    &KpiSpec {
                        label: "Revenue this month",
                        metric: Metric::Sum("grand_total"),
                        date_field: Some("posting_date"),
                        up_is_good: true,
                        sparkline: true,
                        unit: Some("currency"),
                    },
                    today,
                ))
            }
            Report::KpiOpenOrders => {
                let rows = fetch(
                    client,
                    "Sales Order",
                    &["name"],
                    vec![
                        submitted(),
                        Filter::new(
                            "status",
                            FilterOperator::In,
                            json!(["To Deliver and Bill", "To Bill", "To Deliver"]),
                        ),
                    ],
                    KPI_FETCH_CAP,
                )
                .await?;
                to_json(build_kpi(
                    &rows,
                    &KpiSpec {
                        label: "Open sales orders",
                        metric: Metric::Count,
                        date_field: None,
                        up_is_good: true,
                        sparkline: false,
                        unit: None,
                    },
                    today,
                ))
            }
            Report::KpiOverdueReceivables => {
                let rows = fetch(
                    client,
                    "Sales Invoice",
                    &["name", "outstanding_amount"],
                    vec![
                        submitted(),
                        Filter::new("outstanding_amount", FilterOperator::Gt, 0),
                        Filter::new("due_date", FilterOperator::Lt, today.format("%Y-%m-%d").to_string()),
                    ],
                    KPI_FETCH_CAP,
                )
                .await?;
                to_json(build_kpi(
                    &rows,
                    &KpiSpec {
                        label: "Overdue receivables",
                        metric: Metric::Sum("outstanding_amount"),
                        date_field: None,
                        up_is_good: false,
                        sparkline: false,
                        unit: Some("currency"),
                    },
                    today,
                ))
            }
            Report::KpiNewCustomers => {
                let rows = fetch(
                    client,
                    "Customer",
                    &["name", "creation"],
                    vec![since("creation", today, SPARKLINE_MONTHS)],
                    KPI_FETCH_CAP,
                )
                .await?;
                to_json(build_kpi(
                    &rows,
                    &KpiSpec {
                        label: "New customers this month",
                        metric: Metric::Count,
                        date_field: Some("creation"),
                        up_is_good: true,
                        sparkline: true,
                        unit: None,
                    },
                    today,
                ))
            }
        };
        Ok(payload)
    }
}

async fn fetch(
    client: &RemoteRecordClient,
    doctype: &str,
    fields: &[&str],
    filters: Vec<Filter>,
    cap: u32,
) -> Result<Vec<Value>, ToolError> {
    let mut options = ListOptions::new().fields(fields.iter().copied()).limit(cap);
    options.filters = filters;
    let rows = client.list(doctype, &options).await?;
    if rows.len() as u32 >= cap {
        tracing::warn!(doctype, cap, "report input hit the fetch cap; result may be partial");
    }
    Ok(rows)
}

async fn outstanding(client: &RemoteRecordClient, doctype: &str, party: &str) -> Result<Vec<Value>, ToolError> {
    fetch(
        client,
        doctype,
        &["name", party, "due_date", "posting_date", "outstanding_amount"],
        vec![submitted(), Filter::new("outstanding_amount", FilterOperator::Gt, 0)],
        CHART_FETCH_CAP,
    )
    .await
}

fn submitted() -> Filter {
    Filter::eq(SUBMITTED.0, SUBMITTED.1)
}

/// Lower bound on `field` at the first day of the window's oldest month.
fn since(field: &str, today: NaiveDate, months: u32) -> Filter {
    let start = month_window(today, months)
        .first()
        .and_then(|ym| ym.first_day())
        .unwrap_or(today);
    Filter::new(field, FilterOperator::Gte, start.format("%Y-%m-%d").to_string())
}

fn months(call: &Invocation<'_>) -> Result<u32, ToolError> {
    Ok(call
        .optional_u64("months")?
        .unwrap_or(DEFAULT_MONTHS)
        .clamp(1, MAX_MONTHS) as u32)
}

fn top(call: &Invocation<'_>) -> Result<usize, ToolError> {
    Ok(call.optional_u64("top")?.unwrap_or(DEFAULT_TOP).clamp(1, MAX_TOP) as usize)
}

fn months_schema() -> Value {
    json!({ "type": "integer", "minimum": 1, "maximum": MAX_MONTHS, "description": "Months to cover, ending with the current month" })
}

fn top_schema() -> Value {
    json!({ "type": "integer", "minimum": 1, "maximum": MAX_TOP, "description": "Number of categories to keep" })
}

fn to_json<T: Serialize>(payload: T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}
