use std::fmt;

use clap::ValueEnum;
use erp_core::ErrorPayload;
use erp_core::error::codes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::client::RemoteError;
use crate::reports::Report;

/// Domain bucket a tool is registered under. Closed set: adding one is a
/// compile error everywhere categories are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Category {
    Sales,
    Purchasing,
    Inventory,
    Accounting,
    #[value(alias = "hr", alias = "human_resources")]
    HumanResources,
    Project,
    Manufacturing,
    Delivery,
    #[value(alias = "crm", alias = "customer_relationship")]
    CustomerRelationship,
    Assets,
    Setup,
    Analytics,
    Generic,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Sales,
        Category::Purchasing,
        Category::Inventory,
        Category::Accounting,
        Category::HumanResources,
        Category::Project,
        Category::Manufacturing,
        Category::Delivery,
        Category::CustomerRelationship,
        Category::Assets,
        Category::Setup,
        Category::Analytics,
        Category::Generic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Sales => "sales",
            Category::Purchasing => "purchasing",
            Category::Inventory => "inventory",
            Category::Accounting => "accounting",
            Category::HumanResources => "human-resources",
            Category::Project => "project",
            Category::Manufacturing => "manufacturing",
            Category::Delivery => "delivery",
            Category::CustomerRelationship => "customer-relationship",
            Category::Assets => "assets",
            Category::Setup => "setup",
            Category::Analytics => "analytics",
            Category::Generic => "generic",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Sales => "Customers, quotations, sales orders and invoices",
            Category::Purchasing => "Suppliers, purchase orders, invoices and material requests",
            Category::Inventory => "Items, warehouses, stock entries and bin levels",
            Category::Accounting => "Chart of accounts, journal and payment entries, ledger",
            Category::HumanResources => "Employees, leave, attendance and salary slips",
            Category::Project => "Projects, tasks and timesheets",
            Category::Manufacturing => "Bills of materials, work orders and job cards",
            Category::Delivery => "Delivery notes, shipments and delivery trips",
            Category::CustomerRelationship => "Leads, opportunities and contacts",
            Category::Assets => "Fixed assets, movements and maintenance",
            Category::Setup => "Companies, users, fiscal years and raw remote procedures",
            Category::Analytics => "Charts, KPI cards, pipelines and funnels built from live data",
            Category::Generic => "Operations on any document type by explicit doctype",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record-level action shared by typed and generic tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordAction {
    List,
    Get,
    Create,
    Update,
    Delete,
    Submit,
    Cancel,
}

impl RecordAction {
    pub const ALL: [RecordAction; 7] = [
        RecordAction::List,
        RecordAction::Get,
        RecordAction::Create,
        RecordAction::Update,
        RecordAction::Delete,
        RecordAction::Submit,
        RecordAction::Cancel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordAction::List => "list",
            RecordAction::Get => "get",
            RecordAction::Create => "create",
            RecordAction::Update => "update",
            RecordAction::Delete => "delete",
            RecordAction::Submit => "submit",
            RecordAction::Cancel => "cancel",
        }
    }

    pub fn needs_name(self) -> bool {
        !matches!(self, RecordAction::List | RecordAction::Create)
    }
}

/// What a tool does once its arguments pass validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Bound to one document type at registration.
    Record {
        doctype: &'static str,
        action: RecordAction,
        list_fields: &'static [&'static str],
    },
    /// Document type supplied by the caller in `doctype`.
    Generic(RecordAction),
    CallMethod,
    Report(Report),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredField {
    pub field: &'static str,
    pub message: String,
}

impl RequiredField {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            message: format!("'{field}' is required"),
        }
    }

    pub fn with_message(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Presentation resource a host can use to render a tool's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiResource {
    Chart,
    Kpi,
    Kanban,
    Funnel,
    Table,
}

impl UiResource {
    pub fn uri(self) -> &'static str {
        match self {
            UiResource::Chart => "ui://erp/chart",
            UiResource::Kpi => "ui://erp/kpi",
            UiResource::Kanban => "ui://erp/kanban",
            UiResource::Funnel => "ui://erp/funnel",
            UiResource::Table => "ui://erp/table",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub input_schema: Value,
    pub operation: Operation,
    pub required: Vec<RequiredField>,
    pub ui: Option<UiResource>,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{name}'; available tools: {}", .available.join(", "))]
    UnknownTool {
        name: String,
        available: Vec<String>,
        suggestion: Option<String>,
    },
    #[error("{tool}: {message}")]
    MissingField {
        tool: String,
        field: String,
        message: String,
    },
    #[error("{tool}: {message}")]
    InvalidArgument {
        tool: String,
        field: String,
        message: String,
    },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::UnknownTool { .. } => codes::UNKNOWN_TOOL,
            ToolError::MissingField { .. } => codes::MISSING_FIELD,
            ToolError::InvalidArgument { .. } => codes::INVALID_ARGUMENT,
            ToolError::Remote(err) => err.code(),
        }
    }

    pub fn to_payload(&self, tool: &str) -> ErrorPayload {
        let mut payload = ErrorPayload::new(self.code(), self.to_string());
        payload.tool = Some(tool.to_string());
        match self {
            ToolError::UnknownTool { suggestion, .. } => {
                payload.docs_hint = suggestion
                    .as_ref()
                    .map(|name| format!("Did you mean '{name}'?"));
            }
            ToolError::MissingField { field, .. } | ToolError::InvalidArgument { field, .. } => {
                payload.field = Some(field.clone());
            }
            ToolError::Remote(err) => {
                payload.status = Some(err.status());
                payload.remote = err.failure().map(|failure| failure.diagnostics());
                if err.failure().is_some_and(|f| f.has_field_messages) {
                    payload.docs_hint = Some(
                        "Field-level validation messages are in remote.body._server_messages"
                            .to_string(),
                    );
                }
            }
        }
        payload
    }

    pub fn to_value(&self, tool: &str) -> Value {
        serde_json::to_value(self.to_payload(tool)).unwrap_or(Value::Null)
    }
}

/// Arguments of one tool call, with typed accessors that report failures
/// against the calling tool.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub tool: &'a str,
    pub args: &'a Map<String, Value>,
}

impl<'a> Invocation<'a> {
    pub fn new(tool: &'a str, args: &'a Map<String, Value>) -> Self {
        Self { tool, args }
    }

    pub fn missing(&self, field: &str, message: impl Into<String>) -> ToolError {
        ToolError::MissingField {
            tool: self.tool.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid(&self, field: &str, message: impl Into<String>) -> ToolError {
        ToolError::InvalidArgument {
            tool: self.tool.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Present, non-null, and not an empty string or array.
    pub fn is_present(&self, key: &str) -> bool {
        match self.args.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(v)) => !v.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    pub fn required_str(&self, key: &str) -> Result<&'a str, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Err(self.missing(key, format!("'{key}' is required"))),
            Some(Value::String(v)) if v.trim().is_empty() => {
                Err(self.missing(key, format!("'{key}' must not be empty")))
            }
            Some(Value::String(v)) => Ok(v.as_str()),
            Some(_) => Err(self.invalid(key, format!("'{key}' must be a string"))),
        }
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<&'a str>, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
            Some(Value::String(v)) => Ok(Some(v.as_str())),
            Some(_) => Err(self.invalid(key, format!("'{key}' must be a string"))),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(v)) => Ok(*v),
            Some(_) => Err(self.invalid(key, format!("'{key}' must be a boolean"))),
        }
    }

    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(key, format!("'{key}' must be an unsigned integer"))),
            Some(_) => Err(self.invalid(key, format!("'{key}' must be an unsigned integer"))),
        }
    }

    pub fn optional_string_array(&self, key: &str) -> Result<Option<Vec<String>>, ToolError> {
        let Some(value) = self.args.get(key) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        let items = value
            .as_array()
            .ok_or_else(|| self.invalid(key, format!("'{key}' must be an array of strings")))?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let text = item
                .as_str()
                .ok_or_else(|| self.invalid(key, format!("'{key}' items must be strings")))?;
            let normalized = text.trim();
            if !normalized.is_empty() {
                out.push(normalized.to_string());
            }
        }
        Ok(Some(out))
    }

    pub fn required_object(&self, key: &str) -> Result<Map<String, Value>, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Err(self.missing(key, format!("'{key}' is required"))),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(self.invalid(key, format!("'{key}' must be an object"))),
        }
    }

    pub fn optional_object(&self, key: &str) -> Result<Option<Map<String, Value>>, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(self.invalid(key, format!("'{key}' must be an object"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn category_parses_canonical_names_and_aliases() {
        let parse = |raw: &str| <Category as ValueEnum>::from_str(raw, true);
        assert_eq!(parse("sales"), Ok(Category::Sales));
        assert_eq!(parse("HR"), Ok(Category::HumanResources));
        assert_eq!(parse("crm"), Ok(Category::CustomerRelationship));
        assert_eq!(parse("human_resources"), Ok(Category::HumanResources));
        assert!(parse("payroll").is_err());
    }

    #[test]
    fn command_line_names_match_wire_names() {
        assert_eq!(Category::value_variants(), &Category::ALL[..]);
        for category in Category::ALL {
            let value = category.to_possible_value().unwrap();
            assert_eq!(value.get_name(), category.as_str());
            assert!(!category.description().is_empty());
        }
    }

    #[test]
    fn required_field_default_message_names_field() {
        assert_eq!(RequiredField::new("customer").message, "'customer' is required");
    }

    #[test]
    fn required_str_distinguishes_missing_from_wrong_type() {
        let args = args(json!({"name": 7, "empty": "  "}));
        let call = Invocation::new("customer_get", &args);

        let missing = call.required_str("customer").expect_err("absent");
        assert_eq!(missing.code(), "missing_field");
        assert_eq!(missing.to_string(), "customer_get: 'customer' is required");

        let wrong = call.required_str("name").expect_err("number");
        assert_eq!(wrong.code(), "invalid_argument");

        let empty = call.required_str("empty").expect_err("blank");
        assert_eq!(empty.code(), "missing_field");
    }

    #[test]
    fn string_array_trims_and_drops_blanks() {
        let args = args(json!({"fields": ["name", " grand_total ", ""]}));
        let call = Invocation::new("sales_order_list", &args);
        assert_eq!(
            call.optional_string_array("fields").unwrap(),
            Some(vec!["name".to_string(), "grand_total".to_string()])
        );
        assert_eq!(call.optional_string_array("absent").unwrap(), None);
    }

    #[test]
    fn missing_field_payload_carries_field_and_tool() {
        let err = ToolError::MissingField {
            tool: "customer_create".into(),
            field: "customer_name".into(),
            message: "'customer_name' is required".into(),
        };
        let value = err.to_value("customer_create");
        assert_eq!(value["error"], "missing_field");
        assert_eq!(value["field"], "customer_name");
        assert_eq!(value["tool"], "customer_create");
        assert_eq!(value["message"], "customer_create: 'customer_name' is required");
    }

    #[test]
    fn unknown_tool_payload_lists_available_and_hint() {
        let err = ToolError::UnknownTool {
            name: "custmer_list".into(),
            available: vec!["customer_list".into(), "item_list".into()],
            suggestion: Some("customer_list".into()),
        };
        let value = err.to_value("custmer_list");
        assert_eq!(value["error"], "unknown_tool");
        assert!(value["message"].as_str().unwrap().contains("customer_list, item_list"));
        assert_eq!(value["docsHint"], "Did you mean 'customer_list'?");
    }
}
