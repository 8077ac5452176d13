use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::catalog::{DOCTYPES, DoctypeEntry, FieldKind};
use crate::handlers::MAX_LIST_LIMIT;
use crate::reports::Report;
use crate::tool::{Category, Operation, RecordAction, RequiredField, ToolDefinition, UiResource};

const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Every tool the process exposes, in registration order.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Register the given categories; an empty slice registers all of them.
    pub fn new(categories: &[Category]) -> Self {
        let enabled = |category: Category| categories.is_empty() || categories.contains(&category);

        let mut tools = Vec::new();
        for entry in DOCTYPES.iter().filter(|e| enabled(e.category)) {
            tools.extend(entry.actions.iter().map(|action| record_tool(entry, *action)));
        }
        if enabled(Category::Setup) {
            tools.push(call_method_tool());
        }
        if enabled(Category::Analytics) {
            tools.extend(Report::ALL.into_iter().map(report_tool));
        }
        if enabled(Category::Generic) {
            tools.extend(RecordAction::ALL.into_iter().map(generic_tool));
        }

        let by_name = tools
            .iter()
            .enumerate()
            .map(|(index, tool)| (tool.name.clone(), index))
            .collect();
        Self { tools, by_name }
    }

    pub fn all() -> Self {
        Self::new(&[])
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.by_name.get(name).map(|index| &self.tools[*index])
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().filter(move |tool| tool.category == category)
    }

    /// Closest registered name, if any is similar enough to be a likely typo.
    pub fn suggest(&self, name: &str) -> Option<String> {
        self.tools
            .iter()
            .map(|tool| (strsim::jaro_winkler(name, &tool.name), &tool.name))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate.clone())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::all()
    }
}

fn record_tool(entry: &DoctypeEntry, action: RecordAction) -> ToolDefinition {
    let doctype = entry.doctype;
    let (description, input_schema, required) = match action {
        RecordAction::List => (
            format!(
                "List {doctype} records. Returns {{doctype, count, data}}. Default fields: {}.",
                entry.list_fields.join(", ")
            ),
            list_schema(false),
            Vec::new(),
        ),
        RecordAction::Create => {
            let required = entry
                .create_fields
                .iter()
                .map(|field| match field.message {
                    Some(message) => RequiredField::with_message(field.name, message),
                    None => RequiredField::new(field.name),
                })
                .collect();
            let mut properties = Map::new();
            for field in entry.create_fields {
                properties.insert(field.name.to_string(), field_schema(field.kind));
            }
            let names: Vec<&str> = entry.create_fields.iter().map(|f| f.name).collect();
            (
                format!(
                    "Create a {doctype} as a draft. Pass document fields as arguments; other {doctype} fields are accepted too."
                ),
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": names,
                    "additionalProperties": true
                }),
                required,
            )
        }
        RecordAction::Get => (
            format!("Fetch one {doctype} by name, including child tables."),
            name_schema(false, None),
            vec![RequiredField::new("name")],
        ),
        RecordAction::Update => (
            format!("Update fields of a draft {doctype}. 'data' holds only the fields to change."),
            name_schema(false, Some(data_property("Fields to change"))),
            vec![RequiredField::new("name"), RequiredField::new("data")],
        ),
        RecordAction::Delete => (
            format!("Delete a {doctype}. Submitted documents must be cancelled first."),
            name_schema(false, None),
            vec![RequiredField::new("name")],
        ),
        RecordAction::Submit => (
            format!(
                "Submit a draft {doctype}. The latest copy is fetched first so the remote concurrency check sees the current version."
            ),
            name_schema(false, None),
            vec![RequiredField::new("name")],
        ),
        RecordAction::Cancel => (
            format!("Cancel a submitted {doctype}."),
            name_schema(false, None),
            vec![RequiredField::new("name")],
        ),
    };

    ToolDefinition {
        name: format!("{}_{}", entry.slug, action.as_str()),
        description,
        category: entry.category,
        input_schema,
        operation: Operation::Record {
            doctype,
            action,
            list_fields: entry.list_fields,
        },
        required,
        ui: (action == RecordAction::List).then_some(UiResource::Table),
    }
}

fn generic_tool(action: RecordAction) -> ToolDefinition {
    let doctype_required = RequiredField::with_message(
        "doctype",
        "'doctype' is required, e.g. \"Sales Order\"",
    );
    let (description, input_schema, mut required) = match action {
        RecordAction::List => (
            "List records of any doctype. Returns {doctype, count, data}.",
            list_schema(true),
            Vec::new(),
        ),
        RecordAction::Create => (
            "Create a draft document of any doctype from 'data'.",
            json!({
                "type": "object",
                "properties": {
                    "doctype": doctype_property(),
                    "data": data_property("Document fields")
                },
                "required": ["doctype", "data"]
            }),
            vec![RequiredField::new("data")],
        ),
        RecordAction::Get => (
            "Fetch one document of any doctype by name.",
            name_schema(true, None),
            vec![RequiredField::new("name")],
        ),
        RecordAction::Update => (
            "Update fields of a draft document of any doctype.",
            name_schema(true, Some(data_property("Fields to change"))),
            vec![RequiredField::new("name"), RequiredField::new("data")],
        ),
        RecordAction::Delete => (
            "Delete a document of any doctype.",
            name_schema(true, None),
            vec![RequiredField::new("name")],
        ),
        RecordAction::Submit => (
            "Submit a draft document of any doctype. The latest copy is fetched first.",
            name_schema(true, None),
            vec![RequiredField::new("name")],
        ),
        RecordAction::Cancel => (
            "Cancel a submitted document of any doctype.",
            name_schema(true, None),
            vec![RequiredField::new("name")],
        ),
    };
    required.insert(0, doctype_required);

    ToolDefinition {
        name: format!("doc_{}", action.as_str()),
        description: description.to_string(),
        category: Category::Generic,
        input_schema,
        operation: Operation::Generic(action),
        required,
        ui: (action == RecordAction::List).then_some(UiResource::Table),
    }
}

fn call_method_tool() -> ToolDefinition {
    ToolDefinition {
        name: "call_method".to_string(),
        description: "Call a whitelisted remote method by dotted path, e.g. 'frappe.client.get_count'. 'args' is sent as the request body; the method's 'message' is returned.".to_string(),
        category: Category::Setup,
        input_schema: json!({
            "type": "object",
            "properties": {
                "method": { "type": "string", "description": "Dotted method path" },
                "args": { "type": "object", "description": "Keyword arguments for the method" }
            },
            "required": ["method"]
        }),
        operation: Operation::CallMethod,
        required: vec![RequiredField::new("method")],
        ui: None,
    }
}

fn report_tool(report: Report) -> ToolDefinition {
    ToolDefinition {
        name: report.name().to_string(),
        description: report.description().to_string(),
        category: Category::Analytics,
        input_schema: report.input_schema(),
        operation: Operation::Report(report),
        required: Vec::new(),
        ui: Some(report.ui()),
    }
}

fn doctype_property() -> Value {
    json!({ "type": "string", "description": "Doctype name as shown in the remote system, e.g. \"Sales Order\"" })
}

fn data_property(description: &str) -> Value {
    json!({ "type": "object", "description": description })
}

fn name_schema(with_doctype: bool, data: Option<Value>) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    if with_doctype {
        properties.insert("doctype".into(), doctype_property());
        required.push("doctype");
    }
    properties.insert(
        "name".into(),
        json!({ "type": "string", "description": "Document name (ID)" }),
    );
    required.push("name");
    if let Some(data) = data {
        properties.insert("data".into(), data);
        required.push("data");
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

fn list_schema(with_doctype: bool) -> Value {
    let mut properties = Map::new();
    if with_doctype {
        properties.insert("doctype".into(), doctype_property());
    }
    properties.insert(
        "fields".into(),
        json!({ "type": "array", "items": { "type": "string" }, "description": "Fields to return" }),
    );
    properties.insert(
        "filters".into(),
        json!({
            "description": "[[field, operator, value], ...] or {field: value}; conditions are ANDed",
            "oneOf": [{ "type": "array" }, { "type": "object" }]
        }),
    );
    properties.insert(
        "order_by".into(),
        json!({ "type": "string", "description": "e.g. 'modified desc'" }),
    );
    properties.insert(
        "limit".into(),
        json!({ "type": "integer", "minimum": 1, "maximum": MAX_LIST_LIMIT }),
    );
    properties.insert("offset".into(), json!({ "type": "integer", "minimum": 0 }));

    let mut schema = json!({ "type": "object", "properties": properties });
    if with_doctype {
        schema["required"] = json!(["doctype"]);
    }
    schema
}

fn field_schema(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Text => json!({ "type": "string" }),
        FieldKind::Number => json!({ "type": "number" }),
        FieldKind::Date => json!({ "type": "string", "format": "date" }),
        FieldKind::Lines => json!({ "type": "array", "items": { "type": "object" }, "minItems": 1 }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique_and_indexed() {
        let registry = ToolRegistry::all();
        let names: HashSet<_> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), registry.len());
        for tool in registry.tools() {
            assert_eq!(registry.get(&tool.name).map(|t| &t.name), Some(&tool.name));
        }
    }

    #[test]
    fn every_category_is_populated() {
        let registry = ToolRegistry::all();
        for category in Category::ALL {
            assert!(registry.in_category(category).next().is_some(), "{category}");
        }
    }

    #[test]
    fn generic_bucket_has_one_tool_per_action() {
        let registry = ToolRegistry::all();
        let generic: Vec<_> = registry
            .in_category(Category::Generic)
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(
            generic,
            vec!["doc_list", "doc_get", "doc_create", "doc_update", "doc_delete", "doc_submit", "doc_cancel"]
        );
        for tool in registry.in_category(Category::Generic) {
            assert_eq!(tool.required[0].field, "doctype");
        }
    }

    #[test]
    fn category_filter_restricts_registration() {
        let registry = ToolRegistry::new(&[Category::Sales, Category::Analytics]);
        assert!(registry.get("sales_order_submit").is_some());
        assert!(registry.get("sales_pipeline").is_some());
        assert!(registry.get("supplier_list").is_none());
        assert!(registry.get("doc_get").is_none());
        assert!(
            registry
                .tools()
                .iter()
                .all(|t| matches!(t.category, Category::Sales | Category::Analytics))
        );
    }

    #[test]
    fn create_tools_carry_declared_required_fields() {
        let registry = ToolRegistry::all();
        let tool = registry.get("sales_order_create").unwrap();
        let fields: Vec<_> = tool.required.iter().map(|r| r.field).collect();
        assert_eq!(fields, vec!["customer", "delivery_date", "items"]);
        assert_eq!(tool.required[0].message, "'customer' is required");
        assert_eq!(tool.required[2].message, "'items' must contain at least one line");
        assert_eq!(tool.input_schema["required"], json!(["customer", "delivery_date", "items"]));
    }

    #[test]
    fn ui_hints_follow_tool_shape() {
        let registry = ToolRegistry::all();
        assert_eq!(registry.get("customer_list").unwrap().ui, Some(UiResource::Table));
        assert_eq!(registry.get("customer_get").unwrap().ui, None);
        assert_eq!(registry.get("sales_pipeline").unwrap().ui, Some(UiResource::Kanban));
        assert_eq!(registry.get("kpi_revenue").unwrap().ui, Some(UiResource::Kpi));
        assert_eq!(registry.get("sales_funnel").unwrap().ui, Some(UiResource::Funnel));
    }

    #[test]
    fn suggests_close_names_only() {
        let registry = ToolRegistry::all();
        assert_eq!(registry.suggest("sales_ordr_list").as_deref(), Some("sales_order_list"));
        assert_eq!(registry.suggest("zzzz"), None);
    }
}
