use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::client::RemoteRecordClient;
use crate::handlers::{PayloadShape, run_record_action};
use crate::registry::ToolRegistry;
use crate::tool::{Invocation, Operation, ToolDefinition, ToolError};

/// Protocol-neutral listing entry: everything a host needs to offer the tool,
/// nothing about how it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Resolves tools by name and runs them against one shared client.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    client: Arc<RemoteRecordClient>,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, client: Arc<RemoteRecordClient>) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ToolError> {
        self.execute_on(name, args, chrono::Local::now().date_naive())
            .await
    }

    /// Same as [`execute`](Self::execute) with an explicit reference date for
    /// date-relative reports.
    pub async fn execute_on(
        &self,
        name: &str,
        args: &Map<String, Value>,
        today: NaiveDate,
    ) -> Result<Value, ToolError> {
        let tool = self.resolve(name)?;
        let call = Invocation::new(&tool.name, args);
        validate_required(tool, &call)?;

        let started = std::time::Instant::now();
        let result = match tool.operation {
            Operation::Record {
                doctype,
                action,
                list_fields,
            } => {
                run_record_action(&self.client, &call, doctype, action, list_fields, PayloadShape::Flat)
                    .await
            }
            Operation::Generic(action) => {
                let doctype = call.required_str("doctype")?;
                run_record_action(&self.client, &call, doctype, action, &[], PayloadShape::Nested).await
            }
            Operation::CallMethod => {
                let method = call.required_str("method")?;
                let method_args = call.optional_object("args")?.unwrap_or_default();
                self.client
                    .call(method, Value::Object(method_args))
                    .await
                    .map(|message| json!({ "data": message }))
                    .map_err(ToolError::from)
            }
            Operation::Report(report) => report.run(&self.client, &call, today).await,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(tool = name, elapsed_ms, "tool call succeeded"),
            Err(err) => tracing::warn!(tool = name, elapsed_ms, code = err.code(), error = %err, "tool call failed"),
        }
        result
    }

    pub fn to_wire_format(&self) -> Vec<WireTool> {
        self.registry.tools().iter().map(wire_tool).collect()
    }

    fn resolve(&self, name: &str) -> Result<&ToolDefinition, ToolError> {
        self.registry.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
            available: self.registry.names(),
            suggestion: self.registry.suggest(name),
        })
    }
}

fn validate_required(tool: &ToolDefinition, call: &Invocation<'_>) -> Result<(), ToolError> {
    match tool.required.iter().find(|required| !call.is_present(required.field)) {
        Some(required) => Err(call.missing(required.field, required.message.clone())),
        None => Ok(()),
    }
}

fn wire_tool(tool: &ToolDefinition) -> WireTool {
    WireTool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.input_schema.clone(),
        meta: tool
            .ui
            .map(|ui| json!({ "ui": { "resourceUri": ui.uri() }, "category": tool.category.as_str() })),
    }
}
