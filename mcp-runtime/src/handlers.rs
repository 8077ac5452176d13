//! Record actions shared by the typed per-doctype tools and the generic
//! `doc_*` tools. Both resolve a doctype and land here, so they get the same
//! argument handling and the same submit path.

use erp_core::{Filter, FilterOperator, ListOptions, ListPayload};
use serde_json::{Map, Value, json};

use crate::client::RemoteRecordClient;
use crate::tool::{Invocation, RecordAction, ToolError};

pub const MAX_LIST_LIMIT: u64 = 500;

/// How the record payload is read for create/update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Document fields are the tool arguments themselves.
    Flat,
    /// Document fields are under `data`.
    Nested,
}

pub async fn run_record_action(
    client: &RemoteRecordClient,
    call: &Invocation<'_>,
    doctype: &str,
    action: RecordAction,
    default_fields: &[&str],
    shape: PayloadShape,
) -> Result<Value, ToolError> {
    tracing::debug!(tool = call.tool, doctype, action = action.as_str(), "record action");
    match action {
        RecordAction::List => {
            let options = list_options(call, default_fields)?;
            let rows = client.list(doctype, &options).await?;
            Ok(serde_json::to_value(ListPayload::new(doctype, rows)).unwrap_or(Value::Null))
        }
        RecordAction::Get => {
            let name = call.required_str("name")?;
            let record = client.get(doctype, name).await?;
            Ok(json!({ "data": record }))
        }
        RecordAction::Create => {
            let payload = match shape {
                PayloadShape::Flat => flat_payload(call.args),
                PayloadShape::Nested => call.required_object("data")?,
            };
            let created = client.create(doctype, Value::Object(payload)).await?;
            Ok(json!({ "data": created }))
        }
        RecordAction::Update => {
            let name = call.required_str("name")?;
            let patch = call.required_object("data")?;
            if patch.is_empty() {
                return Err(call.invalid("data", "'data' must contain at least one field"));
            }
            let updated = client.update(doctype, name, Value::Object(patch)).await?;
            Ok(json!({ "data": updated }))
        }
        RecordAction::Delete => {
            let name = call.required_str("name")?;
            client.delete(doctype, name).await?;
            Ok(json!({ "deleted": true, "doctype": doctype, "name": name }))
        }
        RecordAction::Submit => {
            let name = call.required_str("name")?;
            let submitted = client.submit(doctype, name).await?;
            Ok(json!({ "data": submitted }))
        }
        RecordAction::Cancel => {
            let name = call.required_str("name")?;
            let cancelled = client.cancel(doctype, name).await?;
            Ok(json!({ "data": cancelled }))
        }
    }
}

/// Tool-control keys never belong in a document payload.
fn flat_payload(args: &Map<String, Value>) -> Map<String, Value> {
    args.iter()
        .filter(|(key, _)| key.as_str() != "doctype")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn list_options(call: &Invocation<'_>, default_fields: &[&str]) -> Result<ListOptions, ToolError> {
    let mut options = ListOptions::new();
    options.fields = match call.optional_string_array("fields")? {
        Some(fields) if !fields.is_empty() => fields,
        _ => default_fields.iter().map(|f| f.to_string()).collect(),
    };
    options.filters = parse_filters(call, "filters")?;
    if let Some(order_by) = call.optional_str("order_by")? {
        options = options.order_by(order_by);
    }
    if let Some(limit) = call.optional_u64("limit")? {
        options = options.limit(limit.clamp(1, MAX_LIST_LIMIT) as u32);
    }
    if let Some(offset) = call.optional_u64("offset")? {
        let offset = u32::try_from(offset)
            .map_err(|_| call.invalid("offset", "'offset' is too large"))?;
        options = options.offset(offset);
    }
    Ok(options)
}

/// Filters as `[[field, op, value], ...]` or as `{field: value}`. In the
/// object form a value of `[op, value]` selects the operator; anything else
/// means equality.
pub fn parse_filters(call: &Invocation<'_>, key: &str) -> Result<Vec<Filter>, ToolError> {
    match call.args.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                serde_json::from_value::<Filter>(item.clone()).map_err(|err| {
                    call.invalid(
                        key,
                        format!("each filter must be [field, operator, value]: {err}"),
                    )
                })
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(field, value)| object_filter(call, key, field, value))
            .collect(),
        Some(_) => Err(call.invalid(key, format!("'{key}' must be an array or an object"))),
    }
}

fn object_filter(call: &Invocation<'_>, key: &str, field: &str, value: &Value) -> Result<Filter, ToolError> {
    if let Some([Value::String(op), operand]) = value.as_array().map(Vec::as_slice) {
        let operator = op
            .parse::<FilterOperator>()
            .map_err(|err| call.invalid(key, err.to_string()))?;
        return Ok(Filter::new(field, operator, operand.clone()));
    }
    Ok(Filter::eq(field, value.clone()))
}
