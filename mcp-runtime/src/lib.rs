pub mod aggregate;
pub mod catalog;
pub mod client;
pub mod dispatcher;
pub mod handlers;
pub mod registry;
pub mod reports;
pub mod tool;

use std::sync::Arc;

use clap::{Args, Subcommand};
use erp_core::ErrorPayload;
use erp_core::error::codes;
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use uuid::Uuid;

pub use client::{ClientConfig, ConfigError, RemoteError, RemoteFailure, RemoteRecordClient};
pub use dispatcher::{ToolDispatcher, WireTool};
pub use registry::ToolRegistry;
pub use tool::{Category, ToolDefinition, ToolError};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "erp-mcp";

#[derive(Subcommand, Clone, Debug)]
pub enum McpCommands {
    /// Run the ERP MCP server over stdio
    Serve(McpServeArgs),
    /// Print the tool listing as JSON and exit
    Tools(McpServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    /// Comma-separated categories to expose (default: all). Aliases: hr, crm
    #[arg(long, env = "ERP_MCP_CATEGORIES", value_delimiter = ',', ignore_case = true)]
    pub categories: Vec<Category>,
}

pub async fn run(config: ClientConfig, command: McpCommands) -> i32 {
    let args = match &command {
        McpCommands::Serve(args) | McpCommands::Tools(args) => args,
    };
    let dispatcher = match build_dispatcher(config, &args.categories) {
        Ok(dispatcher) => dispatcher,
        Err(payload) => {
            let payload = serde_json::to_value(&payload).unwrap_or(Value::Null);
            eprintln!("{}", to_pretty_json(&payload));
            return 1;
        }
    };

    match command {
        McpCommands::Serve(_) => {
            let server = McpServer::new(dispatcher);
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    tracing::error!(error = %err, "mcp server stopped");
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": err,
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
        McpCommands::Tools(_) => {
            let listing = json!({ "tools": dispatcher.to_wire_format() });
            println!("{}", to_pretty_json(&listing));
            0
        }
    }
}

fn build_dispatcher(config: ClientConfig, categories: &[Category]) -> Result<ToolDispatcher, ErrorPayload> {
    let client = RemoteRecordClient::new(config).map_err(|err| {
        let mut payload = ErrorPayload::new(codes::INVALID_CONFIG, err.to_string());
        payload.docs_hint = Some(
            "Set ERP_URL, ERP_API_KEY and ERP_API_SECRET (or pass --url/--api-key/--api-secret)."
                .to_string(),
        );
        payload
    })?;
    Ok(ToolDispatcher::new(ToolRegistry::new(categories), Arc::new(client)))
}

/// How a message arrived; responses are written back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    ContentLength,
    Line,
}

struct McpServer {
    dispatcher: ToolDispatcher,
    session_id: String,
}

impl McpServer {
    fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher,
            session_id: format!("stdio-{}", Uuid::now_v7()),
        }
    }

    async fn serve_stdio(&self) -> Result<(), String> {
        tracing::info!(
            session_id = %self.session_id,
            tools = self.dispatcher.registry().len(),
            "mcp server ready"
        );
        let mut reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();

        loop {
            let incoming = read_message(&mut reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some((framing, body)) = incoming else {
                break;
            };

            let responses = match serde_json::from_slice::<Value>(&body) {
                Ok(message) => self.handle_incoming_message(message).await,
                Err(err) => vec![error_response(
                    Value::Null,
                    RpcError::parse_error(format!("Invalid JSON payload: {err}")),
                )],
            };
            for response in responses {
                write_message(&mut stdout, &response, framing)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }

        tracing::info!(session_id = %self.session_id, "stdin closed, shutting down");
        Ok(())
    }

    async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        // No method means a client response; this server never sends requests.
        let method = obj.get("method").and_then(Value::as_str)?;

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        let id = obj.get("id").cloned()?;
        let result = self.handle_request(method, params).await;
        Some(match result {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Tools operate on a live ERP site. Use *_list with filters before *_get; create tools make drafts, *_submit finalises them. doc_* tools take an explicit doctype for anything without a dedicated tool. Analytics tools return chart, KPI, kanban and funnel payloads."
        })
    }

    fn tools_list_payload(&self) -> Value {
        json!({ "tools": self.dispatcher.to_wire_format() })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let response = match self.dispatcher.execute(name, &args).await {
            Ok(data) => build_tool_call_response(
                json!({ "status": "success", "tool": name, "data": data }),
                false,
            ),
            Err(err) => build_tool_call_response(
                json!({ "status": "error", "tool": name, "error": err.to_value(name) }),
                true,
            ),
        };
        Ok(response)
    }
}

fn build_tool_call_response(envelope: Value, is_error: bool) -> Value {
    let text = to_pretty_json(&envelope);
    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

/// Next message body, either `Content-Length` framed or one JSON document per
/// line. `None` on clean EOF.
async fn read_message<R>(reader: &mut R) -> Result<Option<(Framing, Vec<u8>)>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let trimmed = line.trim();
        if content_length.is_none() && (trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return Ok(Some((Framing::Line, trimmed.as_bytes().to_vec())));
        }
        if trimmed.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }

        if trimmed.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = trimmed
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            let parsed = raw_len.parse::<usize>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Invalid Content-Length header",
                )
            })?;
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.unwrap_or_default();
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;
    Ok(Some((Framing::ContentLength, payload)))
}

async fn write_message<W>(writer: &mut W, value: &Value, framing: Framing) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
