use serde::{Deserialize, Serialize};

/// Structured error returned to tool callers.
/// Carries enough to tell a validation slip from a remote rejection from an outage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Machine-readable error code (see [`codes`])
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Tool that failed (if the failure happened inside a tool call)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Which argument caused the error (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// HTTP status seen from the remote system; 0 = never reached, 408 = timed out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Remote system's own diagnostics, when it answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteDiagnostics>,
    /// Hint about what the correct usage looks like
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            tool: None,
            field: None,
            status: None,
            remote: None,
            docs_hint: None,
        }
    }
}

/// Diagnostics the remote system put in an error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDiagnostics {
    /// Short human summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Exception class tag, e.g. `ValidationError`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exc_type: Option<String>,
    /// The body also carries field-level validation messages. They are not
    /// parsed here; read them from `body`.
    pub has_field_messages: bool,
    /// Raw response body, untouched
    pub body: serde_json::Value,
}

/// Error codes used across the runtime
pub mod codes {
    pub const NETWORK_ERROR: &str = "network_error";
    pub const TIMEOUT: &str = "timeout";
    pub const REMOTE_CLIENT_ERROR: &str = "remote_client_error";
    pub const REMOTE_SERVER_ERROR: &str = "remote_server_error";
    pub const UNEXPECTED_RESPONSE: &str = "unexpected_response";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const MISSING_FIELD: &str = "missing_field";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const INVALID_CONFIG: &str = "invalid_config";
}
