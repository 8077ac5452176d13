use std::time::{Duration, Instant};

use erp_core::{ListOptions, RemoteDiagnostics, RemoteRecord};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SUBMIT_PROCEDURE: &str = "frappe.client.submit";
const CANCEL_PROCEDURE: &str = "frappe.client.cancel";

/// Connection settings for one remote ERP site. Built by the bootstrap layer and
/// handed to [`RemoteRecordClient::new`]; nothing here is read from the environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("'{0}' must not be empty")]
    MissingCredential(&'static str),
    #[error("API key/secret contain characters that cannot be sent in a header")]
    InvalidCredential,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// What the remote system said when it rejected a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFailure {
    pub status: u16,
    pub body: Value,
    pub summary: Option<String>,
    pub exc_type: Option<String>,
    pub has_field_messages: bool,
}

impl RemoteFailure {
    pub fn from_response(status: u16, body: Value) -> Self {
        Self {
            status,
            summary: remote_summary(&body),
            exc_type: body
                .get("exc_type")
                .and_then(Value::as_str)
                .map(str::to_string),
            has_field_messages: has_field_messages(&body),
            body,
        }
    }

    pub fn headline(&self) -> String {
        self.summary
            .clone()
            .or_else(|| self.exc_type.clone())
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }

    pub fn diagnostics(&self) -> RemoteDiagnostics {
        RemoteDiagnostics {
            summary: self.summary.clone(),
            exc_type: self.exc_type.clone(),
            has_field_messages: self.has_field_messages,
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("could not reach remote for {method} {path}: {message}")]
    Network {
        method: String,
        path: String,
        message: String,
    },
    #[error("{method} {path} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        method: String,
        path: String,
        timeout: Duration,
    },
    #[error("remote rejected {method} {path} ({}): {}", .failure.status, .failure.headline())]
    Client {
        method: String,
        path: String,
        failure: RemoteFailure,
    },
    #[error("remote failed on {method} {path} ({}): {}", .failure.status, .failure.headline())]
    Server {
        method: String,
        path: String,
        failure: RemoteFailure,
    },
    /// A 2xx reply whose body is not what the endpoint returns, e.g. a login
    /// page served by a proxy.
    #[error("{method} {path} answered {status} without {expected}: {received}")]
    UnexpectedResponse {
        method: String,
        path: String,
        status: u16,
        expected: &'static str,
        received: String,
    },
}

impl RemoteError {
    /// 0 when no response arrived, 408 when the local timeout fired, otherwise
    /// the status the remote returned.
    pub fn status(&self) -> u16 {
        match self {
            RemoteError::Network { .. } => 0,
            RemoteError::Timeout { .. } => 408,
            RemoteError::Client { failure, .. } | RemoteError::Server { failure, .. } => {
                failure.status
            }
            RemoteError::UnexpectedResponse { status, .. } => *status,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RemoteError::Network { .. } => erp_core::error::codes::NETWORK_ERROR,
            RemoteError::Timeout { .. } => erp_core::error::codes::TIMEOUT,
            RemoteError::Client { .. } => erp_core::error::codes::REMOTE_CLIENT_ERROR,
            RemoteError::Server { .. } => erp_core::error::codes::REMOTE_SERVER_ERROR,
            RemoteError::UnexpectedResponse { .. } => erp_core::error::codes::UNEXPECTED_RESPONSE,
        }
    }

    pub fn failure(&self) -> Option<&RemoteFailure> {
        match self {
            RemoteError::Client { failure, .. } | RemoteError::Server { failure, .. } => {
                Some(failure)
            }
            RemoteError::Network { .. }
            | RemoteError::Timeout { .. }
            | RemoteError::UnexpectedResponse { .. } => None,
        }
    }
}

/// Authenticated transport to the remote document API.
///
/// Holds only fixed configuration, so one instance is shared by every tool call.
#[derive(Debug, Clone)]
pub struct RemoteRecordClient {
    base_url: Url,
    auth_header: HeaderValue,
    timeout: Duration,
    http: reqwest::Client,
}

impl RemoteRecordClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(config.base_url.trim()).map_err(|e| {
            ConfigError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: config.base_url,
                reason: "expected an http(s) URL".to_string(),
            });
        }
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("api_key"));
        }
        if config.api_secret.trim().is_empty() {
            return Err(ConfigError::MissingCredential("api_secret"));
        }
        if config.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let mut auth_header = HeaderValue::from_str(&format!(
            "token {}:{}",
            config.api_key.trim(),
            config.api_secret.trim()
        ))
        .map_err(|_| ConfigError::InvalidCredential)?;
        auth_header.set_sensitive(true);

        Ok(Self {
            base_url,
            auth_header,
            timeout: config.timeout,
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn list(&self, doctype: &str, options: &ListOptions) -> Result<Vec<Value>, RemoteError> {
        self.send(
            Method::GET,
            &["api", "resource", doctype],
            &options.to_query_pairs(),
            None,
        )
        .await?
        .rows()
    }

    pub async fn get(&self, doctype: &str, name: &str) -> Result<Value, RemoteError> {
        let (_, fresh) = self.fetch_document(doctype, name).await?;
        Ok(fresh)
    }

    pub async fn create(&self, doctype: &str, data: Value) -> Result<Value, RemoteError> {
        let payload = stamp_doctype(data, doctype);
        self.send(
            Method::POST,
            &["api", "resource", doctype],
            &[],
            Some(json!({ "data": payload })),
        )
        .await?
        .record()
    }

    pub async fn update(&self, doctype: &str, name: &str, patch: Value) -> Result<Value, RemoteError> {
        self.send(
            Method::PUT,
            &["api", "resource", doctype, name],
            &[],
            Some(json!({ "data": patch })),
        )
        .await?
        .record()
    }

    pub async fn delete(&self, doctype: &str, name: &str) -> Result<(), RemoteError> {
        self.send(Method::DELETE, &["api", "resource", doctype, name], &[], None)
            .await?;
        Ok(())
    }

    /// Invoke a whitelisted remote procedure. Arguments are the request body as-is.
    pub async fn call(&self, procedure: &str, args: Value) -> Result<Value, RemoteError> {
        let reply = self
            .send(Method::POST, &["api", "method", procedure], &[], Some(args))
            .await?;
        Ok(match reply.body {
            Value::Object(mut map) if map.contains_key("message") => {
                map.remove("message").unwrap_or(Value::Null)
            }
            other => other,
        })
    }

    /// Submit a draft. The remote refuses a submit that does not carry the
    /// document's current `modified`, so the full record is fetched first and
    /// forwarded as-is. A writer landing between the two calls still makes the
    /// submit fail; that error is returned untouched. Nothing is posted unless
    /// the fetch yields a named document.
    pub async fn submit(&self, doctype: &str, name: &str) -> Result<Value, RemoteError> {
        let (record, fresh) = self.fetch_document(doctype, name).await?;
        tracing::debug!(
            doctype,
            name,
            docstatus = record.docstatus.as_str(),
            modified = record.modified.as_deref().unwrap_or("<missing>"),
            "forwarding fresh copy to submit"
        );
        let fresh = stamp_doctype(fresh, doctype);
        self.call(SUBMIT_PROCEDURE, json!({ "doc": fresh })).await
    }

    pub async fn cancel(&self, doctype: &str, name: &str) -> Result<Value, RemoteError> {
        self.call(CANCEL_PROCEDURE, json!({ "doctype": doctype, "name": name }))
            .await
    }

    async fn fetch_document(&self, doctype: &str, name: &str) -> Result<(RemoteRecord, Value), RemoteError> {
        self.send(Method::GET, &["api", "resource", doctype, name], &[], None)
            .await?
            .document()
    }

    fn endpoint(&self, segments: &[&str]) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(segments);
        Some(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Reply, RemoteError> {
        let Some(url) = self.endpoint(segments) else {
            return Err(RemoteError::Network {
                method: method.to_string(),
                path: segments.join("/"),
                message: "base URL cannot carry a path".to_string(),
            });
        };
        let path = url.path().to_string();

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, self.auth_header.clone())
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let started = Instant::now();
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        let (status, bytes) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                tracing::warn!(%method, %path, error = %err, "remote unreachable");
                return Err(RemoteError::Network {
                    method: method.to_string(),
                    path,
                    message: err.to_string(),
                });
            }
            Err(_) => {
                tracing::warn!(%method, %path, timeout_ms = self.timeout.as_millis() as u64, "remote call timed out");
                return Err(RemoteError::Timeout {
                    method: method.to_string(),
                    path,
                    timeout: self.timeout,
                });
            }
        };

        tracing::debug!(
            %method,
            %path,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "remote call"
        );
        classify_response(method, path, status, parse_response_body(&bytes))
    }
}

/// A 2xx reply, kept with its request line so shape checks can report it.
#[derive(Debug)]
struct Reply {
    method: Method,
    path: String,
    status: u16,
    body: Value,
}

impl Reply {
    fn rows(self) -> Result<Vec<Value>, RemoteError> {
        match unwrap_data(self.body.clone()) {
            Value::Array(rows) => Ok(rows),
            _ => Err(self.unexpected("a list of records")),
        }
    }

    fn record(self) -> Result<Value, RemoteError> {
        match unwrap_data(self.body.clone()) {
            data @ Value::Object(_) => Ok(data),
            _ => Err(self.unexpected("a record object")),
        }
    }

    fn document(self) -> Result<(RemoteRecord, Value), RemoteError> {
        let data = unwrap_data(self.body.clone());
        match RemoteRecord::from_value(data.clone()) {
            Ok(record) => Ok((record, data)),
            _ => Err(self.unexpected("a named document")),
        }
    }

    fn unexpected(self, expected: &'static str) -> RemoteError {
        tracing::warn!(
            method = %self.method,
            path = %self.path,
            status = self.status,
            expected,
            "remote answered with an unexpected body"
        );
        RemoteError::UnexpectedResponse {
            method: self.method.to_string(),
            path: self.path,
            status: self.status,
            expected,
            received: preview(&self.body),
        }
    }
}

const PREVIEW_CHARS: usize = 200;

fn preview(body: &Value) -> String {
    let text = match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= PREVIEW_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

fn classify_response(
    method: Method,
    path: String,
    status: u16,
    body: Value,
) -> Result<Reply, RemoteError> {
    if (200..=299).contains(&status) {
        return Ok(Reply {
            method,
            path,
            status,
            body,
        });
    }
    let failure = RemoteFailure::from_response(status, body);
    tracing::warn!(%method, %path, status, exc_type = ?failure.exc_type, "remote returned an error");
    if status >= 500 {
        Err(RemoteError::Server {
            method: method.to_string(),
            path,
            failure,
        })
    } else {
        Err(RemoteError::Client {
            method: method.to_string(),
            path,
            failure,
        })
    }
}

fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn stamp_doctype(data: Value, doctype: &str) -> Value {
    match data {
        Value::Object(mut map) => {
            map.insert("doctype".to_string(), Value::String(doctype.to_string()));
            Value::Object(map)
        }
        other => other,
    }
}

fn remote_summary(body: &Value) -> Option<String> {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty());
    if let Some(message) = message {
        return Some(message.to_string());
    }
    let exception = body.get("exception").and_then(Value::as_str)?.trim();
    let text = exception
        .split_once(": ")
        .map(|(_, rest)| rest.trim())
        .unwrap_or(exception);
    (!text.is_empty()).then(|| text.to_string())
}

// The secondary channel is a JSON-encoded string of JSON-encoded messages.
// Only its presence is reported.
fn has_field_messages(body: &Value) -> bool {
    match body.get("_server_messages") {
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            !raw.is_empty() && raw != "[]"
        }
        Some(Value::Array(items)) => !items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use erp_core::{Filter, FilterOperator};

    use super::*;

    #[derive(Default)]
    struct FakeErp {
        docs: HashMap<(String, String), Value>,
        get_calls: usize,
        submitted: Vec<Value>,
        bump_modified_after_get: bool,
    }

    type Shared = Arc<Mutex<FakeErp>>;

    async fn list_docs(
        Path(doctype): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Json<Value> {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({
            "data": [{
                "doctype": doctype,
                "query": query,
                "authorization": authorization
            }]
        }))
    }

    async fn create_doc(Path(doctype): Path<String>, Json(body): Json<Value>) -> Json<Value> {
        let mut data = body["data"].clone();
        data["name"] = json!(format!("{doctype}-0001"));
        Json(json!({ "data": data }))
    }

    async fn get_doc(State(state): State<Shared>, Path((doctype, name)): Path<(String, String)>) -> Response {
        if doctype == "Slow Doc" {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        let mut erp = state.lock().unwrap();
        erp.get_calls += 1;
        let key = (doctype.clone(), name.clone());
        let Some(doc) = erp.docs.get(&key).cloned() else {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "exc_type": "DoesNotExistError",
                    "message": format!("{doctype} {name} not found")
                })),
            )
                .into_response();
        };
        if erp.bump_modified_after_get {
            if let Some(stored) = erp.docs.get_mut(&key) {
                stored["modified"] = json!("2026-10-17 09:00:00.000002");
            }
        }
        Json(json!({ "data": doc })).into_response()
    }

    async fn update_doc(Path((_doctype, name)): Path<(String, String)>, Json(body): Json<Value>) -> Json<Value> {
        let mut data = body["data"].clone();
        data["name"] = json!(name);
        Json(json!({ "data": data }))
    }

    async fn delete_doc() -> Json<Value> {
        Json(json!({ "message": "ok" }))
    }

    async fn call_method(
        State(state): State<Shared>,
        Path(procedure): Path<String>,
        Json(args): Json<Value>,
    ) -> Response {
        match procedure.as_str() {
            "frappe.client.submit" => {
                let mut erp = state.lock().unwrap();
                let doc = args["doc"].clone();
                erp.submitted.push(doc.clone());
                let key = (
                    doc["doctype"].as_str().unwrap_or_default().to_string(),
                    doc["name"].as_str().unwrap_or_default().to_string(),
                );
                let stored = erp.docs.get(&key).cloned().unwrap_or(Value::Null);
                if stored["modified"] != doc["modified"] {
                    return (
                        StatusCode::CONFLICT,
                        Json(json!({
                            "exc_type": "TimestampMismatchError",
                            "exception": "frappe.exceptions.TimestampMismatchError: Document has been modified after you have opened it"
                        })),
                    )
                        .into_response();
                }
                if stored["docstatus"] != json!(0) {
                    return (
                        StatusCode::EXPECTATION_FAILED,
                        Json(json!({
                            "exc_type": "ValidationError",
                            "exception": "frappe.exceptions.ValidationError: Cannot edit submitted document",
                            "_server_messages": "[\"{\\\"message\\\": \\\"Cannot edit submitted document\\\"}\"]"
                        })),
                    )
                        .into_response();
                }
                if let Some(stored) = erp.docs.get_mut(&key) {
                    stored["docstatus"] = json!(1);
                }
                let mut submitted = doc;
                submitted["docstatus"] = json!(1);
                Json(json!({ "message": submitted })).into_response()
            }
            "erp.echo" => Json(json!({ "message": args })).into_response(),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "<html>Internal Server Error</html>")
                .into_response(),
        }
    }

    async fn spawn_fake_erp(state: Shared) -> String {
        let app = Router::new()
            .route("/api/resource/{doctype}", get(list_docs).post(create_doc))
            .route(
                "/api/resource/{doctype}/{name}",
                get(get_doc).put(update_doc).delete(delete_doc),
            )
            .route("/api/method/{procedure}", post(call_method))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn draft_order(name: &str) -> Value {
        json!({
            "name": name,
            "doctype": "Sales Order",
            "docstatus": 0,
            "modified": "2026-10-17 08:59:59.123456",
            "customer": "ACME",
            "grand_total": 1200.0
        })
    }

    fn client_for(url: &str) -> RemoteRecordClient {
        RemoteRecordClient::new(ClientConfig::new(url, "key", "secret")).unwrap()
    }

    #[test]
    fn config_rejects_bad_url_and_empty_credentials() {
        let err = RemoteRecordClient::new(ClientConfig::new("ftp://erp.local", "k", "s"))
            .expect_err("ftp must be rejected");
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

        let err = RemoteRecordClient::new(ClientConfig::new("https://erp.local", " ", "s"))
            .expect_err("blank key must be rejected");
        assert_eq!(err, ConfigError::MissingCredential("api_key"));

        let err = RemoteRecordClient::new(
            ClientConfig::new("https://erp.local", "k", "s").with_timeout(Duration::ZERO),
        )
        .expect_err("zero timeout must be rejected");
        assert_eq!(err, ConfigError::ZeroTimeout);
    }

    #[test]
    fn config_defaults_to_thirty_second_timeout() {
        let client = client_for("https://erp.local");
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn list_sends_token_header_and_json_encoded_query() {
        let url = spawn_fake_erp(Shared::default()).await;
        let client = client_for(&url);

        let rows = client
            .list(
                "Sales Order",
                &ListOptions::new()
                    .fields(["name", "grand_total"])
                    .filter(Filter::new("grand_total", FilterOperator::Gt, 100))
                    .order_by("modified desc")
                    .limit(5)
                    .offset(10),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["doctype"], "Sales Order");
        assert_eq!(row["authorization"], "token key:secret");
        assert_eq!(row["query"]["fields"], r#"["name","grand_total"]"#);
        assert_eq!(row["query"]["filters"], r#"[["grand_total",">",100]]"#);
        assert_eq!(row["query"]["order_by"], "modified desc");
        assert_eq!(row["query"]["limit"], "5");
        assert_eq!(row["query"]["limit_start"], "10");
        assert_eq!(row["query"]["as_dict"], "1");
    }

    #[tokio::test]
    async fn create_wraps_payload_under_data_and_stamps_doctype() {
        let url = spawn_fake_erp(Shared::default()).await;
        let client = client_for(&url);

        let created = client
            .create("Customer", json!({ "customer_name": "ACME" }))
            .await
            .unwrap();
        assert_eq!(created["doctype"], "Customer");
        assert_eq!(created["customer_name"], "ACME");
        assert_eq!(created["name"], "Customer-0001");
    }

    #[tokio::test]
    async fn get_is_repeatable_and_encodes_doctype_path() {
        let state = Shared::default();
        state.lock().unwrap().docs.insert(
            ("Sales Order".to_string(), "SO-0001".to_string()),
            draft_order("SO-0001"),
        );
        let url = spawn_fake_erp(state).await;
        let client = client_for(&url);

        let first = client.get("Sales Order", "SO-0001").await.unwrap();
        let second = client.get("Sales Order", "SO-0001").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first["customer"], "ACME");
    }

    #[tokio::test]
    async fn update_and_delete_round_trip() {
        let url = spawn_fake_erp(Shared::default()).await;
        let client = client_for(&url);

        let updated = client
            .update("Item", "ITEM-1", json!({ "item_name": "Widget" }))
            .await
            .unwrap();
        assert_eq!(updated["name"], "ITEM-1");
        assert_eq!(updated["item_name"], "Widget");

        client.delete("Item", "ITEM-1").await.unwrap();
    }

    #[tokio::test]
    async fn call_unwraps_message() {
        let url = spawn_fake_erp(Shared::default()).await;
        let client = client_for(&url);
        let result = client.call("erp.echo", json!({ "x": 1 })).await.unwrap();
        assert_eq!(result, json!({ "x": 1 }));
    }

    #[tokio::test]
    async fn submit_fetches_then_forwards_fresh_copy() {
        let state = Shared::default();
        state.lock().unwrap().docs.insert(
            ("Sales Order".to_string(), "SO-0001".to_string()),
            draft_order("SO-0001"),
        );
        let url = spawn_fake_erp(state.clone()).await;
        let client = client_for(&url);

        let submitted = client.submit("Sales Order", "SO-0001").await.unwrap();
        assert_eq!(submitted["docstatus"], 1);

        let erp = state.lock().unwrap();
        assert_eq!(erp.get_calls, 1);
        assert_eq!(erp.submitted.len(), 1);
        assert_eq!(erp.submitted[0]["doctype"], "Sales Order");
        assert_eq!(erp.submitted[0]["modified"], "2026-10-17 08:59:59.123456");
        assert_eq!(erp.submitted[0]["grand_total"], 1200.0);
    }

    #[tokio::test]
    async fn submit_of_submitted_record_is_client_error_and_not_retried() {
        let state = Shared::default();
        let mut doc = draft_order("SO-0002");
        doc["docstatus"] = json!(1);
        state
            .lock()
            .unwrap()
            .docs
            .insert(("Sales Order".to_string(), "SO-0002".to_string()), doc);
        let url = spawn_fake_erp(state.clone()).await;
        let client = client_for(&url);

        let err = client
            .submit("Sales Order", "SO-0002")
            .await
            .expect_err("second submit must fail");
        assert!(matches!(err, RemoteError::Client { .. }));
        assert_eq!(err.status(), 417);
        let failure = err.failure().unwrap();
        assert_eq!(failure.exc_type.as_deref(), Some("ValidationError"));
        assert_eq!(
            failure.summary.as_deref(),
            Some("Cannot edit submitted document")
        );
        assert!(failure.has_field_messages);
        assert_eq!(state.lock().unwrap().submitted.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_edit_between_fetch_and_submit_surfaces_conflict() {
        let state = Shared::default();
        {
            let mut erp = state.lock().unwrap();
            erp.bump_modified_after_get = true;
            erp.docs.insert(
                ("Sales Order".to_string(), "SO-0003".to_string()),
                draft_order("SO-0003"),
            );
        }
        let url = spawn_fake_erp(state.clone()).await;
        let client = client_for(&url);

        let err = client
            .submit("Sales Order", "SO-0003")
            .await
            .expect_err("stale timestamp must be rejected");
        assert_eq!(err.status(), 409);
        assert_eq!(err.code(), "remote_client_error");
        assert_eq!(
            err.failure().and_then(|f| f.exc_type.as_deref()),
            Some("TimestampMismatchError")
        );
        assert_eq!(state.lock().unwrap().submitted.len(), 1);
    }

    #[tokio::test]
    async fn missing_record_is_client_error_with_raw_body() {
        let url = spawn_fake_erp(Shared::default()).await;
        let client = client_for(&url);

        let err = client.get("Customer", "NOPE").await.expect_err("404 expected");
        assert_eq!(err.status(), 404);
        let failure = err.failure().unwrap();
        assert_eq!(failure.body["exc_type"], "DoesNotExistError");
        assert_eq!(failure.summary.as_deref(), Some("Customer NOPE not found"));
        assert!(!failure.has_field_messages);
    }

    #[tokio::test]
    async fn server_fault_keeps_text_body() {
        let url = spawn_fake_erp(Shared::default()).await;
        let client = client_for(&url);

        let err = client
            .call("erp.explode", json!({}))
            .await
            .expect_err("500 expected");
        assert!(matches!(err, RemoteError::Server { .. }));
        assert_eq!(err.status(), 500);
        assert_eq!(
            err.failure().unwrap().body,
            json!("<html>Internal Server Error</html>")
        );
    }

    #[tokio::test]
    async fn slow_remote_surfaces_timeout_not_network_error() {
        let url = spawn_fake_erp(Shared::default()).await;
        let client = RemoteRecordClient::new(
            ClientConfig::new(&url, "key", "secret").with_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let err = client
            .get("Slow Doc", "X")
            .await
            .expect_err("timeout expected");
        assert!(matches!(err, RemoteError::Timeout { .. }));
        assert_eq!(err.status(), 408);
        assert_eq!(err.code(), "timeout");
    }

    #[tokio::test]
    async fn unreachable_remote_is_network_error() {
        let client = client_for("http://127.0.0.1:9");
        let err = client
            .get("Customer", "A")
            .await
            .expect_err("nothing listens on port 9");
        assert!(matches!(err, RemoteError::Network { .. }));
        assert_eq!(err.status(), 0);
    }

    async fn spawn_login_wall(posted: Arc<Mutex<Vec<Value>>>) -> String {
        let login = || async { (StatusCode::OK, "<html>Login</html>") };
        let app = Router::new()
            .route("/api/resource/{doctype}", get(login))
            .route("/api/resource/{doctype}/{name}", get(login).put(login))
            .route(
                "/api/method/{procedure}",
                post(|State(posted): State<Arc<Mutex<Vec<Value>>>>, Json(args): Json<Value>| async move {
                    posted.lock().unwrap().push(args);
                    Json(json!({ "message": {} }))
                }),
            )
            .with_state(posted);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn success_status_with_page_body_is_unexpected_response() {
        let posted = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_login_wall(posted.clone()).await;
        let client = client_for(&url);

        let err = client
            .list("Sales Order", &ListOptions::new())
            .await
            .expect_err("html is not a record list");
        assert!(matches!(err, RemoteError::UnexpectedResponse { .. }));
        assert_eq!(err.status(), 200);
        assert_eq!(err.code(), "unexpected_response");
        assert!(err.to_string().contains("<html>Login</html>"));

        let err = client
            .get("Sales Order", "SO-1")
            .await
            .expect_err("html is not a document");
        assert!(matches!(err, RemoteError::UnexpectedResponse { .. }));

        let err = client
            .update("Sales Order", "SO-1", json!({ "customer": "B" }))
            .await
            .expect_err("html is not a record");
        assert!(matches!(err, RemoteError::UnexpectedResponse { .. }));

        let err = client
            .submit("Sales Order", "SO-1")
            .await
            .expect_err("nothing fresh to forward");
        assert!(matches!(err, RemoteError::UnexpectedResponse { .. }));
        assert!(posted.lock().unwrap().is_empty());
    }

    #[test]
    fn unexpected_body_preview_is_bounded() {
        let long = Value::String("x".repeat(500));
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn summary_prefers_message_then_exception_text() {
        assert_eq!(
            remote_summary(&json!({"message": "Not permitted", "exception": "x: y"})),
            Some("Not permitted".to_string())
        );
        assert_eq!(
            remote_summary(&json!({"exception": "frappe.exceptions.LinkValidationError: Could not find Customer: X"})),
            Some("Could not find Customer: X".to_string())
        );
        assert_eq!(remote_summary(&json!("plain text")), None);
    }
}
