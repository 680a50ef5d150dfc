//! MCP client over streamable HTTP
//!
//! Each JSON-RPC message is POSTed to the server URL. The server answers
//! with either a JSON body or a short SSE stream carrying the response.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::protocol::{
    CallToolResult, InitializeResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    ToolDescriptor, PROTOCOL_VERSION,
};
use crate::{McpError, Result, ToolService};

pub const SESSION_HEADER: &str = "mcp-session-id";
const EVENT_STREAM: &str = "text/event-stream";
const JSON_MIME: &str = "application/json";

/// Client for a single named MCP server
pub struct McpClient {
    name: String,
    url: String,
    client: reqwest::Client,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
    server: Option<InitializeResult>,
}

impl McpClient {
    /// Create an unconnected client
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client: reqwest::Client::new(),
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
            server: None,
        }
    }

    /// Create a client and run the initialize handshake
    pub async fn connect(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let mut client = Self::new(name, url);
        client.initialize().await?;
        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Server details from the handshake, if it ran
    pub fn server(&self) -> Option<&InitializeResult> {
        self.server.as_ref()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|guard| guard.clone())
    }

    fn remember_session(&self, response: &reqwest::Response) {
        let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return;
        };
        if let Ok(mut guard) = self.session_id.lock() {
            if guard.as_deref() != Some(id) {
                debug!("◆ MCP SESSION {} ESTABLISHED WITH {}", id, self.name);
                *guard = Some(id.to_string());
            }
        }
    }

    /// `initialize` followed by `notifications/initialized`
    pub async fn initialize(&mut self) -> Result<&InitializeResult> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "conduit",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result: InitializeResult =
            serde_json::from_value(self.request("initialize", Some(params)).await?)?;
        if result.protocol_version != PROTOCOL_VERSION {
            warn!(
                "◆ {} negotiated protocol {} (requested {})",
                self.name, result.protocol_version, PROTOCOL_VERSION
            );
        }

        self.notify("notifications/initialized", None).await?;

        info!(
            "◆ CONNECTED TO {} ({} {})",
            self.name, result.server_info.name, result.server_info.version
        );
        Ok(self.server.insert(result))
    }

    async fn post(&self, message: &JsonRpcRequest<'_>) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(&self.url)
            .header(ACCEPT, format!("{}, {}", JSON_MIME, EVENT_STREAM))
            .json(message);
        if let Some(session_id) = self.session_id() {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await?;
        self.remember_session(&response);

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Send a request and wait for the response carrying its id
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        trace!("◆ MCP -> {} #{}", method, id);

        let response = self.post(&JsonRpcRequest::request(id, method, params)).await?;
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|ct| starts_with(ct, EVENT_STREAM))
            .unwrap_or(false);
        let body = response.text().await?;

        let message = if is_stream {
            find_in_event_stream(&body, id)?
        } else {
            find_in_json(&body, id)?
        };
        message.into_result()
    }

    /// Send a notification; any 2xx is acceptance
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        trace!("◆ MCP -> {} (notification)", method);
        self.post(&JsonRpcRequest::notification(method, params))
            .await
            .map(|_| ())
    }

    /// End the server-side session, if one was established
    pub async fn close(&self) -> Result<()> {
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };

        let response = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, &session_id)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() || s == StatusCode::METHOD_NOT_ALLOWED => {
                debug!("◆ MCP SESSION {} CLOSED", session_id);
                Ok(())
            }
            s => Err(McpError::Http {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

fn starts_with(value: &HeaderValue, mime: &str) -> bool {
    value.as_bytes().starts_with(mime.as_bytes())
}

fn find_in_json(body: &str, id: u64) -> Result<JsonRpcResponse> {
    let value: Value = serde_json::from_str(body)?;
    let candidates = match value {
        Value::Array(items) => items,
        single => vec![single],
    };

    for candidate in candidates {
        let message: JsonRpcResponse = serde_json::from_value(candidate)?;
        if message.answers(id) {
            return Ok(message);
        }
    }
    Err(McpError::Protocol(format!("no response for request #{}", id)))
}

fn find_in_event_stream(body: &str, id: u64) -> Result<JsonRpcResponse> {
    for data in sse_data(body) {
        match serde_json::from_str::<JsonRpcResponse>(&data) {
            Ok(message) if message.answers(id) => return Ok(message),
            Ok(message) => {
                debug!("◆ MCP <- skipping {:?}", message.method);
            }
            Err(e) => warn!("◆ MCP <- unreadable event: {}", e),
        }
    }
    Err(McpError::Protocol(format!(
        "event stream ended without a response for request #{}",
        id
    )))
}

/// Payloads of the `data` fields of each event in an SSE body
pub fn sse_data(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if !current.is_empty() {
                events.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }
    if !current.is_empty() {
        events.push(current.join("\n"));
    }

    events
}

#[async_trait]
impl ToolService for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult =
                serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    warn!("◆ {} repeated cursor {}, stopping", self.name, next);
                    break;
                }
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("◆ {} LISTS {} TOOLS", self.name, tools.len());
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<CallToolResult> {
        let params = json!({
            "name": name,
            "arguments": arguments,
        });
        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }
}
