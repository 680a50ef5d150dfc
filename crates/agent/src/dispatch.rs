//! Tool dispatch engine
//!
//! Runs a batch of tool calls one after another and appends exactly one
//! correlated tool turn per call, failures included.

use std::sync::Arc;

use conduit_mcp::{CallToolResult, McpError, ToolService};
use conduit_provider::ToolCall;
use conduit_session::Conversation;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{emit, AgentEvent, EventSender};
use crate::registry::ToolRegistry;
use crate::{AgentError, Result};

/// Why a single tool call produced no usable result
#[derive(Error, Debug)]
pub enum ToolExecutionError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("{0}")]
    Remote(#[from] McpError),

    #[error("{0}")]
    Reported(String),
}

/// Result of one call in a batch
#[derive(Debug)]
pub struct ToolCallOutcome {
    pub id: String,
    pub name: String,
    pub result: std::result::Result<CallToolResult, ToolExecutionError>,
}

impl ToolCallOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a batch, in request order
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ToolCallOutcome>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Decode an endpoint-produced argument payload. Blank and `null` payloads
/// mean no arguments.
pub fn decode_arguments(raw: &str) -> std::result::Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(format!("expected a JSON object, got {}", other)),
        Err(e) => Err(e.to_string()),
    }
}

fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}

pub struct ToolDispatcher<S: ToolService> {
    service: Arc<S>,
    events: Option<EventSender>,
}

impl<S: ToolService> ToolDispatcher<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Execute `calls` in order, appending a tool turn for each. Cancellation
    /// is checked before every call; once seen, the rest of the batch is
    /// answered with a `cancelled` error turn.
    pub async fn dispatch(
        &self,
        registry: &ToolRegistry,
        calls: &[ToolCall],
        conversation: &mut Conversation,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();

        for (index, call) in calls.iter().enumerate() {
            if cancel.is_cancelled() {
                for skipped in &calls[index..] {
                    conversation.push_tool_result(
                        &skipped.id,
                        &skipped.name,
                        error_payload("cancelled"),
                    )?;
                }
                warn!("Dispatch cancelled, {} calls skipped", calls.len() - index);
                return Err(AgentError::Cancelled);
            }

            emit(
                &self.events,
                AgentEvent::ToolCallStarted {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            );

            let result = self.execute(registry, call).await;
            match &result {
                Ok(output) => {
                    debug!("Tool {} ({}) succeeded", call.name, call.id);
                    emit(
                        &self.events,
                        AgentEvent::ToolResult {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            text: output.first_text().map(str::to_string),
                        },
                    );
                    let payload = serde_json::to_string(output)
                        .unwrap_or_else(|e| error_payload(&e.to_string()));
                    conversation.push_tool_result(&call.id, &call.name, payload)?;
                }
                Err(e) => {
                    warn!("Tool {} ({}) failed: {}", call.name, call.id, e);
                    emit(
                        &self.events,
                        AgentEvent::ToolFailed {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            error: e.to_string(),
                        },
                    );
                    conversation.push_tool_result(
                        &call.id,
                        &call.name,
                        error_payload(&e.to_string()),
                    )?;
                }
            }

            report.outcomes.push(ToolCallOutcome {
                id: call.id.clone(),
                name: call.name.clone(),
                result,
            });
        }

        Ok(report)
    }

    async fn execute(
        &self,
        registry: &ToolRegistry,
        call: &ToolCall,
    ) -> std::result::Result<CallToolResult, ToolExecutionError> {
        if !registry.has(&call.name) {
            return Err(ToolExecutionError::UnknownTool(call.name.clone()));
        }

        let arguments = decode_arguments(&call.arguments).map_err(|reason| {
            ToolExecutionError::InvalidArguments {
                name: call.name.clone(),
                reason,
            }
        })?;

        let result = self.service.call_tool(&call.name, arguments).await?;
        if result.is_error {
            let text = result.joined_text();
            return Err(ToolExecutionError::Reported(if text.is_empty() {
                "tool reported an error".to_string()
            } else {
                text
            }));
        }
        Ok(result)
    }
}
