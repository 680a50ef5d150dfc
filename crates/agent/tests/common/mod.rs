//! Common fakes for agent integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use conduit_agent::{AgentLoop, AgentOptions, ToolRegistry};
use conduit_mcp::{CallToolResult, McpError, ToolDescriptor, ToolService};
use conduit_provider::{ChatParams, ChatResponse, Provider, ProviderError, ToolCall};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

type Scripted = Result<ChatResponse, ProviderError>;

/// Provider that replays canned responses and records every request
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<ChatParams>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
        }
    }

    pub fn push(&self, response: Scripted) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ChatParams> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(params);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Api("script exhausted".into())))
    }
}

/// In-process stand-in for the MCP server's tools
#[derive(Default)]
pub struct FakeTools {
    pub calls: Mutex<Vec<(String, Map<String, Value>)>>,
    /// Cancelled as soon as the first tool call arrives
    pub cancel_on_call: Option<CancellationToken>,
    pub unavailable: bool,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptors() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "Echo",
                "Echoes the message back to the client.",
                json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                }),
            ),
            ToolDescriptor::new(
                "CelsiusToFahrenheit",
                "Converts temperature from Celsius to Fahrenheit.",
                json!({
                    "type": "object",
                    "properties": {"celsius": {"type": "number"}},
                    "required": ["celsius"]
                }),
            ),
            ToolDescriptor::new("Broken", "Always fails in transport.", json!({"type": "object"})),
            ToolDescriptor::new("Grumpy", "Always reports an error.", json!({"type": "object"})),
        ]
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ToolService for FakeTools {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        if self.unavailable {
            return Err(McpError::Protocol("connection refused".into()));
        }
        Ok(Self::descriptors())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, McpError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }

        match name {
            "Echo" => Ok(CallToolResult::text(format!(
                "hello {}",
                arguments["message"].as_str().unwrap_or_default()
            ))),
            "CelsiusToFahrenheit" => {
                let celsius = arguments["celsius"].as_f64().unwrap_or_default();
                Ok(CallToolResult::text(format!("{}", celsius * 9.0 / 5.0 + 32.0)))
            }
            "Broken" => Err(McpError::Http {
                status: 500,
                body: "tool host crashed".into(),
            }),
            "Grumpy" => Ok(CallToolResult::error("not today")),
            other => Err(McpError::Rpc {
                code: -32602,
                message: format!("Unknown tool: {}", other),
            }),
        }
    }
}

pub fn text(content: &str) -> Result<ChatResponse, ProviderError> {
    Ok(ChatResponse::text(content))
}

pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Result<ChatResponse, ProviderError> {
    Ok(ChatResponse::tool_calls(
        calls
            .iter()
            .map(|(id, name, args)| ToolCall::new(*id, *name, *args))
            .collect(),
    ))
}

pub fn options() -> AgentOptions {
    AgentOptions {
        system_prompt: "You are a facilitator.".to_string(),
        default_system_prompt: "You are a facilitator.".to_string(),
        ..Default::default()
    }
}

pub fn agent(
    provider: ScriptedProvider,
    tools: Arc<FakeTools>,
) -> AgentLoop<ScriptedProvider, FakeTools> {
    AgentLoop::new(
        provider,
        tools,
        ToolRegistry::from_descriptors(FakeTools::descriptors()),
        options(),
    )
}
