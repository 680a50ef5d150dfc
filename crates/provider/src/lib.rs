//! Completion endpoint access
//!
//! Chat-completion model types, the [`Provider`] trait and an
//! OpenAI-compatible HTTP implementation (plain OpenAI or Azure OpenAI).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod openai;

pub use openai::OpenAiProvider;

/// Completion endpoint errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("REQUEST FAILED: {0}")]
    Request(#[from] reqwest::Error),

    #[error("RESPONSE DECODE ERROR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ENDPOINT REJECTED: {0}")]
    Api(String),

    #[error("ACCESS DENIED: {0}")]
    Unauthorized(String),

    #[error("ACCESS DENIED: NO API KEY")]
    NoApiKey,

    #[error("CORRUPTED RESPONSE")]
    InvalidResponse,

    #[error("RATE LIMITED")]
    RateLimited,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Tool call request emitted by the endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument payload, exactly as the endpoint produced it
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Wire form for echoing the call back inside an assistant message
    pub fn to_def(&self) -> ToolCallDef {
        ToolCallDef::new(&self.id, &self.name, &self.arguments)
    }
}

/// Why the endpoint stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    #[default]
    Stop,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Other(other) => other,
        }
    }
}

impl From<String> for FinishReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            _ => FinishReason::Other(value),
        }
    }
}

impl From<&str> for FinishReason {
    fn from(value: &str) -> Self {
        FinishReason::from(value.to_string())
    }
}

impl From<FinishReason> for String {
    fn from(value: FinishReason) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub usage: Usage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::default(),
        }
    }
}

/// Token accounting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One conversation turn, in the endpoint's wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallDef>,
    },
    Tool {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant turn requesting tool calls, optionally with accompanying text
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCallDef>) -> Self {
        Message::Assistant {
            content,
            tool_calls,
        }
    }

    pub fn tool(
        call_id: impl Into<String>,
        name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Message::Tool {
            tool_call_id: call_id.into(),
            name: Some(name.into()),
            content: result.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Message::System { content } | Message::User { content } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
            Message::Tool { content, .. } => Some(content),
        }
    }

    /// Tool calls requested by an assistant turn; empty for every other role
    pub fn requested_calls(&self) -> &[ToolCallDef] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Message::Tool { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }
}

/// Tool call as echoed back inside an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDef {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCallDef {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name and JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Tool specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Sampling scalars passed through to the endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

/// Request parameters. When `tools` is non-empty the endpoint chooses
/// freely among them.
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub sampling: SamplingParams,
}

impl ChatParams {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, sampling: SamplingParams) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            sampling,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }
}

/// Chat-completion endpoint
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse>;
}

/// Parameter schema for a tool that takes no arguments
pub fn empty_object_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========== ProviderError Tests ==========

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::NoApiKey;
        assert_eq!(err.to_string(), "ACCESS DENIED: NO API KEY");

        let err = ProviderError::Api("test error".to_string());
        assert_eq!(err.to_string(), "ENDPOINT REJECTED: test error");

        let err = ProviderError::Unauthorized("bad key".to_string());
        assert_eq!(err.to_string(), "ACCESS DENIED: bad key");

        let err = ProviderError::InvalidResponse;
        assert_eq!(err.to_string(), "CORRUPTED RESPONSE");

        let err = ProviderError::RateLimited;
        assert_eq!(err.to_string(), "RATE LIMITED");
    }

    // ========== FinishReason Tests ==========

    #[test]
    fn test_finish_reason_from_wire() {
        assert_eq!(FinishReason::from("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(
            FinishReason::from("length"),
            FinishReason::Other("length".to_string())
        );
    }

    #[test]
    fn test_finish_reason_serde() {
        let reason: FinishReason = serde_json::from_value(json!("content_filter")).unwrap();
        assert_eq!(reason, FinishReason::Other("content_filter".to_string()));
        assert_eq!(reason.to_string(), "content_filter");
        assert_eq!(
            serde_json::to_value(FinishReason::ToolCalls).unwrap(),
            json!("tool_calls")
        );
    }

    // ========== ChatResponse Tests ==========

    #[test]
    fn test_chat_response_text_builder() {
        let response = ChatResponse::text("Hello, world!");
        assert_eq!(response.content, Some("Hello, world!".to_string()));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_chat_response_tool_calls_builder() {
        let response = ChatResponse::tool_calls(vec![ToolCall::new("call_1", "Echo", "{}")]);
        assert!(response.has_tool_calls());
        assert!(response.content.is_none());
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage, Usage::default());
    }

    // ========== Message Tests ==========

    #[test]
    fn test_message_system_wire_shape() {
        let msg = Message::system("You are a helpful assistant");
        assert_eq!(msg.role(), "system");
        assert!(msg.is_system());
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "system", "content": "You are a helpful assistant"})
        );
    }

    #[test]
    fn test_message_assistant_with_tool_calls_wire_shape() {
        let msg = Message::assistant_tool_calls(
            None,
            vec![ToolCallDef::new("call_1", "Multiply", r#"{"a":2,"b":3}"#)],
        );

        assert_eq!(msg.content(), None);
        assert_eq!(msg.requested_calls().len(), 1);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "Multiply", "arguments": "{\"a\":2,\"b\":3}"}
                }]
            })
        );
    }

    #[test]
    fn test_message_plain_assistant_omits_tool_calls() {
        let value = serde_json::to_value(Message::assistant("The weather is sunny")).unwrap();
        assert_eq!(
            value,
            json!({"role": "assistant", "content": "The weather is sunny"})
        );
    }

    #[test]
    fn test_message_tool() {
        let msg = Message::tool("call_123", "get_weather", "{\"temperature\": 72}");
        assert_eq!(msg.role(), "tool");
        assert_eq!(msg.content(), Some("{\"temperature\": 72}"));
        assert_eq!(msg.tool_call_id(), Some("call_123"));
        assert!(msg.requested_calls().is_empty());

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["tool_call_id"], "call_123");
        assert_eq!(value["name"], "get_weather");
    }

    #[test]
    fn test_message_deserializes_by_role() {
        let msg: Message = serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(msg, Message::user("hi"));
    }

    // ========== ToolCall Tests ==========

    #[test]
    fn test_tool_call_to_def() {
        let call = ToolCall::new("call_1", "get_weather", r#"{"location":"NYC"}"#);
        let def = call.to_def();

        assert_eq!(def.id, "call_1");
        assert_eq!(def.call_type, "function");
        assert_eq!(def.function.name, "get_weather");
        assert_eq!(def.function.arguments, r#"{"location":"NYC"}"#);
    }

    // ========== Tool / schema Tests ==========

    #[test]
    fn test_tool_new() {
        let params = json!({
            "type": "object",
            "properties": {
                "location": {"type": "string"}
            }
        });
        let tool = Tool::new("get_weather", "Get weather information", params.clone());

        assert_eq!(tool.tool_type, "function");
        assert_eq!(tool.function.name, "get_weather");
        assert_eq!(tool.function.parameters, params);
    }

    #[test]
    fn test_empty_object_schema() {
        assert_eq!(
            empty_object_schema(),
            json!({"type": "object", "properties": {}, "required": []})
        );
    }

    // ========== ChatParams Tests ==========

    #[test]
    fn test_chat_params_new_has_no_tools() {
        let sampling = SamplingParams {
            temperature: 0.2,
            max_tokens: 64,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };
        let params = ChatParams::new("gpt-4o", vec![Message::user("hi")], sampling);
        assert_eq!(params.model, "gpt-4o");
        assert_eq!(params.messages.len(), 1);
        assert!(params.tools.is_empty());
        assert_eq!(params.sampling, sampling);

        let params = params.with_tools(vec![Tool::new("Echo", "Echo", empty_object_schema())]);
        assert_eq!(params.tools.len(), 1);
    }
}
