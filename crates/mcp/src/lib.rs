//! Remote tool execution over the Model Context Protocol
//!
//! The [`ToolService`] trait is what the agent core needs from a tool host;
//! [`McpClient`] implements it against an MCP server over streamable HTTP.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod client;
pub mod protocol;

pub use client::McpClient;
pub use protocol::{CallToolResult, Content, InitializeResult, ServerInfo, ToolDescriptor};

/// Tool service errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("TOOL SERVICE UNREACHABLE: {0}")]
    Request(#[from] reqwest::Error),

    #[error("TOOL SERVICE DECODE ERROR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOOL SERVICE HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("TOOL SERVICE ERROR {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("TOOL SERVICE PROTOCOL ERROR: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, McpError>;

/// A host of remotely callable tools
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Every tool the service exposes
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke one tool by name
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<CallToolResult>;
}
