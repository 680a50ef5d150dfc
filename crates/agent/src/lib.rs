//! Agent orchestration core
//!
//! Holds the conversation, submits it to the completion endpoint, runs the
//! tool calls the endpoint asks for and feeds the results back until a final
//! answer arrives.

use conduit_mcp::McpError;
use conduit_provider::ProviderError;
use conduit_session::SessionError;
use thiserror::Error;

pub mod completion;
pub mod directive;
pub mod dispatch;
pub mod events;
pub mod loop_agent;
pub mod registry;

pub use completion::{Completion, CompletionDriver};
pub use directive::{parse_directive, Directive};
pub use dispatch::{DispatchReport, ToolCallOutcome, ToolDispatcher, ToolExecutionError};
pub use events::{AgentEvent, EventSender};
pub use loop_agent::{AgentLoop, AgentOptions, LoopState, Reply};
pub use registry::ToolRegistry;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("◆ TOOL SERVICE UNAVAILABLE: {0}")]
    RegistryUnavailable(#[source] McpError),

    #[error("◆ COMPLETION FAILED: {0}")]
    Completion(#[from] ProviderError),

    #[error("◆ UNHANDLED FINISH REASON: {0}")]
    UnhandledFinishReason(String),

    #[error("◆ TOOL CALL DEPTH EXCEEDED ({0} CYCLES)")]
    ToolCallDepthExceeded(u32),

    #[error("◆ CANCELLED")]
    Cancelled,

    #[error("◆ CONVERSATION ERROR: {0}")]
    Conversation(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
