//! Conversation store
//!
//! An ordered log of turns that only grows by appending. The first turn is
//! always the system prompt; the log is replaced wholesale on reset.

use chrono::{DateTime, Local};
use conduit_provider::{Message, ToolCallDef};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Conversation invariant violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("TOOL RESULT {0} ANSWERS NO OUTSTANDING TOOL CALL")]
    UncorrelatedToolResult(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// A message together with the moment it was appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub message: Message,
    pub timestamp: DateTime<Local>,
}

impl Turn {
    fn now(message: Message) -> Self {
        Self {
            message,
            timestamp: Local::now(),
        }
    }
}

/// A single session's conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    id: Uuid,
    turns: Vec<Turn>,
    created_at: DateTime<Local>,
    updated_at: DateTime<Local>,
}

impl Conversation {
    /// Start a conversation seeded with a system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            id: Uuid::new_v4(),
            turns: vec![Turn::now(Message::system(system_prompt))],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Local> {
        self.updated_at
    }

    /// Content of the leading system turn
    pub fn system_prompt(&self) -> &str {
        self.turns
            .first()
            .and_then(|turn| match &turn.message {
                Message::System { content } => Some(content.as_str()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Messages in order, ready to submit to the endpoint
    pub fn messages(&self) -> Vec<Message> {
        self.turns.iter().map(|turn| turn.message.clone()).collect()
    }

    pub fn last(&self) -> Option<&Message> {
        self.turns.last().map(|turn| &turn.message)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the system turn is always present
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn append(&mut self, message: Message) {
        self.turns.push(Turn::now(message));
        self.updated_at = Local::now();
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.append(Message::user(content));
    }

    /// Final assistant text
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.append(Message::assistant(content));
    }

    /// Assistant turn requesting tool calls
    pub fn push_tool_calls(&mut self, content: Option<String>, calls: Vec<ToolCallDef>) {
        self.append(Message::assistant_tool_calls(content, calls));
    }

    /// Append a tool result. The id must answer a call of the nearest
    /// assistant turn that has not been answered yet.
    pub fn push_tool_result(
        &mut self,
        call_id: &str,
        name: impl Into<String>,
        result: impl Into<String>,
    ) -> Result<()> {
        if !self.outstanding_tool_calls().iter().any(|c| c.id == call_id) {
            return Err(SessionError::UncorrelatedToolResult(call_id.to_string()));
        }
        self.append(Message::tool(call_id, name, result));
        Ok(())
    }

    /// Calls requested by the latest assistant turn that have no result yet
    pub fn outstanding_tool_calls(&self) -> Vec<&ToolCallDef> {
        let Some(pos) = self
            .turns
            .iter()
            .rposition(|turn| !matches!(turn.message, Message::Tool { .. }))
        else {
            return Vec::new();
        };

        // Each result answers exactly one request, even when ids repeat
        let mut answered: Vec<&str> = self.turns[pos + 1..]
            .iter()
            .filter_map(|turn| turn.message.tool_call_id())
            .collect();

        self.turns[pos]
            .message
            .requested_calls()
            .iter()
            .filter(|call| match answered.iter().position(|id| *id == call.id) {
                Some(i) => {
                    answered.swap_remove(i);
                    false
                }
                None => true,
            })
            .collect()
    }

    /// Drop everything but a fresh system turn carrying the current prompt
    pub fn reset(&mut self) {
        let prompt = self.system_prompt().to_string();
        self.replace_system_prompt(prompt);
    }

    /// Drop everything and start over with a new system prompt
    pub fn replace_system_prompt(&mut self, prompt: impl Into<String>) {
        let dropped = self.turns.len().saturating_sub(1);
        self.turns = vec![Turn::now(Message::system(prompt))];
        self.updated_at = Local::now();
        debug!("Conversation {} reset, {} turns dropped", self.id, dropped);
    }
}
