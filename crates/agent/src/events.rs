//! Progress events observable while a directive runs

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A completion request is about to be sent; `cycle` counts tool rounds so far
    CompletionRequested { cycle: u32 },
    ToolCallStarted {
        id: String,
        name: String,
        arguments: String,
    },
    /// `text` is the first content block when that block is textual
    ToolResult {
        id: String,
        name: String,
        text: Option<String>,
    },
    ToolFailed {
        id: String,
        name: String,
        error: String,
    },
    Reply { text: String },
}

pub type EventSender = mpsc::UnboundedSender<AgentEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AgentEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send if anyone is listening; a dropped receiver is not an error
pub(crate) fn emit(events: &Option<EventSender>, event: AgentEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
