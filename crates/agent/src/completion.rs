//! Completion driver

use std::collections::HashSet;
use std::sync::Arc;

use conduit_provider::{ChatParams, FinishReason, Provider, ProviderError, SamplingParams, ToolCall};
use conduit_session::Conversation;
use tracing::{debug, warn};

use crate::registry::ToolRegistry;
use crate::{AgentError, Result};

/// What the endpoint wants next
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Terminal answer
    Final { text: String },
    /// One or more tool invocations, possibly with accompanying text
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
}

/// Submits the conversation and tool schema to the completion endpoint
pub struct CompletionDriver<P: Provider> {
    provider: Arc<P>,
    model: String,
    sampling: SamplingParams,
}

impl<P: Provider> CompletionDriver<P> {
    pub fn new(provider: Arc<P>, model: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            provider,
            model: model.into(),
            sampling,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn sampling(&self) -> SamplingParams {
        self.sampling
    }

    pub async fn complete(
        &self,
        conversation: &Conversation,
        registry: &ToolRegistry,
    ) -> Result<Completion> {
        let params = ChatParams::new(&self.model, conversation.messages(), self.sampling)
            .with_tools(registry.definitions());

        let response = self.provider.chat(params).await?;
        debug!(
            "Completion finished ({}), tokens: {} prompt / {} completion",
            response.finish_reason,
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );

        match response.finish_reason {
            FinishReason::Stop => Ok(Completion::Final {
                text: response.content.unwrap_or_default(),
            }),
            FinishReason::ToolCalls if response.tool_calls.is_empty() => {
                Err(ProviderError::InvalidResponse.into())
            }
            FinishReason::ToolCalls if has_duplicate_ids(&response.tool_calls) => {
                warn!("Endpoint repeated a tool call id within one batch");
                Err(ProviderError::InvalidResponse.into())
            }
            FinishReason::ToolCalls => Ok(Completion::ToolCalls {
                text: response.content.filter(|t| !t.is_empty()),
                calls: response.tool_calls,
            }),
            FinishReason::Other(reason) => Err(AgentError::UnhandledFinishReason(reason)),
        }
    }
}

/// True when two calls of one batch share an id
fn has_duplicate_ids(calls: &[ToolCall]) -> bool {
    let mut seen = HashSet::new();
    !calls.iter().all(|call| seen.insert(call.id.as_str()))
}
