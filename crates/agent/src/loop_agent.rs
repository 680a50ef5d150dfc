//! Agent loop - the session state machine
//!
//! Lines (or already parsed directives) go in, replies come out. Reserved
//! directives are answered locally; everything else becomes a user turn and
//! drives completion / dispatch cycles until the endpoint stops.

use std::sync::Arc;

use conduit_config::{Settings, DEFAULTS};
use conduit_mcp::ToolService;
use conduit_provider::{Provider, SamplingParams, ToolCall};
use conduit_session::Conversation;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, Instrument};

use crate::completion::{Completion, CompletionDriver};
use crate::directive::{parse_directive, Directive};
use crate::dispatch::ToolDispatcher;
use crate::events::{emit, AgentEvent, EventSender};
use crate::registry::ToolRegistry;
use crate::{AgentError, Result};

/// Knobs for a session
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOptions {
    pub model: String,
    pub sampling: SamplingParams,
    pub system_prompt: String,
    /// Restored when a prompt change is cancelled
    pub default_system_prompt: String,
    pub max_tool_cycles: u32,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: DEFAULTS.model.to_string(),
            sampling: SamplingParams {
                temperature: DEFAULTS.temperature,
                max_tokens: DEFAULTS.max_output_tokens,
                top_p: DEFAULTS.top_p,
                frequency_penalty: DEFAULTS.frequency_penalty,
                presence_penalty: DEFAULTS.presence_penalty,
            },
            system_prompt: DEFAULTS.system_prompt.to_string(),
            default_system_prompt: DEFAULTS.system_prompt.to_string(),
            max_tool_cycles: DEFAULTS.max_tool_cycles,
        }
    }
}

impl From<&Settings> for AgentOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            model: settings.model.clone(),
            sampling: SamplingParams {
                temperature: settings.temperature,
                max_tokens: settings.max_output_tokens,
                top_p: settings.top_p,
                frequency_penalty: settings.frequency_penalty,
                presence_penalty: settings.presence_penalty,
            },
            system_prompt: settings.system_prompt.clone(),
            default_system_prompt: settings.default_system_prompt.clone(),
            max_tool_cycles: settings.max_tool_cycles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    /// `set prompt` was seen; the next line is the new prompt
    AwaitingPrompt,
    Submitting,
    Responding,
    Dispatching,
    Terminated,
}

/// What the caller should show for a handled line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    Prompt(String),
    Cleared,
    AwaitingPrompt,
    PromptChanged(String),
    /// Empty follow-up line; the default prompt is back in place
    PromptChangeCancelled(String),
    Exit,
}

/// The agent loop owns the conversation and drives every cycle
pub struct AgentLoop<P: Provider, S: ToolService> {
    driver: CompletionDriver<P>,
    dispatcher: ToolDispatcher<S>,
    registry: ToolRegistry,
    conversation: Conversation,
    default_system_prompt: String,
    max_tool_cycles: u32,
    state: LoopState,
    events: Option<EventSender>,
}

impl<P: Provider, S: ToolService> AgentLoop<P, S> {
    /// Create a loop over an already discovered registry
    pub fn new(provider: P, service: Arc<S>, registry: ToolRegistry, options: AgentOptions) -> Self {
        Self {
            driver: CompletionDriver::new(Arc::new(provider), options.model, options.sampling),
            dispatcher: ToolDispatcher::new(service),
            registry,
            conversation: Conversation::new(options.system_prompt),
            default_system_prompt: options.default_system_prompt,
            max_tool_cycles: options.max_tool_cycles,
            state: LoopState::AwaitingInput,
            events: None,
        }
    }

    /// Discover the tool set, then create the loop
    pub async fn start(provider: P, service: Arc<S>, options: AgentOptions) -> Result<Self> {
        let registry = ToolRegistry::discover(service.as_ref()).await?;
        Ok(Self::new(provider, service, registry, options))
    }

    /// Publish progress events to `events`
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.dispatcher = self.dispatcher.with_events(events.clone());
        self.events = Some(events);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn system_prompt(&self) -> &str {
        self.conversation.system_prompt()
    }

    pub fn service(&self) -> &Arc<S> {
        self.dispatcher.service()
    }

    pub fn model(&self) -> &str {
        self.driver.model()
    }

    fn transition(&mut self, next: LoopState) {
        trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Drop history, keeping the current system prompt
    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    /// Replace the system prompt and start a fresh history
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.conversation.replace_system_prompt(prompt);
    }

    /// Feed one raw input line through the state machine
    pub async fn handle_line(&mut self, line: &str, cancel: &CancellationToken) -> Result<Reply> {
        match self.state {
            LoopState::Terminated => Ok(Reply::Exit),
            LoopState::AwaitingPrompt => {
                self.transition(LoopState::AwaitingInput);
                let prompt = line.trim();
                if prompt.is_empty() {
                    let fallback = self.default_system_prompt.clone();
                    self.set_system_prompt(fallback.clone());
                    info!("Prompt change cancelled");
                    Ok(Reply::PromptChangeCancelled(fallback))
                } else {
                    self.set_system_prompt(prompt);
                    info!("System prompt replaced");
                    Ok(Reply::PromptChanged(prompt.to_string()))
                }
            }
            _ => self.handle(parse_directive(line), cancel).await,
        }
    }

    /// Act on a parsed directive
    pub async fn handle(&mut self, directive: Directive, cancel: &CancellationToken) -> Result<Reply> {
        if self.state == LoopState::Terminated {
            return Ok(Reply::Exit);
        }

        match directive {
            Directive::Exit => {
                self.transition(LoopState::Terminated);
                Ok(Reply::Exit)
            }
            Directive::Clear => {
                self.reset();
                Ok(Reply::Cleared)
            }
            Directive::ShowPrompt => Ok(Reply::Prompt(self.system_prompt().to_string())),
            Directive::SetPrompt => {
                self.transition(LoopState::AwaitingPrompt);
                Ok(Reply::AwaitingPrompt)
            }
            Directive::Message(text) => self.submit(&text, cancel).await.map(Reply::Answer),
        }
    }

    /// Append a user turn and cycle until the endpoint produces a final answer
    pub async fn submit(&mut self, text: &str, cancel: &CancellationToken) -> Result<String> {
        let span = info_span!("directive", conversation = %self.conversation.id());
        let result = self.run(text, cancel).instrument(span).await;
        self.transition(LoopState::AwaitingInput);
        result
    }

    async fn run(&mut self, text: &str, cancel: &CancellationToken) -> Result<String> {
        self.conversation.push_user(text);
        let mut cycles: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!("Cancelled before completion request");
                return Err(AgentError::Cancelled);
            }

            self.transition(LoopState::Submitting);
            emit(&self.events, AgentEvent::CompletionRequested { cycle: cycles });
            debug!("Completion request, cycle {}", cycles);

            match self.driver.complete(&self.conversation, &self.registry).await? {
                Completion::Final { text } => {
                    self.transition(LoopState::Responding);
                    self.conversation.push_assistant(text.clone());
                    emit(&self.events, AgentEvent::Reply { text: text.clone() });
                    return Ok(text);
                }
                Completion::ToolCalls { text, calls } => {
                    cycles += 1;
                    if cycles > self.max_tool_cycles {
                        return Err(AgentError::ToolCallDepthExceeded(self.max_tool_cycles));
                    }

                    self.transition(LoopState::Dispatching);
                    let requests = calls.iter().map(ToolCall::to_def).collect();
                    self.conversation.push_tool_calls(text, requests);

                    let report = self
                        .dispatcher
                        .dispatch(&self.registry, &calls, &mut self.conversation, cancel)
                        .await?;
                    debug!(
                        "Cycle {}: {} tool calls, {} failed",
                        cycles,
                        report.len(),
                        report.failed()
                    );
                }
            }
        }
    }
}
