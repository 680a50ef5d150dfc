//! OpenAI-compatible chat-completion client
//!
//! Speaks the plain OpenAI `/chat/completions` API and the Azure OpenAI
//! deployment-scoped variant of it.

use crate::{
    ChatParams, ChatResponse, FinishReason, Provider, ProviderError, Result, ToolCall, Usage,
};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, trace};

/// Azure `api-version` used when the endpoint is Azure but none is configured
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

#[derive(Debug, Clone, PartialEq)]
enum Flavor {
    OpenAi,
    Azure { api_version: String },
}

/// OpenAI-compatible endpoint
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    flavor: Flavor,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let api_base = api_base.into().trim_end_matches('/').to_string();

        let flavor = if api_base.contains(".openai.azure.com") {
            Flavor::Azure {
                api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            }
        } else {
            Flavor::OpenAi
        };

        Self {
            client: Client::new(),
            api_key,
            api_base,
            flavor,
        }
    }

    /// Force Azure deployment routing with the given `api-version`
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.flavor = Flavor::Azure {
            api_version: api_version.into(),
        };
        self
    }

    pub fn is_azure(&self) -> bool {
        matches!(self.flavor, Flavor::Azure { .. })
    }

    fn endpoint_url(&self, model: &str) -> String {
        match &self.flavor {
            Flavor::OpenAi => format!("{}/chat/completions", self.api_base),
            Flavor::Azure { api_version } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.api_base, model, api_version
            ),
        }
    }

    fn build_request(&self, params: &ChatParams) -> Result<serde_json::Value> {
        let mut body = json!({
            "model": params.model,
            "messages": serde_json::to_value(&params.messages)?,
            "max_tokens": params.sampling.max_tokens,
            "temperature": params.sampling.temperature,
            "top_p": params.sampling.top_p,
            "frequency_penalty": params.sampling.frequency_penalty,
            "presence_penalty": params.sampling.presence_penalty,
        });

        if !params.tools.is_empty() {
            body["tools"] = serde_json::to_value(&params.tools)?;
            body["tool_choice"] = json!("auto");
        }

        Ok(body)
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        let content = message["content"].as_str().map(|s| s.to_string());

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                let arguments = match &function["arguments"] {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };

                tool_calls.push(ToolCall {
                    id: call["id"].as_str().unwrap_or("").to_string(),
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    arguments,
                });
            }
        }

        let finish_reason = match choice["finish_reason"].as_str() {
            Some(reason) => FinishReason::from(reason),
            None if !tool_calls.is_empty() => FinishReason::ToolCalls,
            None => FinishReason::Stop,
        };

        let usage = if let Some(usage) = json["usage"].as_object() {
            let count = |key: &str| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            Usage {
                prompt_tokens: count("prompt_tokens"),
                completion_tokens: count("completion_tokens"),
                total_tokens: count("total_tokens"),
            }
        } else {
            Usage::default()
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }

    fn error_message(status: StatusCode, body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| json["error"]["message"].as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| {
                let text = body.trim();
                if text.is_empty() {
                    status.to_string()
                } else {
                    let excerpt: String = text.chars().take(200).collect();
                    format!("{}: {}", status, excerpt)
                }
            })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let body = self.build_request(&params)?;
        let url = self.endpoint_url(&params.model);
        trace!("◆ POST {}", url);

        let request = self.client.post(&url).json(&body);
        let request = match self.flavor {
            Flavor::OpenAi => request.bearer_auth(&self.api_key),
            Flavor::Azure { .. } => request.header("api-key", &self.api_key),
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = Self::error_message(status, &text);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::Unauthorized(message)
                }
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
                _ => ProviderError::Api(message),
            });
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let response = self.parse_response(json)?;

        debug!(
            "◆ COMPLETION: finish={} tool_calls={} tokens={}",
            response.finish_reason,
            response.tool_calls.len(),
            response.usage.total_tokens
        );

        Ok(response)
    }
}
