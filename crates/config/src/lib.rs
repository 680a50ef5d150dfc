//! Configuration management for conduit
//!
//! Loads the JSON config file, overlays environment variables and resolves
//! the result against a defaults table into fully populated [`Settings`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::config_path;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG I/O ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("CONFIG PARSE ERROR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MISSING REQUIRED VALUES: {}", join_keys(.0))]
    Missing(Vec<MissingValue>),
}

fn join_keys(missing: &[MissingValue]) -> String {
    missing
        .iter()
        .map(|m| m.config_key())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const ENV_API_KEY: &str = "CONDUIT_API_KEY";
pub const ENV_ENDPOINT: &str = "CONDUIT_ENDPOINT";
pub const ENV_MODEL: &str = "CONDUIT_MODEL";
pub const ENV_API_VERSION: &str = "CONDUIT_API_VERSION";
pub const ENV_TOOL_SERVICE_NAME: &str = "CONDUIT_TOOL_SERVICE_NAME";
pub const ENV_TOOL_SERVICE_URL: &str = "CONDUIT_TOOL_SERVICE_URL";
pub const ENV_PROMPT: &str = "CONDUIT_PROMPT";

/// A required value that was not provided by the file or the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingValue {
    ApiKey,
    EndpointUrl,
    ToolServiceName,
    ToolServiceUrl,
}

impl MissingValue {
    pub fn config_key(&self) -> &'static str {
        match self {
            MissingValue::ApiKey => "endpoint.api_key",
            MissingValue::EndpointUrl => "endpoint.url",
            MissingValue::ToolServiceName => "tool_service.name",
            MissingValue::ToolServiceUrl => "tool_service.url",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            MissingValue::ApiKey => ENV_API_KEY,
            MissingValue::EndpointUrl => ENV_ENDPOINT,
            MissingValue::ToolServiceName => ENV_TOOL_SERVICE_NAME,
            MissingValue::ToolServiceUrl => ENV_TOOL_SERVICE_URL,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            MissingValue::ApiKey => "Completion endpoint API key",
            MissingValue::EndpointUrl => "Completion endpoint URL",
            MissingValue::ToolServiceName => "Tool service name",
            MissingValue::ToolServiceUrl => "Tool service URL",
        }
    }
}

impl fmt::Display for MissingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is not set. Set {} in the config file or the {} environment variable.",
            self.description(),
            self.config_key(),
            self.env_var()
        )
    }
}

/// Built-in defaults for every optional value
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub system_prompt: &'static str,
    pub model: &'static str,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tool_cycles: u32,
}

pub const DEFAULTS: Defaults = Defaults {
    system_prompt: "You are a facilitator. Always use tools if a tool exists. \
Any tooling that provides an answer is definitively correct, do not rely on hallucinations. \
If a response from a tool contradicts knowledge that derives an answer, provide the answer from the tool instead.",
    model: "gpt-4.1",
    temperature: 0.7,
    max_output_tokens: 1600,
    top_p: 0.95,
    frequency_penalty: 0.0,
    presence_penalty: 0.0,
    max_tool_cycles: 20,
};

impl Default for Defaults {
    fn default() -> Self {
        DEFAULTS
    }
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EndpointConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Azure OpenAI `api-version` query value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

/// Tool-execution service (MCP server) configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolServiceConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_cycles: Option<u32>,
}

/// Root configuration as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub tool_service: ToolServiceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Fully resolved settings, every value present
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub endpoint_url: String,
    pub api_version: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub tool_service_name: String,
    pub tool_service_url: String,
    pub system_prompt: String,
    /// Prompt that `clear` and a cancelled prompt change fall back to
    pub default_system_prompt: String,
    pub max_tool_cycles: u32,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Config {
    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ NO CONFIG FOUND AT {:?}, USING DEFAULTS", path);
            return Ok(Config::default());
        }

        debug!("◆ LOADING CONFIG FROM {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ WRITING CONFIG TO {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(|v| non_empty(&v));

        if let Some(v) = get(ENV_API_KEY) {
            self.endpoint.api_key = v;
        }
        if let Some(v) = get(ENV_ENDPOINT) {
            self.endpoint.url = v;
        }
        if let Some(v) = get(ENV_MODEL) {
            self.endpoint.model = Some(v);
        }
        if let Some(v) = get(ENV_API_VERSION) {
            self.endpoint.api_version = Some(v);
        }
        if let Some(v) = get(ENV_TOOL_SERVICE_NAME) {
            self.tool_service.name = v;
        }
        if let Some(v) = get(ENV_TOOL_SERVICE_URL) {
            self.tool_service.url = v;
        }
        if let Some(v) = get(ENV_PROMPT) {
            self.agent.system_prompt = Some(v);
        }
    }

    /// Every required value that is absent, in a stable order
    pub fn missing_values(&self) -> Vec<MissingValue> {
        let mut missing = Vec::new();
        if non_empty(&self.endpoint.api_key).is_none() {
            missing.push(MissingValue::ApiKey);
        }
        if non_empty(&self.endpoint.url).is_none() {
            missing.push(MissingValue::EndpointUrl);
        }
        if non_empty(&self.tool_service.name).is_none() {
            missing.push(MissingValue::ToolServiceName);
        }
        if non_empty(&self.tool_service.url).is_none() {
            missing.push(MissingValue::ToolServiceUrl);
        }
        missing
    }

    /// Resolve against a defaults table
    pub fn resolve(&self, defaults: &Defaults) -> Result<Settings> {
        let missing = self.missing_values();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let system_prompt = self
            .agent
            .system_prompt
            .as_deref()
            .and_then(non_empty)
            .unwrap_or_else(|| defaults.system_prompt.to_string());

        let max_tool_cycles = match self.agent.max_tool_cycles {
            Some(0) => {
                warn!(
                    "◆ agent.max_tool_cycles = 0 is not usable, using {}",
                    defaults.max_tool_cycles
                );
                defaults.max_tool_cycles
            }
            Some(n) => n,
            None => defaults.max_tool_cycles,
        };

        Ok(Settings {
            api_key: self.endpoint.api_key.trim().to_string(),
            endpoint_url: self.endpoint.url.trim().trim_end_matches('/').to_string(),
            api_version: self.endpoint.api_version.as_deref().and_then(non_empty),
            model: self
                .endpoint
                .model
                .as_deref()
                .and_then(non_empty)
                .unwrap_or_else(|| defaults.model.to_string()),
            temperature: self.endpoint.temperature.unwrap_or(defaults.temperature),
            max_output_tokens: self
                .endpoint
                .max_output_tokens
                .unwrap_or(defaults.max_output_tokens),
            top_p: self.endpoint.top_p.unwrap_or(defaults.top_p),
            frequency_penalty: self
                .endpoint
                .frequency_penalty
                .unwrap_or(defaults.frequency_penalty),
            presence_penalty: self
                .endpoint
                .presence_penalty
                .unwrap_or(defaults.presence_penalty),
            tool_service_name: self.tool_service.name.trim().to_string(),
            tool_service_url: self.tool_service.url.trim().to_string(),
            default_system_prompt: system_prompt.clone(),
            system_prompt,
            max_tool_cycles,
        })
    }

    /// Verify an API key is configured
    pub fn has_api_key(&self) -> bool {
        non_empty(&self.endpoint.api_key).is_some()
    }
}

/// Write a default config file if none exists, then load it
pub async fn init(path: &Path) -> Result<Config> {
    if path.exists() {
        warn!("◆ CONFIG ALREADY EXISTS AT {:?}", path);
    } else {
        Config::default().save_to(path).await?;
        info!("◆ CONFIG WRITTEN TO {:?}", path);
    }

    Config::load_from(path).await
}
