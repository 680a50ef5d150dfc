//! conduit command implementations

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conduit_agent::events::{channel, EventReceiver};
use conduit_agent::{AgentEvent, AgentLoop, AgentOptions, Reply, ToolRegistry};
use conduit_config::{self, Config, MissingValue, Settings, DEFAULTS};
use conduit_mcp::McpClient;
use conduit_provider::OpenAiProvider;

fn resolve_path(config: Option<&Path>) -> PathBuf {
    config
        .map(Path::to_path_buf)
        .unwrap_or_else(conduit_config::config_path)
}

/// Config file plus environment overrides
async fn load_config(config: Option<&Path>) -> Result<Config> {
    let path = resolve_path(config);
    let mut config = Config::load_from(&path)
        .await
        .with_context(|| format!("◆ Failed to load config from {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

/// Print one line per missing value and fail if there are any
fn require(missing: &[MissingValue]) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    for value in missing {
        eprintln!("◆ {}", value);
    }
    bail!(
        "◆ Configuration incomplete: {} required value(s) missing",
        missing.len()
    )
}

async fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let config = load_config(config).await?;
    require(&config.missing_values())?;
    Ok(config.resolve(&DEFAULTS)?)
}

fn build_provider(settings: &Settings) -> OpenAiProvider {
    let provider = OpenAiProvider::new(&settings.api_key, &settings.endpoint_url);
    match &settings.api_version {
        Some(version) => provider.with_api_version(version),
        None => provider,
    }
}

async fn connect_tools(name: &str, url: &str) -> Result<McpClient> {
    McpClient::connect(name, url)
        .await
        .with_context(|| format!("◆ Failed to connect to tool service {} at {}", name, url))
}

/// Print tool activity that happened during the last directive
fn drain_events(events: &mut EventReceiver) {
    while let Ok(event) = events.try_recv() {
        match event {
            AgentEvent::ToolCallStarted {
                name, arguments, ..
            } => println!("  → {}({})", name, arguments),
            AgentEvent::ToolResult {
                name,
                text: Some(text),
                ..
            } => println!("  ← {}: {}", name, text),
            AgentEvent::ToolResult { name, text: None, .. } => println!("  ← {}", name),
            AgentEvent::ToolFailed { name, error, .. } => println!("  ✗ {}: {}", name, error),
            AgentEvent::CompletionRequested { .. } | AgentEvent::Reply { .. } => {}
        }
    }
}

/// Run one line with Ctrl-C wired to a fresh cancellation token
async fn run_line(
    agent: &mut AgentLoop<OpenAiProvider, McpClient>,
    line: &str,
) -> conduit_agent::Result<Reply> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = agent.handle_line(line, &cancel).await;
    watcher.abort();
    result
}

/// Chat with the agent
pub async fn chat_command(config: Option<&Path>, message: Option<String>) -> Result<()> {
    let settings = load_settings(config).await?;
    let provider = build_provider(&settings);
    let tools = Arc::new(
        connect_tools(&settings.tool_service_name, &settings.tool_service_url).await?,
    );

    let (tx, mut events) = channel();
    let started = AgentLoop::start(provider, tools.clone(), AgentOptions::from(&settings)).await;
    let mut agent = match started {
        Ok(agent) => agent.with_events(tx),
        Err(e) => {
            close_tools(&tools).await;
            return Err(e.into());
        }
    };
    info!(
        "◆ Session {} started with {} tools",
        agent.conversation().id(),
        agent.registry().len()
    );

    let outcome = match message {
        Some(message) => one_shot(&mut agent, &mut events, &message).await,
        None => interactive(&mut agent, &mut events).await,
    };

    close_tools(&tools).await;
    outcome
}

async fn close_tools(client: &McpClient) {
    if let Err(e) = client.close().await {
        warn!("◆ Failed to close tool session: {}", e);
    }
}

async fn one_shot(
    agent: &mut AgentLoop<OpenAiProvider, McpClient>,
    events: &mut EventReceiver,
    message: &str,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let answer = agent.submit(message, &cancel).await;
    drain_events(events);
    println!("\n◆ {}", answer?);
    Ok(())
}

async fn interactive(
    agent: &mut AgentLoop<OpenAiProvider, McpClient>,
    events: &mut EventReceiver,
) -> Result<()> {
    println!("◆ Interactive mode ({} tools)", agent.registry().len());
    println!("  clear | show prompt | set prompt | exit");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!("Your prompt:");
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            debug!("Input closed");
            break;
        };

        match run_line(agent, &line).await {
            Ok(Reply::Answer(text)) => {
                drain_events(events);
                println!("\n◆ {}\n", text);
            }
            Ok(Reply::Prompt(text)) => println!("Prompt:\n{}", text),
            Ok(Reply::Cleared) => println!("Clearing chat history..."),
            Ok(Reply::AwaitingPrompt) => println!("Changing prompt:"),
            Ok(Reply::PromptChanged(text)) => println!("Prompt:\n{}", text),
            Ok(Reply::PromptChangeCancelled(text)) => {
                println!("Prompt change cancelled.");
                println!("Prompt:\n{}", text);
            }
            Ok(Reply::Exit) => break,
            Err(e) => {
                drain_events(events);
                eprintln!("{}", e);
            }
        }
    }

    Ok(())
}

/// List the tools the tool service exposes
pub async fn tools_command(config: Option<&Path>) -> Result<()> {
    let config = load_config(config).await?;
    let missing: Vec<MissingValue> = config
        .missing_values()
        .into_iter()
        .filter(|m| {
            matches!(
                m,
                MissingValue::ToolServiceName | MissingValue::ToolServiceUrl
            )
        })
        .collect();
    require(&missing)?;

    let name = config.tool_service.name.trim();
    let client = connect_tools(name, config.tool_service.url.trim()).await?;
    let registry = match ToolRegistry::discover(&client).await {
        Ok(registry) => registry,
        Err(e) => {
            close_tools(&client).await;
            return Err(e.into());
        }
    };

    println!("◆ {} tools from {}", registry.len(), name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for tool in registry.descriptors() {
        match tool.description.as_deref() {
            Some(description) if !description.is_empty() => {
                println!("  {} - {}", tool.name, description)
            }
            _ => println!("  {}", tool.name),
        }
    }

    close_tools(&client).await;
    Ok(())
}

/// Write a default config file
pub async fn init_command(config: Option<&Path>) -> Result<()> {
    let path = resolve_path(config);
    println!("◆ Initializing conduit...");

    conduit_config::init(&path)
        .await
        .with_context(|| format!("◆ Failed to write config to {}", path.display()))?;

    println!("◆ Config at {}", path.display());
    println!("\nNext steps:");
    println!("  1. Set endpoint.api_key and endpoint.url (or CONDUIT_API_KEY / CONDUIT_ENDPOINT)");
    println!("  2. Set tool_service.name and tool_service.url");
    println!("  3. Start chatting: conduit chat");
    Ok(())
}

/// Show configuration state without secrets
pub async fn status_command(config: Option<&Path>) -> Result<()> {
    let path = resolve_path(config);
    let config = load_config(Some(&path)).await?;

    println!("◆ conduit status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Config:    {} {}",
        path.display(),
        if path.exists() { "[OK]" } else { "[Missing]" }
    );
    println!(
        "API Key:   {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Endpoint:  {}", or_unset(&config.endpoint.url));
    println!(
        "Model:     {}",
        config.endpoint.model.as_deref().unwrap_or(DEFAULTS.model)
    );
    if let Some(version) = &config.endpoint.api_version {
        println!("API ver:   {}", version);
    }
    println!(
        "Tools:     {} {}",
        or_unset(&config.tool_service.name),
        config.tool_service.url.trim()
    );
    println!(
        "Prompt:    {}",
        if config.agent.system_prompt.is_some() {
            "[Custom]"
        } else {
            "[Default]"
        }
    );

    let missing = config.missing_values();
    if missing.is_empty() {
        println!("\n◆ Ready");
    } else {
        println!();
        for value in missing {
            println!("◆ {}", value);
        }
    }
    Ok(())
}

fn or_unset(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        "[Not set]"
    } else {
        value
    }
}
