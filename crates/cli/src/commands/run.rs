//! `helmsman run` — execute one agent run and render the event stream.

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context as _;
use helmsman_agent::{AgentEvent, AgentLoop, StepStatus};
use helmsman_config::AppConfig;

pub async fn run(prompt: &str, model: Option<String>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;
    if let Some(model) = model {
        config.transport.model = model;
    }

    // Check for an API key early and give a clear error
    if config.transport.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    HELMSMAN_API_KEY=sk-...      (generic)");
        eprintln!("    OPENROUTER_API_KEY=sk-or-... (for OpenRouter)");
        eprintln!("    OPENAI_API_KEY=sk-...        (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        anyhow::bail!("No API key found. See above for setup instructions.");
    }

    let transport = Arc::new(helmsman_transport::build_from_config(&config)?);
    let tools = Arc::new(helmsman_tools::default_registry());
    let agent = Arc::new(AgentLoop::from_config(transport, tools, &config));

    let mut events = agent.run(prompt, vec![]);
    let mut stdout = std::io::stdout();

    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::Step { status, text } => {
                let tag = match status {
                    StepStatus::Thinking => "thinking",
                    StepStatus::Acting => "acting",
                    StepStatus::Info => "info",
                    StepStatus::Warning => "warning",
                    StepStatus::Error => "error",
                    StepStatus::Done => "done",
                };
                eprintln!("  [{tag}] {text}");
            }
            AgentEvent::AnswerChunk { content } => {
                print!("{content}");
                let _ = stdout.flush();
            }
            AgentEvent::ToolPayload { kind, payload } => {
                eprintln!("  [{kind}]");
                if let Some(filename) = payload.get("filename").and_then(|v| v.as_str()) {
                    eprintln!("    -> {filename}");
                }
            }
            AgentEvent::FinalResponse(payload) => {
                println!();
                if !payload.sources.is_empty() {
                    eprintln!("  {} source(s) gathered", payload.sources.len());
                }
                if !payload.artifacts.is_empty() {
                    eprintln!("  {} artifact(s) produced", payload.artifacts.len());
                }
            }
        }
    }

    Ok(())
}
