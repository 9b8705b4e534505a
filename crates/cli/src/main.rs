//! Helmsman CLI — the main entry point.
//!
//! Commands:
//! - `run`    — Execute one agent run for a prompt, streaming progress
//! - `tools`  — List the registered tools

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "helmsman",
    about = "Helmsman — an LLM agent that plans multi-step tasks with tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a single prompt
    Run {
        /// The task for the agent
        prompt: String,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the registered tools
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { prompt, model } => commands::run::run(&prompt, model).await,
        Commands::Tools => commands::tools::run(),
    }
}
