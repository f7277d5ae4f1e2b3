pub mod ask;
pub mod chat;
pub mod check;
pub mod config;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::client::AgentClient;
use crate::config::ChatConfig;
use crate::error::Result;
use crate::provider::bedrock::BedrockProvider;
use crate::session::Orchestrator;

/// A3S Agent Chat - Talk to a hosted Bedrock agent from the terminal
#[derive(Debug, Parser)]
#[command(name = "a3s-agent-chat", version, about)]
pub struct Cli {
    /// Config file (default: ~/.a3s/agent-chat/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start an interactive conversation
    Chat {
        /// Shorten numbers in tables (1.2K, 3.4M)
        #[arg(long)]
        humanize: bool,
    },

    /// Ask a single question and print the answer
    Ask {
        /// Question to send
        prompt: String,

        /// Continue an existing session instead of starting a new one
        #[arg(long)]
        session_id: Option<String>,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify the agent is reachable with the configured credentials
    Check,

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,

    /// Check identifiers and credential formats
    Validate,
}

/// Build an agent client for the Bedrock runtime from `config`
pub fn build_client(config: &ChatConfig) -> Result<AgentClient> {
    let provider = BedrockProvider::new(config.to_bedrock_config())?;
    Ok(AgentClient::new(provider).with_retry_config(config.session_retry()))
}

/// Build an orchestrator with the limits from `config`
pub fn build_orchestrator(config: &ChatConfig) -> Result<Orchestrator> {
    Ok(Orchestrator::new(build_client(config)?)
        .with_max_turns(config.max_chat_history)
        .with_max_prompt_chars(config.max_prompt_chars))
}
