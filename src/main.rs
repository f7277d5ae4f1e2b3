use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_agent_chat::cli::{Cli, Commands, ConfigAction};
use a3s_agent_chat::config::ChatConfig;
use a3s_agent_chat::dirs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(dirs::config_path);
    let config = ChatConfig::load_from(&config_path)?;

    // Initialize tracing
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { humanize } => {
            a3s_agent_chat::cli::chat::execute(&config, humanize).await?;
        }
        Commands::Ask {
            prompt,
            session_id,
            json,
        } => {
            let answered =
                a3s_agent_chat::cli::ask::execute(&config, &prompt, session_id.as_deref(), json)
                    .await?;
            if !answered {
                std::process::exit(1);
            }
        }
        Commands::Check => {
            a3s_agent_chat::cli::check::execute(&config).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                a3s_agent_chat::cli::config::show(&config, &config_path)?;
            }
            ConfigAction::Validate => {
                if !a3s_agent_chat::cli::config::validate(&config) {
                    std::process::exit(1);
                }
            }
        },
    }

    Ok(())
}
