use crate::config::ChatConfig;
use crate::error::Result;

/// Execute the `check` command: send one test request to the agent.
pub async fn execute(config: &ChatConfig) -> Result<()> {
    let client = super::build_client(config)?;
    let info = client.info();

    println!(
        "Checking agent {} (alias {}) in {}...",
        info.agent_id, info.agent_alias_id, info.region
    );
    client.verify().await?;
    println!("Agent is reachable.");
    Ok(())
}
