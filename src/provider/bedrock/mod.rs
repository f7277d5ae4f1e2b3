//! Bedrock agent runtime provider
//!
//! Implements `AgentProvider` over the `InvokeAgent` HTTP API: SigV4-signed
//! requests, responses streamed back in the AWS event-stream framing.

mod client;
mod config;
pub mod credentials;
pub mod eventstream;
pub mod signer;

pub use client::{BedrockClient, BedrockStream};
pub use config::{BedrockConfig, CredentialSource};
pub use credentials::Credentials;

use crate::error::Result;
use crate::provider::{AgentProvider, EventStream, InvokeRequest, ProviderInfo};
use async_trait::async_trait;

/// Bedrock agent runtime provider
///
/// Wraps `BedrockClient` and implements the `AgentProvider` trait.
#[derive(Debug)]
pub struct BedrockProvider {
    client: BedrockClient,
}

impl BedrockProvider {
    /// Validate the config and resolve credentials
    pub fn new(config: BedrockConfig) -> Result<Self> {
        let client = BedrockClient::connect(config)?;
        Ok(Self { client })
    }

    /// Get the underlying client for advanced usage
    pub fn client(&self) -> &BedrockClient {
        &self.client
    }
}

#[async_trait]
impl AgentProvider for BedrockProvider {
    async fn invoke(&self, request: &InvokeRequest) -> Result<Box<dyn EventStream>> {
        let stream = self.client.invoke(request).await?;
        Ok(Box::new(stream))
    }

    fn info(&self) -> ProviderInfo {
        let config = self.client.config();
        ProviderInfo {
            provider: "bedrock".to_string(),
            agent_id: config.agent_id.clone(),
            agent_alias_id: config.agent_alias_id.clone(),
            region: config.region.clone(),
        }
    }

    fn name(&self) -> &str {
        "bedrock"
    }
}
