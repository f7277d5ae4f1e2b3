//! Bedrock agent runtime configuration

use crate::config::SecretString;
use crate::retry::RetryConfig;
use std::time::Duration;

/// Where request-signing credentials come from
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    /// Explicit access key pair
    Static {
        access_key_id: String,
        secret_access_key: SecretString,
        session_token: Option<SecretString>,
    },

    /// Named profile from the shared credentials file
    Profile(String),

    /// Environment variables, then `$AWS_PROFILE`, then the `default` profile
    Default,
}

/// Configuration for the Bedrock agent runtime provider
#[derive(Debug, Clone)]
pub struct BedrockConfig {
    /// Agent identifier
    pub agent_id: String,

    /// Agent alias identifier
    pub agent_alias_id: String,

    /// AWS region (e.g., "us-east-1")
    pub region: String,

    /// Signing credentials
    pub credentials: CredentialSource,

    /// Endpoint override (default: regional agent runtime endpoint)
    pub endpoint: Option<String>,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Timeout for each read from the socket
    pub read_timeout: Duration,

    /// HTTP-level retry on throttling and 5xx responses
    pub transport_retry: RetryConfig,

    /// Ask the agent to stream trace events
    pub enable_trace: bool,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            agent_alias_id: "TSTALIASID".to_string(),
            region: "us-east-1".to_string(),
            credentials: CredentialSource::Default,
            endpoint: None,
            connect_timeout: Duration::from_secs(100),
            read_timeout: Duration::from_secs(500),
            transport_retry: RetryConfig::transport(3),
            enable_trace: true,
        }
    }
}

impl BedrockConfig {
    /// Create a config for an agent with default transport settings
    pub fn new(
        agent_id: impl Into<String>,
        agent_alias_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_alias_id: agent_alias_id.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, credentials: CredentialSource) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Base URL of the agent runtime service
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-agent-runtime.{}.amazonaws.com", self.region),
        }
    }

    /// Request path for one conversational turn, segments percent-encoded
    pub fn invoke_path(&self, session_id: &str) -> String {
        format!(
            "/agents/{}/agentAliases/{}/sessions/{}/text",
            super::signer::uri_encode(&self.agent_id),
            super::signer::uri_encode(&self.agent_alias_id),
            super::signer::uri_encode(session_id),
        )
    }

    /// Check the fields required before any request can be made
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(crate::error::AgentError::Config(
                "agent id is required".to_string(),
            ));
        }
        if self.agent_alias_id.trim().is_empty() {
            return Err(crate::error::AgentError::Config(
                "agent alias id is required".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(crate::error::AgentError::Config(
                "region is required".to_string(),
            ));
        }
        Ok(())
    }
}
