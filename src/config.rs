//! User configuration for the agent chat client
//!
//! Values come from `config.toml` and from the environment. A value present
//! in the file wins; anything the file leaves out falls back to the
//! environment, then to the built-in default.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dirs;
use crate::error::{AgentError, Result};
use crate::provider::bedrock::{BedrockConfig, CredentialSource};
use crate::retry::RetryConfig;

/// A string that must never appear in logs or debug output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the secret value (request signing and `save` only)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Regions the credential check accepts without a warning
pub const COMMON_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
];

/// User-configurable settings for the chat client and CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Agent identifier (required)
    #[serde(default)]
    pub agent_id: String,

    /// Agent alias identifier (default: TSTALIASID)
    #[serde(default = "default_agent_alias_id")]
    pub agent_alias_id: String,

    /// AWS region (default: us-east-1)
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<SecretString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<SecretString>,

    /// Named profile from the shared credentials file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_profile: Option<String>,

    /// Endpoint override for the agent runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,

    /// Maximum number of turns kept in a session
    #[serde(default = "default_max_chat_history")]
    pub max_chat_history: usize,

    /// Application-level retries for timeout and connection failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Total HTTP attempts on throttling and 5xx responses
    #[serde(default = "default_transport_max_attempts")]
    pub transport_max_attempts: u32,

    /// Longest prompt accepted, in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_agent_alias_id() -> String {
    "TSTALIASID".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_chat_history() -> usize {
    50
}

fn default_max_retries() -> u32 {
    2
}

fn default_read_timeout_secs() -> u64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    100
}

fn default_transport_max_attempts() -> u32 {
    3
}

fn default_max_prompt_chars() -> usize {
    1000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            agent_alias_id: default_agent_alias_id(),
            region: default_region(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_session_token: None,
            aws_profile: None,
            endpoint: None,
            debug: false,
            max_chat_history: default_max_chat_history(),
            max_retries: default_max_retries(),
            read_timeout_secs: default_read_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            transport_max_attempts: default_transport_max_attempts(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

/// One configuration source where every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigLayer {
    agent_id: Option<String>,
    agent_alias_id: Option<String>,
    region: Option<String>,
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<SecretString>,
    aws_session_token: Option<SecretString>,
    aws_profile: Option<String>,
    endpoint: Option<String>,
    debug: Option<bool>,
    max_chat_history: Option<usize>,
    max_retries: Option<u32>,
    read_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    transport_max_attempts: Option<u32>,
    max_prompt_chars: Option<usize>,
}

impl ConfigLayer {
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            agent_id: var("BEDROCK_AGENT_ID"),
            agent_alias_id: var("BEDROCK_AGENT_ALIAS_ID"),
            region: var("AWS_DEFAULT_REGION").or_else(|| var("AWS_REGION")),
            aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY").map(SecretString::new),
            aws_session_token: var("AWS_SESSION_TOKEN").map(SecretString::new),
            aws_profile: var("AWS_PROFILE"),
            ..Default::default()
        }
    }

    /// Fields set here win over `fallback`
    fn over(self, fallback: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            agent_id: self.agent_id.or(fallback.agent_id),
            agent_alias_id: self.agent_alias_id.or(fallback.agent_alias_id),
            region: self.region.or(fallback.region),
            aws_access_key_id: self.aws_access_key_id.or(fallback.aws_access_key_id),
            aws_secret_access_key: self
                .aws_secret_access_key
                .or(fallback.aws_secret_access_key),
            aws_session_token: self.aws_session_token.or(fallback.aws_session_token),
            aws_profile: self.aws_profile.or(fallback.aws_profile),
            endpoint: self.endpoint.or(fallback.endpoint),
            debug: self.debug.or(fallback.debug),
            max_chat_history: self.max_chat_history.or(fallback.max_chat_history),
            max_retries: self.max_retries.or(fallback.max_retries),
            read_timeout_secs: self.read_timeout_secs.or(fallback.read_timeout_secs),
            connect_timeout_secs: self.connect_timeout_secs.or(fallback.connect_timeout_secs),
            transport_max_attempts: self
                .transport_max_attempts
                .or(fallback.transport_max_attempts),
            max_prompt_chars: self.max_prompt_chars.or(fallback.max_prompt_chars),
        }
    }

    fn resolve(self) -> ChatConfig {
        let d = ChatConfig::default();
        ChatConfig {
            agent_id: self.agent_id.unwrap_or(d.agent_id),
            agent_alias_id: self.agent_alias_id.unwrap_or(d.agent_alias_id),
            region: self.region.unwrap_or(d.region),
            aws_access_key_id: self.aws_access_key_id,
            aws_secret_access_key: self.aws_secret_access_key,
            aws_session_token: self.aws_session_token,
            aws_profile: self.aws_profile,
            endpoint: self.endpoint,
            debug: self.debug.unwrap_or(d.debug),
            max_chat_history: self.max_chat_history.unwrap_or(d.max_chat_history),
            max_retries: self.max_retries.unwrap_or(d.max_retries),
            read_timeout_secs: self.read_timeout_secs.unwrap_or(d.read_timeout_secs),
            connect_timeout_secs: self.connect_timeout_secs.unwrap_or(d.connect_timeout_secs),
            transport_max_attempts: self
                .transport_max_attempts
                .unwrap_or(d.transport_max_attempts),
            max_prompt_chars: self.max_prompt_chars.unwrap_or(d.max_prompt_chars),
        }
    }
}

/// Result of the credential format check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ChatConfig {
    /// Load from the default config file path, merged over the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&dirs::config_path())
    }

    /// Load from `path` (if it exists), merged over the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Load from `path` with a custom environment lookup
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                AgentError::Config(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let layer: ConfigLayer = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "Loaded config file");
            layer
        } else {
            ConfigLayer::default()
        };

        Ok(file.over(ConfigLayer::from_lookup(lookup)).resolve())
    }

    /// Configuration from environment variables and defaults only
    pub fn from_env() -> Self {
        ConfigLayer::from_lookup(|name| std::env::var(name).ok()).resolve()
    }

    /// Save to the default config file path.
    pub fn save(&self) -> Result<PathBuf> {
        let path = dirs::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save as pretty TOML to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn has_key_pair(&self) -> bool {
        let key = self.aws_access_key_id.as_deref().unwrap_or_default();
        let secret = self
            .aws_secret_access_key
            .as_ref()
            .map(SecretString::expose)
            .unwrap_or_default();
        !key.is_empty() && !secret.is_empty()
    }

    fn has_profile(&self) -> bool {
        self.aws_profile.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Whether there is enough configuration to connect without asking
    pub fn can_auto_connect(&self) -> bool {
        !self.agent_id.is_empty()
            && !self.agent_alias_id.is_empty()
            && (self.has_key_pair() || self.has_profile())
    }

    /// Check identifiers and credential formats
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.agent_id.trim().is_empty() {
            report.errors.push("Agent ID is required".to_string());
        }

        if let Some(key) = self.aws_access_key_id.as_deref().filter(|k| !k.is_empty()) {
            if !access_key_pattern().is_match(key) {
                report.errors.push(
                    "Access key should start with 'AKIA' or 'ASIA' and be 20 characters long"
                        .to_string(),
                );
            }
        }

        if let Some(secret) = self.aws_secret_access_key.as_ref().filter(|s| !s.is_empty()) {
            if secret.expose().chars().count() != 40 {
                report
                    .warnings
                    .push("Secret key should typically be 40 characters long".to_string());
            }
        }

        if !self.region.is_empty() && !COMMON_REGIONS.contains(&self.region.as_str()) {
            report.warnings.push(format!(
                "Region '{}' is not in the common regions list",
                self.region
            ));
        }

        report
    }

    /// Copy with every secret replaced by a placeholder, for display
    pub fn redacted(&self) -> Self {
        let mask = |s: &Option<SecretString>| s.as_ref().map(|_| SecretString::new("[REDACTED]"));
        Self {
            aws_secret_access_key: mask(&self.aws_secret_access_key),
            aws_session_token: mask(&self.aws_session_token),
            ..self.clone()
        }
    }

    /// Where signing credentials should come from
    pub fn credential_source(&self) -> CredentialSource {
        if self.has_key_pair() {
            CredentialSource::Static {
                access_key_id: self.aws_access_key_id.clone().unwrap_or_default(),
                secret_access_key: self.aws_secret_access_key.clone().unwrap_or_default(),
                session_token: self.aws_session_token.clone().filter(|t| !t.is_empty()),
            }
        } else if let Some(profile) = self.aws_profile.clone().filter(|p| !p.is_empty()) {
            CredentialSource::Profile(profile)
        } else {
            CredentialSource::Default
        }
    }

    /// Transport settings for the Bedrock provider
    pub fn to_bedrock_config(&self) -> BedrockConfig {
        BedrockConfig {
            agent_id: self.agent_id.clone(),
            agent_alias_id: self.agent_alias_id.clone(),
            region: self.region.clone(),
            credentials: self.credential_source(),
            endpoint: self.endpoint.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            transport_retry: RetryConfig::transport(self.transport_max_attempts),
            enable_trace: true,
        }
    }

    /// Application-level retry policy
    pub fn session_retry(&self) -> RetryConfig {
        RetryConfig::session(self.max_retries)
    }
}

fn access_key_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(AKIA|ASIA)[0-9A-Z]{16}$").unwrap())
}
