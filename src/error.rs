//! Error types for a3s-agent-chat

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to an agent
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or invalid configuration (credentials, agent identifiers)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials rejected or insufficient permissions
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Agent, alias or other resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Request or read timed out
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Transport could not reach the service or the connection dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Service asked us to slow down
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Error reported by the agent service itself
    #[error("Service error ({code}): {message}")]
    Service {
        code: String,
        message: String,
    },

    /// Response body could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Caller supplied unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Config could not be written
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Structured classification of a failure
///
/// The retry decision is made on this kind, never on the error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    AccessDenied,
    NotFound,
    Timeout,
    Connection,
    Throttled,
    Malformed,
    /// The user aborted the request before an answer arrived
    Cancelled,
    Other,
}

impl ErrorKind {
    /// Whether a request that failed with this kind may be re-sent
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Connection)
    }

    /// Classify a bare error message.
    ///
    /// Only for transports that have nothing better than text to go on
    /// (e.g. service error messages). Matching is case-insensitive.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timeout") || lower.contains("read timed out") {
            ErrorKind::Timeout
        } else if lower.contains("connection") {
            // also covers "connection pool"
            ErrorKind::Connection
        } else if lower.contains("accessdenied")
            || lower.contains("access denied")
            || lower.contains("unauthorizedoperation")
            || lower.contains("unrecognizedclient")
        {
            ErrorKind::AccessDenied
        } else if lower.contains("resourcenotfound") {
            ErrorKind::NotFound
        } else if lower.contains("throttl") {
            ErrorKind::Throttled
        } else {
            ErrorKind::Other
        }
    }

    /// Short headline shown to the user
    pub fn headline(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "Request Timed Out - the agent took too long to respond.",
            ErrorKind::Connection => "Connection Error - unable to reach the agent service.",
            ErrorKind::Cancelled => "Request Aborted - the question was not answered.",
            _ => "The agent request failed.",
        }
    }

    /// Troubleshooting guidance shown to the user
    pub fn guidance(self) -> &'static str {
        match self {
            ErrorKind::Timeout => {
                "Complex questions can take longer to process. Try simplifying or \
                 splitting the question, rephrase it, or try again in a moment. \
                 Failed requests are retried automatically."
            }
            ErrorKind::Connection => {
                "Check your network connection, try again in a few moments, and \
                 verify the configured region is reachable from your location."
            }
            ErrorKind::Cancelled => "Ask the question again to get an answer.",
            _ => {
                "Check your AWS credentials, verify the agent ID and alias ID, make \
                 sure the region is set correctly and that the account has Bedrock \
                 access, or try rephrasing the question."
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connection => "connection",
            ErrorKind::Throttled => "throttled",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl AgentError {
    /// Structured kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Config(_) | AgentError::TomlDe(_) | AgentError::TomlSer(_) => {
                ErrorKind::Config
            }
            AgentError::AccessDenied(_) => ErrorKind::AccessDenied,
            AgentError::NotFound(_) => ErrorKind::NotFound,
            AgentError::Timeout(_) => ErrorKind::Timeout,
            AgentError::Connection(_) => ErrorKind::Connection,
            AgentError::Throttled(_) => ErrorKind::Throttled,
            AgentError::Service { code, message } => {
                ErrorKind::classify(&format!("{} {}", code, message))
            }
            AgentError::MalformedResponse(_) | AgentError::Serialization(_) => {
                ErrorKind::Malformed
            }
            AgentError::InvalidInput(_) | AgentError::Io(_) => ErrorKind::Other,
        }
    }

    /// Whether the application-level retry loop may re-send the request
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Build a service error, classifying it from its code and message
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::Service {
            code: code.into(),
            message: message.into(),
        }
    }
}
