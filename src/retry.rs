//! Retry logic for agent requests
//!
//! Two layers share this module:
//!
//! - **Session retry** (application level): re-sends the whole conversational
//!   request when it fails with a timeout or connection error. Backoff is
//!   `base_delay * 2^attempt` without jitter, i.e. 1s, 2s, 4s.
//! - **Transport retry**: re-sends a single HTTP request when the service
//!   answers with a throttling or 5xx status, honouring `Retry-After`.
//!
//! The transport layer runs beneath the session layer, so the two compose.
//!
//! Waits are `tokio::time::sleep`, so dropping the future cancels a
//! pending backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential growth)
    pub max_delay_ms: u64,
    /// Spread delays by ±25%
    #[serde(default)]
    pub jitter: bool,
    /// HTTP status codes that trigger a transport-level retry
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,
}

fn default_retryable_status_codes() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::session(2)
    }
}

impl RetryConfig {
    /// Application-level policy: `max_retries` re-sends at 1s, 2s, 4s...
    pub fn session(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: false,
            retryable_status_codes: default_retryable_status_codes(),
        }
    }

    /// Transport-level policy with `max_attempts` total attempts
    pub fn transport(max_attempts: u32) -> Self {
        Self {
            max_retries: max_attempts.saturating_sub(1),
            base_delay_ms: 500,
            max_delay_ms: 20_000,
            jitter: true,
            retryable_status_codes: default_retryable_status_codes(),
        }
    }

    /// Create a retry config with no retries (disabled)
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Same policy with a different retry cap
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Check if a given HTTP status code is retryable
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    ///
    /// Uses exponential backoff: `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp_delay = self.base_delay_ms.saturating_mul(1u64 << attempt.min(10));
        let capped = exp_delay.min(self.max_delay_ms);

        if !self.jitter {
            return Duration::from_millis(capped);
        }

        // Deterministic ±25% spread keyed on the attempt number
        let jitter_range = capped / 4;
        let delay = if jitter_range > 0 {
            let jitter_offset = (attempt as u64 * 7 + 3) % (jitter_range * 2 + 1);
            capped - jitter_range + jitter_offset
        } else {
            capped
        };

        Duration::from_millis(delay)
    }

    /// Parse `Retry-After` header value to get a delay duration.
    ///
    /// Supports integer and decimal seconds. Returns `None` if the header
    /// is missing, unparseable, non-positive or above 300 seconds.
    pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
        let value = header_value?.trim();
        if let Ok(seconds) = value.parse::<f64>() {
            if seconds > 0.0 && seconds <= 300.0 {
                return Some(Duration::from_secs_f64(seconds));
            }
        }
        None
    }
}

/// Outcome of a single attempt, used by the retry loop
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// Attempt succeeded
    Success(T),
    /// Attempt failed with an error worth retrying
    Retryable {
        error: AgentError,
        retry_after: Option<Duration>,
    },
    /// Attempt failed with an error that must not be retried
    Fatal(AgentError),
}

impl<T> AttemptOutcome<T> {
    /// Classify a result by its error kind (timeouts and connection errors retry)
    pub fn from_result(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(error) if error.is_retryable() => AttemptOutcome::Retryable {
                error,
                retry_after: None,
            },
            Err(error) => AttemptOutcome::Fatal(error),
        }
    }
}

/// Successful value together with the number of attempts it took
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Final error after the retry loop gave up
#[derive(Debug)]
pub struct RetryFailure {
    /// Error of the last attempt
    pub error: AgentError,
    /// Attempts made, including the first
    pub attempts: u32,
}

impl std::fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed after {} attempts. Last error: {}",
            self.attempts, self.error
        )
    }
}

/// Execute an async operation with retry logic.
///
/// The `operation` closure is called with the 0-indexed attempt number and
/// must return an `AttemptOutcome`. Retryable failures wait with exponential
/// backoff (or the supplied `retry_after`) before the next attempt. Fatal
/// failures and exhausted retries return a `RetryFailure` carrying the last
/// error and the number of attempts actually made.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: F,
) -> std::result::Result<Retried<T>, RetryFailure>
where
    F: Fn(u32) -> Fut,
    Fut: std::future::Future<Output = AttemptOutcome<T>>,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            AttemptOutcome::Success(value) => {
                if attempt > 0 {
                    tracing::info!(retries = attempt, "Request succeeded after retrying");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt + 1,
                });
            }
            AttemptOutcome::Fatal(error) => {
                return Err(RetryFailure {
                    error,
                    attempts: attempt + 1,
                });
            }
            AttemptOutcome::Retryable { error, retry_after } => {
                if attempt >= config.max_retries {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt + 1,
                    });
                }

                let delay = retry_after.unwrap_or_else(|| config.delay_for_attempt(attempt));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = config.max_retries + 1,
                    delay = ?delay,
                    error = %error,
                    "Request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
