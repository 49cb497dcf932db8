//! Failure taxonomy for provider calls

use thiserror::Error;

/// Longest slice of a provider's error body kept in an error value
pub const BODY_EXCERPT_CHARS: usize = 200;

/// Errors raised while resolving or calling providers.
///
/// Everything except [`LlmError::AllProvidersFailed`] is intermediate: the
/// executor and orchestrator catch it, log it, and move down the degradation
/// ladder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// Unknown provider id or missing credential
    #[error("provider '{provider}' is not available: {reason}")]
    Configuration { provider: String, reason: String },

    /// Non-2xx response
    #[error("provider '{provider}' returned status {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// Transport failure, unparsable body, or empty completion text
    #[error("provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// The attempt's budget slice ran out
    #[error("provider '{provider}' timed out after {budget_ms}ms")]
    Timeout { provider: String, budget_ms: u64 },

    /// Every option on the ladder was exhausted
    #[error("all providers failed (attempted: [{}])", .attempted.join(", "))]
    AllProvidersFailed { attempted: Vec<String> },
}

impl LlmError {
    pub fn configuration(provider: &str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Build an HTTP error, keeping only an excerpt of the body
    pub fn http(provider: &str, status: u16, body: &str) -> Self {
        Self::Http {
            provider: provider.to_string(),
            status,
            body: truncate_body(body),
        }
    }

    pub fn provider(provider: &str, message: impl AsRef<str>) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            message: truncate_body(message.as_ref()),
        }
    }

    pub fn timeout(provider: &str, budget_ms: u64) -> Self {
        Self::Timeout {
            provider: provider.to_string(),
            budget_ms,
        }
    }

    /// Provider the error is about, if it concerns a single one
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            Self::Configuration { provider, .. }
            | Self::Http { provider, .. }
            | Self::Provider { provider, .. }
            | Self::Timeout { provider, .. } => Some(provider),
            Self::AllProvidersFailed { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Cut a response body down to [`BODY_EXCERPT_CHARS`] characters
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    let mut chars = trimmed.char_indices();
    match chars.nth(BODY_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
