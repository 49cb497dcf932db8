//! Provider-agnostic request and result types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation, as assembled upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters shared by every dialect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Which provider/model to use and what to fall back to.
///
/// Produced by an upstream classifier; this crate treats it as opaque input and
/// only ever clones and overrides it per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub provider_id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl RoutingDecision {
    pub fn new(provider_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            fallbacks: Vec::new(),
            reason: String::new(),
        }
    }

    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// A single-shot copy of this decision aimed at another provider/model.
    ///
    /// The copy never carries fallbacks of its own.
    pub fn redirected(&self, provider_id: &str, model: &str, reason: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            model: model.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            fallbacks: Vec::new(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of the single-call path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    pub text: String,
    pub provider_id: String,
    pub model: String,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    pub is_fallback: bool,
}

/// One provider's independent answer during a multi-perspective call
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveResult {
    pub provider_id: String,
    pub display_name: String,
    pub text: String,
    pub elapsed_ms: u64,
}

/// Outcome of the multi-perspective path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiResult {
    pub text: String,
    pub providers: Vec<String>,
    pub perspective_count: usize,
    pub is_fallback: bool,
    pub total_time_ms: u64,
    pub provider_times: BTreeMap<String, u64>,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}
