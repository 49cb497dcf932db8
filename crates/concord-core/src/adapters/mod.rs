//! Wire-protocol adapters
//!
//! One module per [`Dialect`]. Each turns the provider-agnostic message list
//! into its wire format and pulls plain text back out of the response.
//! [`HttpDispatcher`] picks the adapter by matching on the provider's dialect.

pub mod anthropic;
pub mod google;
pub mod openai_compat;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::budget::duration_ms;
use crate::error::LlmError;
use crate::registry::{Dialect, ProviderConfig};
use crate::types::{GenerationParams, Message, Role};

/// Everything needed for one outbound call
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub provider: &'a ProviderConfig,
    pub api_key: &'a str,
    pub model: &'a str,
    pub messages: &'a [Message],
    pub params: GenerationParams,
    /// Budget slice for this call
    pub timeout: Duration,
}

/// Sends one request to one provider and returns its completion text.
///
/// Implementations must fail on empty completions; callers never see an empty
/// `Ok`.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: DispatchRequest<'_>) -> Result<String, LlmError>;
}

/// Dialect-shaped request ready to send
#[derive(Debug, Clone)]
pub(crate) struct WireRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

/// [`Dispatcher`] that talks HTTP via a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
}

impl HttpDispatcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, request: DispatchRequest<'_>) -> Result<String, LlmError> {
        let provider = request.provider;
        let wire = match provider.dialect {
            Dialect::OpenAiCompatible => openai_compat::build_request(&request),
            Dialect::Anthropic => anthropic::build_request(&request),
            Dialect::Google => google::build_request(&request),
        }
        .map_err(|e| LlmError::provider(&provider.id, format!("failed to encode request: {e}")))?;

        debug!(
            "{} request: provider={}, model={}, messages={}, timeout={}ms",
            provider.dialect,
            provider.id,
            request.model,
            request.messages.len(),
            duration_ms(request.timeout)
        );

        let mut builder = self
            .client
            .post(&wire.url)
            .timeout(request.timeout)
            .header("Content-Type", "application/json");
        for (name, value) in &wire.headers {
            builder = builder.header(*name, value);
        }

        let response = builder
            .json(&wire.body)
            .send()
            .await
            .map_err(|e| transport_error(provider, request.timeout, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(provider, request.timeout, &e))?;

        if !status.is_success() {
            return Err(LlmError::http(&provider.id, status.as_u16(), &body));
        }

        let text = match provider.dialect {
            Dialect::OpenAiCompatible => openai_compat::extract_text(&body),
            Dialect::Anthropic => anthropic::extract_text(&body),
            Dialect::Google => google::extract_text(&body),
        }
        .map_err(|message| LlmError::provider(&provider.id, message))?;

        debug!(
            "{} response: provider={}, chars={}",
            provider.dialect,
            provider.id,
            text.len()
        );

        Ok(text)
    }
}

fn transport_error(provider: &ProviderConfig, timeout: Duration, err: &reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::timeout(&provider.id, duration_ms(timeout))
    } else {
        LlmError::provider(&provider.id, format!("request failed: {err}"))
    }
}

/// Join every system message into one block, blank-line separated.
///
/// Returns `None` when the conversation has no system content.
pub(crate) fn joined_system_text(messages: &[Message]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Non-empty completion text or an error message
pub(crate) fn non_empty(text: Option<String>, what: &str) -> Result<String, String> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        Some(_) => Err(format!("{what} was empty")),
        None => Err(format!("{what} was missing")),
    }
}
