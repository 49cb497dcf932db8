//! Anthropic Messages API

use serde::{Deserialize, Serialize};

use super::{DispatchRequest, WireRequest, joined_system_text, non_empty};
use crate::types::{GenerationParams, Message, Role};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub(crate) fn build_request(request: &DispatchRequest<'_>) -> Result<WireRequest, serde_json::Error> {
    let body = request_body(request.model, request.messages, &request.params);
    Ok(WireRequest {
        url: request.provider.endpoint(request.model),
        headers: vec![
            ("x-api-key", request.api_key.to_string()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ],
        body: serde_json::to_value(body)?,
    })
}

/// System messages move into the top-level `system` field
fn request_body<'a>(
    model: &'a str,
    messages: &'a [Message],
    params: &GenerationParams,
) -> AnthropicRequest<'a> {
    AnthropicRequest {
        model,
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        system: joined_system_text(messages),
        messages: messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: m.role.to_string(),
                content: &m.content,
            })
            .collect(),
    }
}

/// Text of `content[0].text`
pub(crate) fn extract_text(body: &str) -> Result<String, String> {
    let response: AnthropicResponse =
        serde_json::from_str(body).map_err(|e| format!("unparsable messages response: {e}"))?;
    let text = response.content.into_iter().next().and_then(|block| block.text);
    non_empty(text, "content[0].text")
}

// ── wire types ──

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: String,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: Option<String>,
}
