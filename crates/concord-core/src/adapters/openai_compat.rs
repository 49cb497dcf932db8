//! OpenAI-compatible chat completions (OpenAI, xAI, DeepSeek, Groq, ...)
//!
//! Messages are forwarded verbatim, system role included; only the base URL,
//! chat path and key differ between vendors.

use serde::{Deserialize, Serialize};

use super::{DispatchRequest, WireRequest, non_empty};
use crate::types::{GenerationParams, Message};

pub(crate) fn build_request(request: &DispatchRequest<'_>) -> Result<WireRequest, serde_json::Error> {
    let body = request_body(request.model, request.messages, &request.params);
    Ok(WireRequest {
        url: request.provider.endpoint(request.model),
        headers: vec![("Authorization", format!("Bearer {}", request.api_key))],
        body: serde_json::to_value(body)?,
    })
}

fn request_body<'a>(
    model: &'a str,
    messages: &'a [Message],
    params: &GenerationParams,
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        messages: messages
            .iter()
            .map(|m| ChatCompletionMessage {
                role: m.role.to_string(),
                content: &m.content,
            })
            .collect(),
        temperature: params.temperature,
        max_tokens: params.max_tokens,
    }
}

/// Text of `choices[0].message.content`
pub(crate) fn extract_text(body: &str) -> Result<String, String> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| format!("unparsable chat completion: {e}"))?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content);
    non_empty(content, "choices[0].message.content")
}

// ── wire types ──

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: String,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
