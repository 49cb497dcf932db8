//! Google Gemini generateContent
//!
//! The model id lives in the URL, system text becomes `systemInstruction`,
//! and roles are remapped: `assistant` becomes `model`, everything else
//! `user`. No raw `system` role reaches the wire.

use serde::{Deserialize, Serialize};

use super::{DispatchRequest, WireRequest, joined_system_text, non_empty};
use crate::types::{GenerationParams, Message, Role};

pub(crate) fn build_request(request: &DispatchRequest<'_>) -> Result<WireRequest, serde_json::Error> {
    let body = request_body(request.messages, &request.params);
    Ok(WireRequest {
        url: request.provider.endpoint(request.model),
        headers: vec![("x-goog-api-key", request.api_key.to_string())],
        body: serde_json::to_value(body)?,
    })
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

fn request_body<'a>(messages: &'a [Message], params: &GenerationParams) -> GeminiRequest<'a> {
    GeminiRequest {
        contents: messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| GeminiContent {
                role: gemini_role(m.role),
                parts: vec![GeminiPart { text: &m.content }],
            })
            .collect(),
        system_instruction: joined_system_text(messages).map(|text| GeminiSystemInstruction {
            parts: vec![GeminiOwnedPart { text }],
        }),
        generation_config: GeminiGenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
        },
    }
}

/// Text of `candidates[0].content.parts[0].text`
pub(crate) fn extract_text(body: &str) -> Result<String, String> {
    let response: GeminiResponse =
        serde_json::from_str(body).map_err(|e| format!("unparsable generateContent response: {e}"))?;
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text);
    non_empty(text, "candidates[0].content.parts[0].text")
}

// ── wire types ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiOwnedPart>,
}

#[derive(Debug, Serialize)]
struct GeminiOwnedPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DispatchRequest;
    use crate::registry::{Dialect, ProviderConfig};
    use serde_json::json;
    use std::time::Duration;

    fn params() -> GenerationParams {
        GenerationParams {
            temperature: 0.5,
            max_tokens: 800,
        }
    }

    #[test]
    fn test_assistant_becomes_model() {
        let messages = vec![
            Message::user("hello"),
            Message::assistant("hi there"),
            Message::user("value of my binder?"),
        ];
        let body = serde_json::to_value(request_body(&messages, &params())).unwrap();
        let roles: Vec<&str> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn test_system_moves_to_system_instruction() {
        let messages = vec![Message::system("a"), Message::system("b"), Message::user("q")];
        let body = serde_json::to_value(request_body(&messages, &params())).unwrap();
        assert_eq!(body["systemInstruction"], json!({"parts": [{"text": "a\n\nb"}]}));
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert!(!body.to_string().contains("\"role\":\"system\""));
    }

    #[test]
    fn test_generation_config_renamed() {
        let body = serde_json::to_value(request_body(&[Message::user("q")], &params())).unwrap();
        assert_eq!(
            body["generationConfig"],
            json!({"temperature": 0.5, "maxOutputTokens": 800})
        );
        assert!(body.get("model").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_build_request_puts_model_in_url() {
        let provider = ProviderConfig::new(
            "google",
            Dialect::Google,
            "https://generativelanguage.googleapis.com",
            "gemini-2.5-flash",
        );
        let messages = vec![Message::user("q")];
        let request = DispatchRequest {
            provider: &provider,
            api_key: "AIza-test",
            model: "gemini-2.0-flash",
            messages: &messages,
            params: params(),
            timeout: Duration::from_secs(5),
        };
        let wire = build_request(&request).unwrap();
        assert!(wire.url.ends_with("/v1beta/models/gemini-2.0-flash:generateContent"));
        assert!(!wire.url.contains("AIza-test"));
        assert_eq!(wire.headers, vec![("x-goog-api-key", "AIza-test".to_string())]);
    }

    #[test]
    fn test_extract_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Wait for Q4."}]},
            "finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":3}}"#;
        assert_eq!(extract_text(body).unwrap(), "Wait for Q4.");
    }

    #[test]
    fn test_extract_text_blocked_candidate() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert!(extract_text(body).is_err());
    }

    #[test]
    fn test_extract_text_no_candidates() {
        assert!(extract_text(r#"{"promptFeedback":{"blockReason":"OTHER"}}"#).is_err());
    }
}
