//! Provider catalog and credential lookup
//!
//! The catalog is a constant table converted once into an immutable
//! [`ProviderRegistry`]. There is no write path after construction, so the
//! registry is shared behind an `Arc` without locking.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Wire protocol family spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "google")]
    Google,
}

impl Dialect {
    /// Chat path used when a provider does not override it.
    ///
    /// The Google path embeds the model id through a `{model}` placeholder.
    pub fn default_chat_path(&self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "/v1/chat/completions",
            Self::Anthropic => "/v1/messages",
            Self::Google => "/v1beta/models/{model}:generateContent",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAiCompatible => write!(f, "openai-compatible"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Google => write!(f, "google"),
        }
    }
}

/// Static description of one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub id: String,
    pub display_name: String,
    pub dialect: Dialect,
    pub base_url: String,
    pub chat_path: String,
    pub default_model: String,
    pub fallback_model: String,
    /// Upper bound for a single call, whatever the budget says
    pub timeout: Duration,
    /// Environment variable holding the API key
    pub credential_key: String,
}

impl ProviderConfig {
    /// A provider with dialect defaults for everything not given
    pub fn new(
        id: impl Into<String>,
        dialect: Dialect,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let default_model = default_model.into();
        Self {
            display_name: id.clone(),
            credential_key: format!("{}_API_KEY", id.to_uppercase().replace('-', "_")),
            chat_path: dialect.default_chat_path().to_string(),
            fallback_model: default_model.clone(),
            timeout: Duration::from_secs(20),
            dialect,
            base_url: base_url.into(),
            default_model,
            id,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credential_key(mut self, key: impl Into<String>) -> Self {
        self.credential_key = key.into();
        self
    }

    /// Full request URL for `model`
    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.chat_path.replace("{model}", model)
        )
    }
}

struct BuiltinProvider {
    id: &'static str,
    display_name: &'static str,
    dialect: Dialect,
    base_url: &'static str,
    chat_path: Option<&'static str>,
    default_model: &'static str,
    fallback_model: &'static str,
    timeout_ms: u64,
    credential_key: &'static str,
}

const BUILTIN_PROVIDERS: &[BuiltinProvider] = &[
    BuiltinProvider {
        id: "anthropic",
        display_name: "Claude",
        dialect: Dialect::Anthropic,
        base_url: "https://api.anthropic.com",
        chat_path: None,
        default_model: "claude-sonnet-4-5",
        fallback_model: "claude-haiku-4-5",
        timeout_ms: 20_000,
        credential_key: "ANTHROPIC_API_KEY",
    },
    BuiltinProvider {
        id: "openai",
        display_name: "GPT",
        dialect: Dialect::OpenAiCompatible,
        base_url: "https://api.openai.com",
        chat_path: None,
        default_model: "gpt-4o",
        fallback_model: "gpt-4o-mini",
        timeout_ms: 20_000,
        credential_key: "OPENAI_API_KEY",
    },
    BuiltinProvider {
        id: "google",
        display_name: "Gemini",
        dialect: Dialect::Google,
        base_url: "https://generativelanguage.googleapis.com",
        chat_path: None,
        default_model: "gemini-2.5-flash",
        fallback_model: "gemini-2.0-flash",
        timeout_ms: 15_000,
        credential_key: "GOOGLE_AI_API_KEY",
    },
    BuiltinProvider {
        id: "xai",
        display_name: "Grok",
        dialect: Dialect::OpenAiCompatible,
        base_url: "https://api.x.ai",
        chat_path: None,
        default_model: "grok-3",
        fallback_model: "grok-3-mini",
        timeout_ms: 20_000,
        credential_key: "XAI_API_KEY",
    },
    BuiltinProvider {
        id: "deepseek",
        display_name: "DeepSeek",
        dialect: Dialect::OpenAiCompatible,
        base_url: "https://api.deepseek.com",
        chat_path: Some("/chat/completions"),
        default_model: "deepseek-chat",
        fallback_model: "deepseek-chat",
        timeout_ms: 25_000,
        credential_key: "DEEPSEEK_API_KEY",
    },
    BuiltinProvider {
        id: "mistral",
        display_name: "Mistral",
        dialect: Dialect::OpenAiCompatible,
        base_url: "https://api.mistral.ai",
        chat_path: None,
        default_model: "mistral-large-latest",
        fallback_model: "mistral-small-latest",
        timeout_ms: 15_000,
        credential_key: "MISTRAL_API_KEY",
    },
    BuiltinProvider {
        id: "perplexity",
        display_name: "Perplexity",
        dialect: Dialect::OpenAiCompatible,
        base_url: "https://api.perplexity.ai",
        chat_path: Some("/chat/completions"),
        default_model: "sonar-pro",
        fallback_model: "sonar",
        timeout_ms: 20_000,
        credential_key: "PERPLEXITY_API_KEY",
    },
    BuiltinProvider {
        id: "groq",
        display_name: "Groq",
        dialect: Dialect::OpenAiCompatible,
        base_url: "https://api.groq.com",
        chat_path: Some("/openai/v1/chat/completions"),
        default_model: "llama-3.3-70b-versatile",
        fallback_model: "llama-3.1-8b-instant",
        timeout_ms: 8_000,
        credential_key: "GROQ_API_KEY",
    },
    BuiltinProvider {
        id: "cerebras",
        display_name: "Cerebras",
        dialect: Dialect::OpenAiCompatible,
        base_url: "https://api.cerebras.ai",
        chat_path: None,
        default_model: "llama-3.3-70b",
        fallback_model: "llama3.1-8b",
        timeout_ms: 8_000,
        credential_key: "CEREBRAS_API_KEY",
    },
    BuiltinProvider {
        id: "together",
        display_name: "Together",
        dialect: Dialect::OpenAiCompatible,
        base_url: "https://api.together.xyz",
        chat_path: None,
        default_model: "meta-llama/Llama-3.3-70B-Instruct-Turbo",
        fallback_model: "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
        timeout_ms: 10_000,
        credential_key: "TOGETHER_API_KEY",
    },
];

/// Providers asked for independent perspectives, most preferred first
pub const PERSPECTIVE_ORDER: &[&str] = &["anthropic", "openai", "google", "xai", "deepseek", "mistral"];

/// Providers used for the last-resort fast answer, fastest first
pub const SPEED_ORDER: &[&str] = &["groq", "cerebras", "together"];

impl BuiltinProvider {
    fn to_config(&self) -> ProviderConfig {
        ProviderConfig {
            id: self.id.to_string(),
            display_name: self.display_name.to_string(),
            dialect: self.dialect,
            base_url: self.base_url.to_string(),
            chat_path: self
                .chat_path
                .unwrap_or_else(|| self.dialect.default_chat_path())
                .to_string(),
            default_model: self.default_model.to_string(),
            fallback_model: self.fallback_model.to_string(),
            timeout: Duration::from_millis(self.timeout_ms),
            credential_key: self.credential_key.to_string(),
        }
    }
}

/// The built-in catalog as owned configs
pub fn builtin_providers() -> Vec<ProviderConfig> {
    BUILTIN_PROVIDERS.iter().map(BuiltinProvider::to_config).collect()
}

/// Credential variable names of the built-in catalog
pub fn builtin_credential_keys() -> impl Iterator<Item = &'static str> {
    BUILTIN_PROVIDERS.iter().map(|p| p.credential_key)
}

/// API keys keyed by credential key, captured once at startup
#[derive(Clone, Default)]
pub struct Credentials {
    values: HashMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Credentials").field("keys", &keys).finish()
    }
}

impl Credentials {
    /// Snapshot the given environment variables; unset or blank ones are skipped
    pub fn from_env<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let values = keys
            .into_iter()
            .filter_map(|key| {
                std::env::var(key)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (key.to_string(), v))
            })
            .collect();
        Self { values }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut credentials = Self::default();
        for (key, value) in pairs {
            credentials = credentials.with(key, value);
        }
        credentials
    }

    /// Add or replace one key; blank values are ignored
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.values.insert(key.into(), value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A provider that passed resolution, together with its key
#[derive(Debug, Clone, Copy)]
pub struct ResolvedProvider<'a> {
    pub config: &'a ProviderConfig,
    pub api_key: &'a str,
}

/// Read-only catalog of providers plus their credentials
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
    credentials: Credentials,
}

impl ProviderRegistry {
    pub fn new(providers: impl IntoIterator<Item = ProviderConfig>, credentials: Credentials) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.id.clone(), p)).collect(),
            credentials,
        }
    }

    /// The built-in catalog
    pub fn builtin(credentials: Credentials) -> Self {
        Self::new(builtin_providers(), credentials)
    }

    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.get(id)
    }

    /// Look up a provider and its key; unknown ids and missing keys are
    /// configuration errors.
    pub fn resolve(&self, id: &str) -> Result<ResolvedProvider<'_>, LlmError> {
        let config = self
            .providers
            .get(id)
            .ok_or_else(|| LlmError::configuration(id, "unknown provider"))?;
        let api_key = self.credentials.get(&config.credential_key).ok_or_else(|| {
            LlmError::configuration(id, format!("{} is not set", config.credential_key))
        })?;
        Ok(ResolvedProvider { config, api_key })
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.resolve(id).is_ok()
    }

    /// Available providers from `order`, in that order, without duplicates
    pub fn available_in_order<S: AsRef<str>>(&self, order: &[S]) -> Vec<&ProviderConfig> {
        let mut selected: Vec<&ProviderConfig> = Vec::new();
        for id in order {
            let id = id.as_ref();
            if selected.iter().any(|p| p.id == id) {
                continue;
            }
            if let Ok(resolved) = self.resolve(id) {
                selected.push(resolved.config);
            }
        }
        selected
    }

    /// Sorted ids of every known provider
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_keys(keys: &[&str]) -> ProviderRegistry {
        ProviderRegistry::builtin(Credentials::from_pairs(
            keys.iter().map(|k| (k.to_string(), "test-key".to_string())),
        ))
    }

    #[test]
    fn test_builtin_catalog_is_consistent() {
        let providers = builtin_providers();
        assert_eq!(providers.len(), BUILTIN_PROVIDERS.len());
        for p in &providers {
            assert!(!p.default_model.is_empty(), "{} has no default model", p.id);
            assert!(!p.fallback_model.is_empty(), "{} has no fallback model", p.id);
            assert!(p.chat_path.starts_with('/'), "{} chat path", p.id);
            assert!(p.timeout > Duration::ZERO);
        }
        for id in PERSPECTIVE_ORDER.iter().chain(SPEED_ORDER) {
            assert!(providers.iter().any(|p| p.id == *id), "{} missing", id);
        }
    }

    #[test]
    fn test_speed_and_perspective_orders_are_disjoint() {
        assert!(SPEED_ORDER.iter().all(|id| !PERSPECTIVE_ORDER.contains(id)));
    }

    #[test]
    fn test_dialect_serde_names() {
        let dialect: Dialect = serde_json::from_str("\"openai-compatible\"").unwrap();
        assert_eq!(dialect, Dialect::OpenAiCompatible);
        assert_eq!(Dialect::Google.to_string(), "google");
    }

    #[test]
    fn test_endpoint_embeds_google_model() {
        let registry = registry_with_keys(&[]);
        let google = registry.get("google").unwrap();
        assert_eq!(
            google.endpoint("gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_endpoint_honors_path_override() {
        let registry = registry_with_keys(&[]);
        assert_eq!(
            registry.get("groq").unwrap().endpoint("x"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(
            registry.get("perplexity").unwrap().endpoint("x"),
            "https://api.perplexity.ai/chat/completions"
        );
        assert_eq!(
            registry.get("openai").unwrap().endpoint("x"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let p = ProviderConfig::new("local", Dialect::OpenAiCompatible, "http://localhost:8080/", "m");
        assert_eq!(p.endpoint("m"), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_provider_config_new_defaults() {
        let p = ProviderConfig::new("my-vendor", Dialect::Anthropic, "https://example.com", "m1");
        assert_eq!(p.credential_key, "MY_VENDOR_API_KEY");
        assert_eq!(p.chat_path, "/v1/messages");
        assert_eq!(p.fallback_model, "m1");
        assert_eq!(p.display_name, "my-vendor");
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let registry = registry_with_keys(&["OPENAI_API_KEY"]);
        let err = registry.resolve("nope").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn test_resolve_missing_credential() {
        let registry = registry_with_keys(&["OPENAI_API_KEY"]);
        let err = registry.resolve("anthropic").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
        assert!(!registry.is_available("anthropic"));
        assert!(registry.is_available("openai"));
    }

    #[test]
    fn test_resolve_returns_key() {
        let registry = registry_with_keys(&["GROQ_API_KEY"]);
        let resolved = registry.resolve("groq").unwrap();
        assert_eq!(resolved.api_key, "test-key");
        assert_eq!(resolved.config.dialect, Dialect::OpenAiCompatible);
    }

    #[test]
    fn test_available_in_order_filters_and_dedupes() {
        let registry = registry_with_keys(&["OPENAI_API_KEY", "GOOGLE_AI_API_KEY"]);
        let selected = registry.available_in_order(&["anthropic", "google", "openai", "google"]);
        let ids: Vec<&str> = selected.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["google", "openai"]);
    }

    #[test]
    fn test_credentials_ignore_blank_values() {
        let credentials = Credentials::from_pairs([("A", "  "), ("B", "value")]);
        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials.get("B"), Some("value"));
        assert_eq!(credentials.get("A"), None);
    }

    #[test]
    fn test_credentials_debug_hides_values() {
        let credentials = Credentials::from_pairs([("OPENAI_API_KEY", "sk-secret")]);
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("OPENAI_API_KEY"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_ids_sorted() {
        let registry = registry_with_keys(&[]);
        let ids = registry.ids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(registry.len(), BUILTIN_PROVIDERS.len());
    }
}
