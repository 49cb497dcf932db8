//! Response engine: one entry point for the single and multi-perspective paths

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::adapters::{Dispatcher, HttpDispatcher};
use crate::complexity::is_complex_enough_for_multi;
use crate::config::ConcordConfig;
use crate::error::LlmError;
use crate::executor::{Executor, ExecutorConfig};
use crate::orchestrator::{MultiConfig, MultiPerspectiveOrchestrator};
use crate::registry::ProviderRegistry;
use crate::types::{CallResult, Message, MultiResult, RoutingDecision};

/// Answer from either path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Single(CallResult),
    Multi(MultiResult),
}

impl Response {
    pub fn text(&self) -> &str {
        match self {
            Self::Single(r) => &r.text,
            Self::Multi(r) => &r.text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        match self {
            Self::Single(r) => r.is_fallback,
            Self::Multi(r) => r.is_fallback,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }
}

/// Owns the registry, dispatcher, executor and orchestrator
#[derive(Debug, Clone)]
pub struct Engine {
    executor: Executor,
    orchestrator: MultiPerspectiveOrchestrator,
}

impl Engine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
        executor_config: ExecutorConfig,
        multi_config: MultiConfig,
    ) -> Self {
        let executor = Executor::new(registry, dispatcher, executor_config);
        let orchestrator = MultiPerspectiveOrchestrator::new(executor.clone(), multi_config);
        Self {
            executor,
            orchestrator,
        }
    }

    /// Build from configuration, snapshotting credentials from the environment
    pub fn from_config(config: &ConcordConfig) -> Result<Self> {
        let providers = config
            .provider_configs()
            .context("Failed to build provider catalog")?;
        let credentials = config.credentials(&providers);
        let registry = ProviderRegistry::new(providers, credentials);
        let dispatcher = HttpDispatcher::new().context("Failed to create HTTP dispatcher")?;

        let available: Vec<&str> = registry
            .ids()
            .into_iter()
            .filter(|id| registry.is_available(id))
            .collect();
        info!(
            "Engine ready: {} of {} providers available [{}]",
            available.len(),
            registry.len(),
            available.join(", ")
        );

        Ok(Self::new(
            Arc::new(registry),
            Arc::new(dispatcher),
            config.to_executor_config(),
            config.to_multi_config(),
        ))
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn orchestrator(&self) -> &MultiPerspectiveOrchestrator {
        &self.orchestrator
    }

    /// Answer `messages`, fanning out when `query` passes the complexity gate.
    ///
    /// `query` is the user's latest question and `intent` the upstream
    /// classifier's tag; both only feed the gate.
    pub async fn respond(
        &self,
        decision: &RoutingDecision,
        messages: &[Message],
        query: &str,
        intent: &str,
    ) -> Result<Response, LlmError> {
        if is_complex_enough_for_multi(query, intent) {
            debug!("Query passed complexity gate (intent={}), going multi", intent);
            self.orchestrator
                .respond(decision, messages)
                .await
                .map(Response::Multi)
        } else {
            self.executor
                .execute(decision, messages)
                .await
                .map(Response::Single)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedDispatcher, registry_with};

    fn engine(available: &[&str], dispatcher: &ScriptedDispatcher) -> Engine {
        Engine::new(
            Arc::new(registry_with(available)),
            Arc::new(dispatcher.clone()),
            ExecutorConfig::default(),
            MultiConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_simple_query_takes_single_path() {
        let dispatcher = ScriptedDispatcher::new().reply("anthropic", "About $40.");
        let engine = engine(&["anthropic", "openai"], &dispatcher);
        let query = "What's this worth?";

        let response = engine
            .respond(
                &RoutingDecision::new("anthropic", "claude-sonnet-4-5"),
                &[Message::user(query)],
                query,
                "deep_analysis",
            )
            .await
            .unwrap();
        assert!(!response.is_multi());
        assert_eq!(response.text(), "About $40.");
        assert_eq!(dispatcher.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strategic_query_takes_multi_path() {
        let dispatcher = ScriptedDispatcher::new()
            .reply("anthropic", "Hold.")
            .reply("openai", "Sell.");
        let engine = engine(&["anthropic", "openai"], &dispatcher);
        let query = "Should I hold my sealed box until Q4 or sell now given current market conditions?";

        let response = engine
            .respond(
                &RoutingDecision::new("anthropic", "claude-sonnet-4-5"),
                &[Message::user(query)],
                query,
                "strategy",
            )
            .await
            .unwrap();
        assert!(response.is_multi());
        assert!(!response.is_fallback());
        // Two legs and a synthesis call
        assert_eq!(dispatcher.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_surfaces() {
        let dispatcher = ScriptedDispatcher::new().fail("anthropic", 500);
        let engine = engine(&["anthropic"], &dispatcher);

        let err = engine
            .respond(
                &RoutingDecision::new("anthropic", ""),
                &[Message::user("hi")],
                "hi",
                "",
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LlmError::AllProvidersFailed {
                attempted: vec!["anthropic".to_string()]
            }
        );
    }

    #[test]
    fn test_response_serializes_untagged() {
        let response = Response::Single(CallResult {
            text: "ok".to_string(),
            provider_id: "openai".to_string(),
            model: "gpt-4o".to_string(),
            response_time_ms: 12,
            is_fallback: false,
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["providerId"], "openai");
        assert_eq!(value["responseTime"], 12);
    }

    #[tokio::test]
    async fn test_from_default_config() {
        let engine = Engine::from_config(&ConcordConfig::default()).unwrap();
        assert_eq!(engine.executor().registry().len(), 10);
        assert_eq!(engine.orchestrator().config(), &MultiConfig::default());
    }
}
