//! Budgeted single-call execution with an ordered fallback chain

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::adapters::{DispatchRequest, Dispatcher};
use crate::budget::{Budget, MIN_FALLBACK_BUDGET, PRIMARY_SHARE, duration_ms};
use crate::error::LlmError;
use crate::registry::{ProviderRegistry, ResolvedProvider};
use crate::types::{CallResult, GenerationParams, Message, RoutingDecision};

/// Time limits for a call chain
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Wall-clock allowance for the whole chain
    pub overall_ceiling: Duration,
    /// Fallbacks with less than this left are skipped
    pub min_fallback_budget: Duration,
    /// Share of the ceiling a primary may use when fallbacks exist
    pub primary_share: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            overall_ceiling: Duration::from_secs(25),
            min_fallback_budget: MIN_FALLBACK_BUDGET,
            primary_share: PRIMARY_SHARE,
        }
    }
}

/// Calls the primary provider, then walks the fallbacks, all under one budget
#[derive(Clone)]
pub struct Executor {
    registry: Arc<ProviderRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("providers", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Executor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            config,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run a chain under a fresh budget of `overall_ceiling`
    pub async fn execute(
        &self,
        decision: &RoutingDecision,
        messages: &[Message],
    ) -> Result<CallResult, LlmError> {
        let budget = Budget::start(self.config.overall_ceiling);
        self.execute_within(decision, messages, &budget).await
    }

    /// Run a chain under a budget owned by the caller.
    ///
    /// The primary uses the decision's model; every fallback uses its own
    /// default model. A provider is attempted at most once per chain.
    pub async fn execute_within(
        &self,
        decision: &RoutingDecision,
        messages: &[Message],
        budget: &Budget,
    ) -> Result<CallResult, LlmError> {
        let params = decision.params();
        // Entries repeating the primary are skipped later, so they don't count
        let has_fallbacks = decision
            .fallbacks
            .iter()
            .any(|id| *id != decision.provider_id);
        let mut attempted: Vec<String> = Vec::with_capacity(1 + decision.fallbacks.len());

        attempted.push(decision.provider_id.clone());
        match self.registry.resolve(&decision.provider_id) {
            Ok(resolved) => {
                let slice = budget.primary_slice(
                    resolved.config.timeout,
                    has_fallbacks,
                    self.config.primary_share,
                );
                let model = if decision.model.is_empty() {
                    resolved.config.default_model.as_str()
                } else {
                    decision.model.as_str()
                };
                debug!(
                    "Trying primary {} ({}) with {}ms of {}ms",
                    resolved.config.id,
                    model,
                    duration_ms(slice),
                    duration_ms(budget.remaining())
                );
                match self.attempt(&resolved, model, messages, params, slice).await {
                    Ok(text) => {
                        return Ok(CallResult {
                            text,
                            provider_id: resolved.config.id.clone(),
                            model: model.to_string(),
                            response_time_ms: budget.elapsed_ms(),
                            is_fallback: false,
                        });
                    }
                    Err(e) => log_failure(&e, budget),
                }
            }
            Err(e) => log_failure(&e, budget),
        }

        for fallback_id in &decision.fallbacks {
            if attempted.contains(fallback_id) {
                debug!("Skipping fallback {}: already attempted in this chain", fallback_id);
                continue;
            }

            let resolved = match self.registry.resolve(fallback_id) {
                Ok(resolved) => resolved,
                Err(e) => {
                    attempted.push(fallback_id.clone());
                    log_failure(&e, budget);
                    continue;
                }
            };

            let Some(slice) =
                budget.fallback_slice(resolved.config.timeout, self.config.min_fallback_budget)
            else {
                info!(
                    "Skipping fallback {}: {}ms left, need at least {}ms",
                    fallback_id,
                    duration_ms(budget.remaining()),
                    duration_ms(self.config.min_fallback_budget)
                );
                continue;
            };

            attempted.push(fallback_id.clone());
            let model = resolved.config.default_model.as_str();
            info!(
                "Failing over to {} ({}) with {}ms after {}ms",
                fallback_id,
                model,
                duration_ms(slice),
                budget.elapsed_ms()
            );

            match self.attempt(&resolved, model, messages, params, slice).await {
                Ok(text) => {
                    info!(
                        "Request succeeded on fallback provider {} ({})",
                        fallback_id, model
                    );
                    return Ok(CallResult {
                        text,
                        provider_id: resolved.config.id.clone(),
                        model: model.to_string(),
                        response_time_ms: budget.elapsed_ms(),
                        is_fallback: true,
                    });
                }
                Err(e) => log_failure(&e, budget),
            }
        }

        warn!(
            "All providers failed after {}ms: [{}]",
            budget.elapsed_ms(),
            attempted.join(", ")
        );
        Err(LlmError::AllProvidersFailed { attempted })
    }

    /// One call bounded by `slice`; an expired slice drops the in-flight request
    async fn attempt(
        &self,
        resolved: &ResolvedProvider<'_>,
        model: &str,
        messages: &[Message],
        params: GenerationParams,
        slice: Duration,
    ) -> Result<String, LlmError> {
        if slice.is_zero() {
            return Err(LlmError::timeout(&resolved.config.id, 0));
        }
        let request = DispatchRequest {
            provider: resolved.config,
            api_key: resolved.api_key,
            model,
            messages,
            params,
            timeout: slice,
        };
        match tokio::time::timeout(slice, self.dispatcher.dispatch(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::timeout(&resolved.config.id, duration_ms(slice))),
        }
    }
}

fn log_failure(error: &LlmError, budget: &Budget) {
    let provider = error.provider_id().unwrap_or("unknown");
    if error.is_timeout() {
        warn!(
            "Provider {} timed out at {}ms into the chain: {}",
            provider,
            budget.elapsed_ms(),
            error
        );
    } else {
        warn!(
            "Provider {} failed at {}ms into the chain: {}",
            provider,
            budget.elapsed_ms(),
            error
        );
    }
}
