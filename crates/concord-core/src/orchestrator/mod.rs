//! Multi-perspective orchestration
//!
//! Asks several providers the same question in parallel, then fuses their
//! answers with one synthesis call. Every step draws on one shared [`Budget`],
//! and each failure mode drops one rung down the ladder:
//!
//! 1. synthesis of two or more perspectives
//! 2. the single (or longest) perspective
//! 3. a speed fallback on the fastest available provider
//! 4. `AllProvidersFailed`

mod fanout;
mod speed;
mod synthesis;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::budget::Budget;
use crate::error::LlmError;
use crate::executor::Executor;
use crate::registry::{PERSPECTIVE_ORDER, ProviderConfig, SPEED_ORDER};
use crate::types::{CallResult, Message, MultiResult, PerspectiveResult, RoutingDecision};

pub use fanout::BatchOutcome;
use fanout::{FanOutPlan, fan_out};
use speed::speed_fallback;
use synthesis::{longest_perspective, perspective_messages, synthesis_messages};

/// Tunables for the multi-perspective path
#[derive(Debug, Clone, PartialEq)]
pub struct MultiConfig {
    /// Providers asked for perspectives, most preferred first
    pub perspective_order: Vec<String>,
    /// Providers for the fast last-resort answer, fastest first
    pub speed_order: Vec<String>,
    pub max_perspectives: usize,
    /// Fewer available providers than this skips straight to the speed fallback
    pub min_perspectives: usize,
    /// Joint deadline for all perspective legs
    pub fan_out_ceiling: Duration,
    pub speed_ceiling: Duration,
    pub perspective_max_tokens: u32,
    pub synthesis_max_tokens: u32,
    pub perspective_word_cap: u32,
}

impl Default for MultiConfig {
    fn default() -> Self {
        Self {
            perspective_order: PERSPECTIVE_ORDER.iter().map(|s| s.to_string()).collect(),
            speed_order: SPEED_ORDER.iter().map(|s| s.to_string()).collect(),
            max_perspectives: 3,
            min_perspectives: 2,
            fan_out_ceiling: Duration::from_secs(15),
            speed_ceiling: Duration::from_secs(8),
            perspective_max_tokens: 600,
            synthesis_max_tokens: 1200,
            perspective_word_cap: 200,
        }
    }
}

/// Fans out to several providers and synthesizes one answer
#[derive(Debug, Clone)]
pub struct MultiPerspectiveOrchestrator {
    executor: Executor,
    config: MultiConfig,
}

impl MultiPerspectiveOrchestrator {
    pub fn new(executor: Executor, config: MultiConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &MultiConfig {
        &self.config
    }

    /// Run the full ladder under a fresh budget of the executor's overall ceiling
    pub async fn respond(
        &self,
        decision: &RoutingDecision,
        messages: &[Message],
    ) -> Result<MultiResult, LlmError> {
        let budget = Budget::start(self.executor.config().overall_ceiling);
        self.respond_within(decision, messages, &budget).await
    }

    /// Run the full ladder under a caller-owned budget
    pub async fn respond_within(
        &self,
        decision: &RoutingDecision,
        messages: &[Message],
        budget: &Budget,
    ) -> Result<MultiResult, LlmError> {
        let selected = self.select_providers();
        if selected.len() < self.config.min_perspectives {
            info!(
                "Only {} perspective provider(s) available, need {}: using speed fallback",
                selected.len(),
                self.config.min_perspectives
            );
            return self.speed(decision, messages, budget, Vec::new()).await;
        }

        let leg_messages: Arc<[Message]> =
            Arc::from(perspective_messages(messages, self.config.perspective_word_cap));
        let batch = fan_out(
            &self.executor,
            &selected,
            decision,
            leg_messages,
            budget,
            FanOutPlan {
                ceiling: self.config.fan_out_ceiling,
                max_tokens: self.config.perspective_max_tokens,
            },
        )
        .await;

        match batch.perspectives.len() {
            0 => {
                warn!(
                    "No perspectives collected ({}), using speed fallback",
                    batch.outcome()
                );
                self.speed(decision, messages, budget, batch.attempted()).await
            }
            1 => {
                let only = &batch.perspectives[0];
                info!(
                    "Single perspective from {}, skipping synthesis",
                    only.provider_id
                );
                Ok(single_perspective_result(only, budget))
            }
            _ => Ok(self
                .synthesize(decision, messages, &batch.perspectives, budget)
                .await),
        }
    }

    fn select_providers(&self) -> Vec<ProviderConfig> {
        self.executor
            .registry()
            .available_in_order(&self.config.perspective_order)
            .into_iter()
            .take(self.config.max_perspectives)
            .cloned()
            .collect()
    }

    /// Fuse perspectives on the original primary; on failure fall back to the
    /// longest perspective.
    async fn synthesize(
        &self,
        decision: &RoutingDecision,
        messages: &[Message],
        perspectives: &[PerspectiveResult],
        budget: &Budget,
    ) -> MultiResult {
        let synthesis_decision = decision
            .redirected(&decision.provider_id, &decision.model, "synthesis")
            .with_max_tokens(self.config.synthesis_max_tokens);
        let prompt = synthesis_messages(messages, perspectives);

        debug!(
            "Synthesizing {} perspectives on {}",
            perspectives.len(),
            synthesis_decision.provider_id
        );

        match self
            .executor
            .execute_within(&synthesis_decision, &prompt, budget)
            .await
        {
            Ok(result) => {
                info!(
                    "Synthesized {} perspectives on {} in {}ms",
                    perspectives.len(),
                    result.provider_id,
                    budget.elapsed_ms()
                );
                MultiResult {
                    text: result.text,
                    providers: perspectives.iter().map(|p| p.provider_id.clone()).collect(),
                    perspective_count: perspectives.len(),
                    is_fallback: false,
                    total_time_ms: budget.elapsed_ms(),
                    provider_times: perspectives
                        .iter()
                        .map(|p| (p.provider_id.clone(), p.elapsed_ms))
                        .collect(),
                }
            }
            Err(e) => {
                warn!("Synthesis failed, returning longest perspective: {}", e);
                match longest_perspective(perspectives) {
                    Some(best) => single_perspective_result(best, budget),
                    // Callers only synthesize two or more perspectives
                    None => MultiResult {
                        text: String::new(),
                        providers: Vec::new(),
                        perspective_count: 0,
                        is_fallback: true,
                        total_time_ms: budget.elapsed_ms(),
                        provider_times: BTreeMap::new(),
                    },
                }
            }
        }
    }

    async fn speed(
        &self,
        decision: &RoutingDecision,
        messages: &[Message],
        budget: &Budget,
        attempted: Vec<String>,
    ) -> Result<MultiResult, LlmError> {
        let result = speed_fallback(
            &self.executor,
            decision,
            messages,
            budget,
            &self.config.speed_order,
            self.config.speed_ceiling,
            attempted,
        )
        .await?;
        Ok(speed_result(result, budget))
    }
}

fn single_perspective_result(perspective: &PerspectiveResult, budget: &Budget) -> MultiResult {
    MultiResult {
        text: perspective.text.clone(),
        providers: vec![perspective.provider_id.clone()],
        perspective_count: 1,
        is_fallback: true,
        total_time_ms: budget.elapsed_ms(),
        provider_times: BTreeMap::from([(perspective.provider_id.clone(), perspective.elapsed_ms)]),
    }
}

fn speed_result(result: CallResult, budget: &Budget) -> MultiResult {
    MultiResult {
        providers: vec![result.provider_id.clone()],
        perspective_count: 1,
        is_fallback: true,
        total_time_ms: budget.elapsed_ms(),
        provider_times: BTreeMap::from([(result.provider_id, result.response_time_ms)]),
        text: result.text,
    }
}
