//! Parallel perspective legs racing one joint deadline

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::budget::{Budget, duration_ms};
use crate::executor::Executor;
use crate::registry::ProviderConfig;
use crate::types::{Message, PerspectiveResult, RoutingDecision};

/// How a fan-out batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// At least one leg produced usable text
    Collected,
    /// Nothing usable arrived before the joint deadline
    TimedOut,
    /// Every leg finished, none with usable text
    AllFailed,
}

impl std::fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collected => write!(f, "collected"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::AllFailed => write!(f, "all_failed"),
        }
    }
}

/// Whatever the legs produced by the time the batch closed
#[derive(Debug, Clone, Default)]
pub(crate) struct FanOutBatch {
    /// Usable answers in arrival order
    pub perspectives: Vec<PerspectiveResult>,
    /// Legs that finished without usable text
    pub failed: Vec<String>,
    /// Legs still running at the deadline, aborted
    pub abandoned: Vec<String>,
    pub deadline_hit: bool,
}

impl FanOutBatch {
    pub fn outcome(&self) -> BatchOutcome {
        if !self.perspectives.is_empty() {
            BatchOutcome::Collected
        } else if self.deadline_hit {
            BatchOutcome::TimedOut
        } else {
            BatchOutcome::AllFailed
        }
    }

    /// Every provider a leg was started for
    pub fn attempted(&self) -> Vec<String> {
        self.perspectives
            .iter()
            .map(|p| p.provider_id.clone())
            .chain(self.failed.iter().cloned())
            .chain(self.abandoned.iter().cloned())
            .collect()
    }
}

/// Settings for one batch
#[derive(Debug, Clone, Copy)]
pub(crate) struct FanOutPlan {
    pub ceiling: Duration,
    pub max_tokens: u32,
}

/// Start one leg per provider and collect until all finish or the joint
/// deadline (`min(plan.ceiling, remaining)`) passes.
///
/// Each leg is a zero-fallback chain on the provider's default model. Legs
/// still running at the deadline are aborted and left out of the batch.
pub(crate) async fn fan_out(
    executor: &Executor,
    providers: &[ProviderConfig],
    decision: &RoutingDecision,
    messages: Arc<[Message]>,
    budget: &Budget,
    plan: FanOutPlan,
) -> FanOutBatch {
    let leg_budget = budget.narrowed(plan.ceiling);
    let mut batch = FanOutBatch::default();
    let mut pending: Vec<String> = Vec::with_capacity(providers.len());
    let mut legs = JoinSet::new();

    debug!(
        "Fanning out to [{}] with {}ms joint deadline",
        providers.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(", "),
        duration_ms(leg_budget.remaining())
    );

    for provider in providers {
        let executor = executor.clone();
        let messages = Arc::clone(&messages);
        let leg_decision = decision
            .redirected(&provider.id, &provider.default_model, "perspective")
            .with_max_tokens(plan.max_tokens);
        let display_name = provider.display_name.clone();
        pending.push(provider.id.clone());

        legs.spawn(async move {
            let result = executor
                .execute_within(&leg_decision, &messages, &leg_budget)
                .await;
            (leg_decision.provider_id, display_name, result)
        });
    }

    loop {
        match tokio::time::timeout_at(leg_budget.deadline(), legs.join_next()).await {
            Ok(Some(Ok((provider_id, display_name, result)))) => {
                pending.retain(|id| *id != provider_id);
                match result {
                    Ok(call) if !call.text.trim().is_empty() => {
                        debug!(
                            "Perspective from {} arrived after {}ms",
                            provider_id, call.response_time_ms
                        );
                        batch.perspectives.push(PerspectiveResult {
                            provider_id,
                            display_name,
                            text: call.text,
                            elapsed_ms: call.response_time_ms,
                        });
                    }
                    Ok(_) => {
                        warn!("Perspective from {} was empty", provider_id);
                        batch.failed.push(provider_id);
                    }
                    Err(e) => {
                        debug!("Perspective leg {} failed: {}", provider_id, e);
                        batch.failed.push(provider_id);
                    }
                }
            }
            Ok(Some(Err(e))) => {
                warn!("Perspective leg panicked: {}", e);
            }
            Ok(None) => break,
            Err(_) => {
                batch.deadline_hit = true;
                legs.abort_all();
                break;
            }
        }
    }

    if batch.deadline_hit {
        batch.abandoned = pending;
    } else {
        // Only panicked legs are left unaccounted for
        batch.failed.extend(pending);
    }

    info!(
        "Fan-out {}: {} answered, {} failed, {} abandoned after {}ms",
        batch.outcome(),
        batch.perspectives.len(),
        batch.failed.len(),
        batch.abandoned.len(),
        leg_budget.elapsed_ms()
    );

    batch
}
