//! Last-resort fast answer when too few perspectives are available

use std::time::Duration;

use tracing::{info, warn};

use crate::budget::{Budget, duration_ms};
use crate::error::LlmError;
use crate::executor::Executor;
use crate::types::{CallResult, Message, RoutingDecision};

/// One zero-fallback attempt on the fastest available provider.
///
/// Picks the first available id from `speed_order` with its lighter fallback
/// model, or the decision's own primary and model when none is available. The
/// call gets `min(ceiling, remaining)`. `attempted` carries providers already
/// tried upstream and is reported back on failure.
pub(crate) async fn speed_fallback(
    executor: &Executor,
    decision: &RoutingDecision,
    messages: &[Message],
    budget: &Budget,
    speed_order: &[String],
    ceiling: Duration,
    mut attempted: Vec<String>,
) -> Result<CallResult, LlmError> {
    let min_budget = executor.config().min_fallback_budget;
    if budget.remaining() < min_budget {
        warn!(
            "No time left for speed fallback: {}ms remaining, need {}ms",
            duration_ms(budget.remaining()),
            duration_ms(min_budget)
        );
        return Err(LlmError::AllProvidersFailed { attempted });
    }

    let speed_decision = match executor.registry().available_in_order(speed_order).first() {
        Some(provider) => decision.redirected(&provider.id, &provider.fallback_model, "speed_fallback"),
        None => {
            info!(
                "No speed provider available, using primary {}",
                decision.provider_id
            );
            decision.redirected(&decision.provider_id, &decision.model, "speed_fallback")
        }
    };

    let speed_budget = budget.narrowed(ceiling);
    info!(
        "Speed fallback on {} ({}) with {}ms",
        speed_decision.provider_id,
        speed_decision.model,
        duration_ms(speed_budget.remaining())
    );

    match executor
        .execute_within(&speed_decision, messages, &speed_budget)
        .await
    {
        Ok(result) => Ok(result),
        Err(_) => {
            if !attempted.contains(&speed_decision.provider_id) {
                attempted.push(speed_decision.provider_id);
            }
            Err(LlmError::AllProvidersFailed { attempted })
        }
    }
}
