//! Wall-clock budget shared by every layer of a call chain
//!
//! A [`Budget`] is started once when the outer call begins. Primary, fallback,
//! fan-out, synthesis and speed-fallback timeouts are all carved out of its
//! remaining time; nested layers may narrow the deadline but never extend it.

use std::time::Duration;

use tokio::time::Instant;

/// Below this much remaining time a fallback attempt is skipped
pub const MIN_FALLBACK_BUDGET: Duration = Duration::from_millis(3_000);

/// Share of the overall ceiling a primary may use when fallbacks exist
pub const PRIMARY_SHARE: f64 = 0.5;

/// One request's clock: a start instant and an absolute deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    started: Instant,
    deadline: Instant,
}

impl Budget {
    /// Start a clock now with the given overall ceiling
    pub fn start(ceiling: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + ceiling,
        }
    }

    /// A child budget starting now, capped at `cap` and never past this deadline
    pub fn narrowed(&self, cap: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: self.deadline.min(started + cap),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Total allowance this budget was created with
    pub fn ceiling(&self) -> Duration {
        self.deadline.saturating_duration_since(self.started)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        duration_ms(self.elapsed())
    }

    /// `ceiling - elapsed`, floored at zero
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Slice for the first attempt of a chain.
    ///
    /// Without fallbacks the primary may use everything that is left. With
    /// fallbacks it is capped to `min(provider ceiling, ceiling * share)` so a
    /// merely slow primary cannot starve the rest of the chain.
    pub fn primary_slice(
        &self,
        provider_ceiling: Duration,
        has_fallbacks: bool,
        share: f64,
    ) -> Duration {
        let remaining = self.remaining();
        if !has_fallbacks {
            return remaining;
        }
        provider_ceiling
            .min(self.ceiling().mul_f64(share))
            .min(remaining)
    }

    /// Slice for a fallback attempt, or `None` when too little time is left
    /// for the attempt to stand a real chance.
    pub fn fallback_slice(
        &self,
        provider_ceiling: Duration,
        min_budget: Duration,
    ) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining < min_budget {
            None
        } else {
            Some(provider_ceiling.min(remaining))
        }
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
