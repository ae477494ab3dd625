use serde_json::Value;
use std::time::Duration;

const GROWTH_NUMERATOR: u32 = 3;
const GROWTH_DENOMINATOR: u32 = 2;

/// Decides the delay until the next scheduled fetch for a feed loop.
///
/// `base` is the effective cadence (minimum over the loop's subscribers) and
/// `current` the delay used for the tick that just completed; stateless
/// policies can derive growth from `current` without the loop carrying
/// per-strategy state.
pub trait IntervalStrategy: Send + Sync {
    fn next_interval(
        &self,
        last_result: Option<&Value>,
        consecutive_errors: u32,
        base: Duration,
        current: Duration,
    ) -> Duration;
}

/// Default policy: fixed cadence, always the subscribers' base interval.
pub struct FixedInterval;

impl IntervalStrategy for FixedInterval {
    fn next_interval(
        &self,
        _last_result: Option<&Value>,
        _consecutive_errors: u32,
        base: Duration,
        _current: Duration,
    ) -> Duration {
        base
    }
}

/// Adaptive cadence: stay at the base interval while the feed looks active
/// (or while errors keep the picture uncertain), otherwise stretch the
/// current interval by 1.5x per idle tick up to a cap.
pub struct AdaptiveInterval {
    max: Duration,
    is_active: Box<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl AdaptiveInterval {
    pub fn new(
        max: Duration,
        is_active: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            max,
            is_active: Box::new(is_active),
        }
    }
}

impl IntervalStrategy for AdaptiveInterval {
    fn next_interval(
        &self,
        last_result: Option<&Value>,
        consecutive_errors: u32,
        base: Duration,
        current: Duration,
    ) -> Duration {
        if consecutive_errors > 0 {
            return base.min(self.max);
        }

        if last_result.is_some_and(|v| (self.is_active)(v)) {
            return base.min(self.max);
        }

        let grown = current
            .max(base)
            .saturating_mul(GROWTH_NUMERATOR)
            .checked_div(GROWTH_DENOMINATOR)
            .unwrap_or(current);

        grown.min(self.max)
    }
}
