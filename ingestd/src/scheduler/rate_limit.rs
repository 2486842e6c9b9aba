//! Single global dispatch throttle

use std::time::Duration;

use tokio::time::Instant;

/// Allows at most one dispatch per `interval`
///
/// One token for the whole scheduler, not per priority or per request.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_dispatch: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter that has never dispatched
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
        }
    }

    /// True iff at least `interval` has passed since the last dispatch
    pub fn may_dispatch(&self, now: Instant) -> bool {
        match self.last_dispatch {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Time left until the next dispatch is allowed (zero when open)
    pub fn retry_after(&self, now: Instant) -> Duration {
        match self.last_dispatch {
            None => Duration::ZERO,
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
        }
    }

    pub fn record_dispatch(&mut self, now: Instant) {
        self.last_dispatch = Some(now);
    }
}
