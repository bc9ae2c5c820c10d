//! Rate limiting for device list renders.

use std::time::{Duration, Instant};

/// Lets a render through at most once per `interval`.
#[derive(Debug, Clone)]
pub struct RenderThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl RenderThrottle {
    /// Create a throttle that has never rendered.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether to render at `now`. Records the render when it returns `true`.
    pub fn should_render(&mut self, now: Instant) -> bool {
        let due = self
            .last
            .map_or(true, |last| now.saturating_duration_since(last) > self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}
