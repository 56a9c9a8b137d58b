//! Exponential backoff between upload attempts
//!
//! The delay starts at zero ("no active backoff"). Each failure doubles it,
//! starting from `min_delay` and capped at `max_delay`; a success drops it
//! straight back to zero. The next-fire time is kept both as a monotonic
//! instant (for the orchestrator's timer) and as wall-clock time (for
//! reporting `uploads_paused_until` to callers).

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::defaults::BACKOFF_GROWTH_SEED;

/// Retry delay state, owned by the orchestrator
#[derive(Debug, Clone)]
pub struct BackoffScheduler {
    min_delay: Duration,
    max_delay: Duration,
    current: Duration,
    consecutive_failures: u32,
    /// When `current` last changed
    updated_at: Instant,
    updated_at_wall: DateTime<Utc>,
}

impl BackoffScheduler {
    /// `min_delay` may be zero. If `min_delay > max_delay`, `max_delay` wins.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay: min_delay.min(max_delay),
            max_delay,
            current: Duration::ZERO,
            consecutive_failures: 0,
            updated_at: Instant::now(),
            updated_at_wall: Utc::now(),
        }
    }

    /// Clear the backoff after a success
    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
        self.consecutive_failures = 0;
        self.touch();
    }

    /// Grow the delay after a failure and restart the wait from now.
    ///
    /// The first failure waits `min_delay`. Later failures double the previous
    /// delay; when that is zero (a zero `min_delay`) doubling starts from a
    /// one-second seed. The result never exceeds `max_delay`.
    pub fn increment(&mut self) {
        let grown = if self.consecutive_failures == 0 {
            self.min_delay
        } else if self.current.is_zero() {
            BACKOFF_GROWTH_SEED
        } else {
            self.current.saturating_mul(2)
        };

        self.current = grown.max(self.min_delay).min(self.max_delay);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.touch();
    }

    pub fn current_delay(&self) -> Duration {
        self.current
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Monotonic instant at which the current delay elapses
    pub fn next_fire_instant(&self) -> Instant {
        self.updated_at + self.current
    }

    /// Wall-clock time at which the current delay elapses
    pub fn next_fire_time(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.current)
            .ok()
            .and_then(|delta| self.updated_at_wall.checked_add_signed(delta))
            .unwrap_or(self.updated_at_wall)
    }

    /// `None` while no backoff is active, else the next-fire time
    pub fn paused_until(&self) -> Option<DateTime<Utc>> {
        if self.current.is_zero() {
            None
        } else {
            Some(self.next_fire_time())
        }
    }

    fn touch(&mut self) {
        self.updated_at = Instant::now();
        self.updated_at_wall = Utc::now();
    }
}
