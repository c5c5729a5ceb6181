//! # Reconnect Policy
//!
//! Delay between reconnect attempts.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FIXED (default)              │  EXPONENTIAL (opt-in)                   │
//! │  ─────────────────            │  ────────────────────                   │
//! │  Attempt 1: 5s                │  Attempt 1: ~5s                         │
//! │  Attempt 2: 5s                │  Attempt 2: ~10s                        │
//! │  Attempt 3: 5s                │  Attempt 3: ~20s      (±50% jitter)     │
//! │  ...                          │  Max: max_interval_ms                   │
//! │                               │                                         │
//! │  Both stop after max_attempts; the count is kept by the client.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use backoff::ExponentialBackoff;

use crate::config::{ReconnectSettings, ReconnectStrategy};

pub struct ReconnectPolicy {
    strategy: ReconnectStrategy,
    fallback: Duration,
    backoff: Box<dyn Backoff + Send>,
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        let interval = Duration::from_millis(settings.interval_ms);
        let backoff: Box<dyn Backoff + Send> = match settings.strategy {
            ReconnectStrategy::Fixed => Box::new(Constant::new(interval)),
            ReconnectStrategy::Exponential => Box::new(ExponentialBackoff {
                current_interval: interval,
                initial_interval: interval,
                max_interval: Duration::from_millis(settings.max_interval_ms),
                multiplier: 2.0,
                max_elapsed_time: None,
                ..Default::default()
            }),
        };

        ReconnectPolicy {
            strategy: settings.strategy,
            fallback: interval,
            backoff,
        }
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.backoff.next_backoff().unwrap_or(self.fallback)
    }

    /// Called after a successful connect.
    pub fn reset(&mut self) {
        self.backoff.reset();
    }
}

impl std::fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectPolicy")
            .field("strategy", &self.strategy)
            .field("interval", &self.fallback)
            .finish()
    }
}
