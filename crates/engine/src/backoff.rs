//! Exponential backoff between failed fetches

use std::time::Duration;

use contracts::PollerConfig;

/// Delay schedule `initial * multiplier^(n-1)`, capped at `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    failures: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            failures: 0,
        }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(
            config.backoff_initial(),
            config.backoff_max(),
            config.backoff_multiplier,
        )
    }

    /// Register one more consecutive failure and return the delay to wait
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let exponent = i32::try_from(self.failures - 1).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        // Out of Duration range (including infinity) means past any cap
        Duration::try_from_secs_f64(secs).map_or(self.max, |delay| delay.min(self.max))
    }

    /// Forget past failures after a successful fetch
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures so far
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
