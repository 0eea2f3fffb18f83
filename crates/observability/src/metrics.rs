//! Poller metrics
//!
//! Thin helpers over the `metrics` facade so every crate records the same
//! `stargazer_*` series, plus an online statistics helper for summaries.

use std::time::Duration;

use contracts::DeliveryRecord;
use metrics::{counter, gauge, histogram};

/// One finished poll cycle, labelled by outcome (committed, held, fetch_failed, ...)
pub fn record_cycle(outcome: &'static str, duration: Duration) {
    counter!("stargazer_cycles_total", "outcome" => outcome).increment(1);
    histogram!("stargazer_cycle_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Entities that were new in a cycle
pub fn record_new_entities(count: usize) {
    if count > 0 {
        counter!("stargazer_new_entities_total").increment(count as u64);
    }
}

/// One (entity, sink) delivery outcome
pub fn record_delivery(record: &DeliveryRecord) {
    counter!(
        "stargazer_deliveries_total",
        "sink" => record.sink.clone(),
        "status" => record.outcome.label()
    )
    .increment(1);
    histogram!("stargazer_delivery_duration_ms", "sink" => record.sink.clone())
        .record(record.elapsed.as_secs_f64() * 1000.0);
}

pub fn record_fetch_failure() {
    counter!("stargazer_fetch_failures_total").increment(1);
}

/// Current backoff delay; zero once a fetch succeeds again
pub fn record_backoff(delay: Duration) {
    gauge!("stargazer_backoff_seconds").set(delay.as_secs_f64());
}

/// Size of the last committed snapshot
pub fn record_snapshot_size(ids: usize) {
    gauge!("stargazer_snapshot_ids").set(ids as f64);
}

pub fn record_save_retry() {
    counter!("stargazer_save_retries_total").increment(1);
}

/// Summary of a `RunningStats`
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
