//! Poller run statistics

use std::fmt;
use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::RunningStats;

use crate::CycleReport;

/// Totals over the lifetime of one poller
#[derive(Debug, Clone, Default)]
pub struct PollerStats {
    pub cycles: u64,
    pub committed: u64,
    pub held: u64,
    pub fetch_failures: u64,
    pub new_events: u64,
    pub suppressed: u64,
    pub delivery_failures: u64,
    pub store_retries: u64,
    /// Last committed snapshot sequence
    pub last_sequence: Option<u64>,
    /// Cycle wall time (ms)
    pub cycle_ms: RunningStats,
    /// Per-sink delivery counters, filled in when the poller closes
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl PollerStats {
    pub(crate) fn record(&mut self, report: &CycleReport, elapsed: Duration) {
        self.cycles += 1;
        self.cycle_ms.push(elapsed.as_secs_f64() * 1000.0);

        match report {
            CycleReport::Committed {
                sequence,
                new_events,
                suppressed,
                failures,
            } => {
                self.committed += 1;
                self.new_events += *new_events as u64;
                self.suppressed += *suppressed as u64;
                self.delivery_failures += *failures as u64;
                self.last_sequence = Some(*sequence);
            }
            CycleReport::Held {
                new_events,
                failures,
            } => {
                self.held += 1;
                self.new_events += *new_events as u64;
                self.delivery_failures += *failures as u64;
            }
            CycleReport::FetchFailed { .. } => self.fetch_failures += 1,
        }
    }
}

impl fmt::Display for PollerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Poller Summary ===")?;
        writeln!(
            f,
            "Cycles: {} (committed {}, held {}, fetch failures {})",
            self.cycles, self.committed, self.held, self.fetch_failures
        )?;
        writeln!(
            f,
            "New entities: {} (suppressed on first run: {})",
            self.new_events, self.suppressed
        )?;
        writeln!(f, "Delivery failures: {}", self.delivery_failures)?;
        writeln!(f, "Store retries: {}", self.store_retries)?;
        match self.last_sequence {
            Some(sequence) => writeln!(f, "Last committed sequence: {sequence}")?,
            None => writeln!(f, "Last committed sequence: none")?,
        }
        write!(f, "Cycle time (ms): {}", self.cycle_ms.summary())?;
        for (name, m) in &self.sinks {
            write!(
                f,
                "\nSink {name}: delivered {}, skipped {}, failed {}, timed out {}",
                m.delivered_count, m.skipped_count, m.failure_count, m.timeout_count
            )?;
        }
        Ok(())
    }
}
