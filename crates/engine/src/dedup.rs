//! Deduplicator - which entities of a fetch have never been seen

use std::collections::HashSet;

use contracts::{Entity, Snapshot};

/// Result of diffing one fetch against the previous snapshot
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Entities to notify, by `observed_at` then `id`
    pub new_events: Vec<Entity>,
    /// Snapshot to commit once dispatch finished
    pub next: Snapshot,
    /// No previous snapshot existed
    pub first_run: bool,
    /// New entities withheld by first-run suppression
    pub suppressed: usize,
}

/// Stateless diff of fetched entities against the committed snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator {
    suppress_first_run: bool,
}

impl Deduplicator {
    pub fn new(suppress_first_run: bool) -> Self {
        Self { suppress_first_run }
    }

    /// Compute new events and the next snapshot
    ///
    /// The next snapshot is the union of the previous ids and every fetched
    /// id, so an empty or partial fetch never forgets anything. Repeated ids
    /// within one fetch count once, at their earliest `observed_at`.
    pub fn deduplicate(
        &self,
        mut current: Vec<Entity>,
        previous: Option<&Snapshot>,
    ) -> DedupOutcome {
        current.sort_by(|a, b| {
            a.observed_at
                .cmp(&b.observed_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut next = previous.cloned().unwrap_or_default();
        next.sequence = previous.map_or(1, |p| p.sequence + 1);

        let mut seen = HashSet::with_capacity(current.len());
        let mut new_events = Vec::new();
        for entity in current {
            if !seen.insert(entity.id.clone()) {
                continue;
            }
            next.ids.insert(entity.id.clone());
            if !previous.is_some_and(|p| p.contains(&entity.id)) {
                new_events.push(entity);
            }
        }

        let first_run = previous.is_none();
        let suppressed = if first_run && self.suppress_first_run {
            std::mem::take(&mut new_events).len()
        } else {
            0
        };

        DedupOutcome {
            new_events,
            next,
            first_run,
            suppressed,
        }
    }
}
