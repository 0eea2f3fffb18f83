//! MockEventSource - scripted fetch results

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use contracts::{ContractError, Entity, EventSource};

/// Source replaying a script of fetch results
///
/// Each `fetch` pops the next scripted result. Once the script runs out
/// the last successful result is repeated, like an upstream that stopped
/// changing.
#[derive(Debug, Default)]
pub struct MockEventSource {
    script: VecDeque<Result<Vec<Entity>, ContractError>>,
    last: Vec<Entity>,
    fetches: Arc<AtomicU32>,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful fetch
    pub fn then_entities(mut self, entities: Vec<Entity>) -> Self {
        self.script.push_back(Ok(entities));
        self
    }

    /// Queue a failed fetch
    pub fn then_unavailable(mut self, message: &str) -> Self {
        self.script
            .push_back(Err(ContractError::fetch_unavailable(message)));
        self
    }

    /// Shared fetch counter, readable after the source moved into a poller
    pub fn fetch_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.fetches)
    }
}

impl EventSource for MockEventSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&mut self) -> Result<Vec<Entity>, ContractError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        match self.script.pop_front() {
            Some(Ok(entities)) => {
                self.last = entities.clone();
                Ok(entities)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.clone()),
        }
    }
}
