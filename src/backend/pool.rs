use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::fetcher::{fetch_image, FetchError, ImageSource};
use super::record::SharedRecord;

/// Terminal message of one fetch unit, sent to the coordinator.
#[derive(Debug)]
pub struct FetchEvent {
    pub unit: u64,
    pub generation: u64,
    pub outcome: Result<SharedRecord, FetchError>,
}

/// How a retired unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Succeeded,
    Failed,
}

/// The set of in-flight fetch units.
///
/// Units are spawned tasks that report back over `events`. The pool only
/// keeps bookkeeping; the coordinator feeds every event back through
/// [`complete`](Self::complete) before acting on it.
pub struct FetchPool {
    source: Arc<dyn ImageSource>,
    endpoint: String,
    events: mpsc::UnboundedSender<FetchEvent>,
    live: HashSet<u64>,
    next_unit: u64,
    generation: u64,
}

impl FetchPool {
    pub fn new(
        source: Arc<dyn ImageSource>,
        endpoint: String,
        events: mpsc::UnboundedSender<FetchEvent>,
    ) -> Self {
        Self {
            source,
            endpoint,
            events,
            live: HashSet::new(),
            next_unit: 0,
            generation: 0,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_endpoint(&mut self, endpoint: String) {
        self.endpoint = endpoint;
    }

    /// Launches units until `cached + live` reaches `target`.
    ///
    /// Returns how many were launched. Calling it again before any unit
    /// completes launches nothing.
    pub fn fill_to(&mut self, target: usize, cached: usize) -> usize {
        let needed = target.saturating_sub(cached + self.live.len());
        for _ in 0..needed {
            self.launch();
        }
        if needed > 0 {
            log::debug!(
                "launched {} fetch(es), {} live, {} cached",
                needed,
                self.live.len(),
                cached
            );
        }
        needed
    }

    fn launch(&mut self) {
        let unit = self.next_unit;
        self.next_unit += 1;
        let generation = self.generation;

        let fetch = fetch_image(self.source.as_ref(), &self.endpoint);
        let events = self.events.clone();

        // Registered before the coordinator can see any event from this unit.
        self.live.insert(unit);

        tokio::spawn(async move {
            let outcome = fetch.await.map(Arc::new);
            let _ = events.send(FetchEvent {
                unit,
                generation,
                outcome,
            });
        });
    }

    /// Retires the unit that sent `event`.
    ///
    /// Returns `None` when the event belongs to an earlier generation or to a
    /// unit that is no longer live; such events must not touch any state.
    pub fn complete(&mut self, event: &FetchEvent) -> Option<FetchState> {
        if event.generation != self.generation {
            log::debug!(
                "dropping result of unit {} from generation {}",
                event.unit,
                event.generation
            );
            return None;
        }

        if !self.live.remove(&event.unit) {
            return None;
        }
        let state = match event.outcome {
            Ok(_) => FetchState::Succeeded,
            Err(_) => FetchState::Failed,
        };
        log::debug!("unit {} finished: {:?}", event.unit, state);
        Some(state)
    }

    /// Orphans every live unit. Their requests keep running but their
    /// results will be dropped by [`complete`](Self::complete).
    pub fn reset(&mut self) {
        self.generation += 1;
        if !self.live.is_empty() {
            log::debug!("orphaning {} live fetch(es)", self.live.len());
        }
        self.live.clear();
    }
}
