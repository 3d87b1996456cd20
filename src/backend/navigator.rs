use std::sync::Arc;
use tokio::sync::mpsc;

use super::cache::{clamp_capacity, PrefetchCache};
use super::fetcher::ImageSource;
use super::history::History;
use super::pool::{FetchEvent, FetchPool};
use super::record::SharedRecord;

/// The two settings the core reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub endpoint: String,
    pub capacity: usize,
}

impl CoreConfig {
    pub fn new(endpoint: impl Into<String>, capacity: usize) -> Self {
        Self {
            endpoint: endpoint.into(),
            capacity: clamp_capacity(capacity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavState {
    #[default]
    Idle,
    /// Nothing cached to show; the next successful fetch is displayed as
    /// soon as it arrives.
    LoadingFirst,
    Displaying,
}

/// What the front-end should react to, in the order it happened.
#[derive(Debug, Clone)]
pub enum Notice {
    Display(SharedRecord),
    Loading,
    Error(String),
    /// A fetch failed while the viewer had nothing to show for it.
    LoadFailed(String),
    /// Cache is empty and every recent fetch failed.
    Exhausted,
    AtFirst,
    NoHistory,
}

/// Coordinates the prefetch cache, the history and the fetch pool.
///
/// Every method runs on the coordinator; fetch results come in through
/// [`handle_fetch`](Self::handle_fetch) one at a time, in arrival order.
pub struct Navigator {
    config: CoreConfig,
    cache: PrefetchCache,
    history: History,
    pool: FetchPool,
    state: NavState,
    failure_streak: usize,
    notices: Vec<Notice>,
}

impl Navigator {
    pub fn new(
        config: CoreConfig,
        source: Arc<dyn ImageSource>,
        events: mpsc::UnboundedSender<FetchEvent>,
    ) -> Self {
        let config = CoreConfig::new(config.endpoint, config.capacity);
        Self {
            cache: PrefetchCache::new(config.capacity),
            history: History::new(),
            pool: FetchPool::new(source, config.endpoint.clone(), events),
            config,
            state: NavState::Idle,
            failure_streak: 0,
            notices: Vec::new(),
        }
    }

    /// Begins filling the cache and shows the first image once it arrives.
    pub fn start(&mut self) {
        self.state = NavState::LoadingFirst;
        self.notices.push(Notice::Loading);
        self.refill();
    }

    /// Tops up the cache without waiting to display anything.
    #[cfg(test)]
    pub fn prefetch(&mut self) {
        self.refill();
    }

    pub fn show_next(&mut self) {
        if !self.history.is_at_end() {
            if let Some(record) = self.history.step_forward() {
                self.display(record);
            }
            return;
        }

        if !self.consume_cached() {
            self.wait_for_fetch();
        }
    }

    /// Shows the next cached record even when stepped back in history,
    /// discarding the forward entries it branches away from.
    pub fn show_fresh(&mut self) {
        if !self.consume_cached() {
            self.wait_for_fetch();
        }
    }

    pub fn show_previous(&mut self) {
        if self.history.is_empty() {
            self.notices.push(Notice::NoHistory);
        } else if let Some(record) = self.history.step_backward() {
            self.display(record);
        } else {
            self.notices.push(Notice::AtFirst);
        }
    }

    /// Applies new settings. Returns false when nothing the core cares about
    /// changed; otherwise every cached, shown and in-flight image is dropped
    /// and loading starts over.
    pub fn update_config(&mut self, config: CoreConfig) -> bool {
        let config = CoreConfig::new(config.endpoint, config.capacity);
        if config == self.config {
            return false;
        }
        log::info!(
            "reconfigured: endpoint {} capacity {}",
            config.endpoint,
            config.capacity
        );

        self.pool.reset();
        self.pool.set_endpoint(config.endpoint.clone());
        self.cache.clear();
        self.cache.set_capacity(config.capacity);
        self.history.clear();
        self.failure_streak = 0;
        self.config = config;

        self.start();
        true
    }

    pub fn handle_fetch(&mut self, event: FetchEvent) {
        if self.pool.complete(&event).is_none() {
            return;
        }

        match event.outcome {
            Ok(record) => {
                self.failure_streak = 0;
                let url = record.source_url.clone();
                if !self.cache.offer(record) {
                    log::warn!("cache full, dropping {}", url);
                }
                if self.state == NavState::LoadingFirst {
                    self.consume_cached();
                }
            }
            Err(err) => {
                self.failure_streak += 1;
                log::warn!("fetch from {} failed: {}", self.config.endpoint, err);
                let message = err.to_string();
                self.notices.push(Notice::Error(message.clone()));
                if self.state == NavState::LoadingFirst && self.cache.is_empty() {
                    self.notices.push(Notice::LoadFailed(message));
                }
            }
        }

        self.refill();
    }

    fn consume_cached(&mut self) -> bool {
        let Some(record) = self.cache.take() else {
            return false;
        };
        self.history.append(record.clone());
        self.display(record);
        self.refill();
        true
    }

    fn wait_for_fetch(&mut self) {
        self.state = NavState::LoadingFirst;
        self.notices.push(Notice::Loading);
        self.refill();

        let round_failed = self.failure_streak >= self.config.capacity;
        if self.cache.is_empty() && (self.pool.live_count() == 0 || round_failed) {
            log::warn!(
                "no images available from {} ({} consecutive failures)",
                self.config.endpoint,
                self.failure_streak
            );
            self.failure_streak = 0;
            self.state = NavState::Idle;
            self.notices.push(Notice::Exhausted);
        }
    }

    fn display(&mut self, record: SharedRecord) {
        self.state = NavState::Displaying;
        self.notices.push(Notice::Display(record));
    }

    fn refill(&mut self) {
        self.pool.fill_to(self.config.capacity, self.cache.len());
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn current_record(&self) -> Option<SharedRecord> {
        self.history.current()
    }

    pub fn cache_depth(&self) -> usize {
        self.cache.len()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn history_position(&self) -> Option<(usize, usize)> {
        self.history.position()
    }

    pub fn live_fetches(&self) -> usize {
        self.pool.live_count()
    }

    pub fn state(&self) -> NavState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedSource;

    const ENDPOINT: &str = "https://example.test/random";

    struct Harness {
        nav: Navigator,
        source: Arc<ScriptedSource>,
        events: mpsc::UnboundedReceiver<FetchEvent>,
    }

    impl Harness {
        fn new(capacity: usize) -> Self {
            let source = Arc::new(ScriptedSource::new());
            let (tx, events) = mpsc::unbounded_channel();
            let nav = Navigator::new(CoreConfig::new(ENDPOINT, capacity), source.clone(), tx);
            Self {
                nav,
                source,
                events,
            }
        }

        /// Delivers the next completed fetch to the navigator.
        async fn pump(&mut self) {
            let event = self.events.recv().await.unwrap();
            self.nav.handle_fetch(event);
        }

        async fn succeed(&mut self, index: usize, url: &str) {
            self.source.succeed(index, url);
            self.pump().await;
        }

        async fn fail(&mut self, index: usize, message: &str) {
            self.source.fail(index, message);
            self.pump().await;
        }

        fn displayed(&mut self) -> Vec<String> {
            self.nav
                .drain_notices()
                .into_iter()
                .filter_map(|n| match n {
                    Notice::Display(record) => Some(record.source_url.clone()),
                    _ => None,
                })
                .collect()
        }

        fn history_urls(&self) -> Vec<String> {
            self.nav
                .history
                .iter()
                .map(|r| r.source_url.clone())
                .collect()
        }

        fn assert_bounded(&self) {
            assert!(self.nav.cache_depth() + self.nav.live_fetches() <= self.nav.capacity());
        }
    }

    #[tokio::test]
    async fn test_first_fetch_is_displayed() {
        let mut h = Harness::new(1);
        h.nav.show_next();
        assert_eq!(h.nav.state(), NavState::LoadingFirst);
        assert_eq!(h.source.launched(), 1);

        h.succeed(0, "r1").await;

        assert_eq!(h.displayed(), vec!["r1"]);
        assert_eq!(h.history_urls(), vec!["r1"]);
        assert_eq!(h.nav.history_position(), Some((1, 1)));
        assert_eq!(h.nav.cache_depth(), 0);
        assert_eq!(h.nav.live_fetches(), 1);
        assert_eq!(h.source.launched(), 2);
        assert_eq!(h.nav.state(), NavState::Displaying);
    }

    #[tokio::test]
    async fn test_cached_records_shown_in_fetch_order() {
        let mut h = Harness::new(3);
        h.nav.prefetch();
        h.succeed(0, "r1").await;
        h.succeed(1, "r2").await;
        h.succeed(2, "r3").await;
        assert_eq!(h.nav.cache_depth(), 3);
        assert_eq!(h.nav.live_fetches(), 0);
        assert!(h.displayed().is_empty());

        for _ in 0..3 {
            h.nav.show_next();
            h.assert_bounded();
        }

        assert_eq!(h.displayed(), vec!["r1", "r2", "r3"]);
        assert_eq!(h.history_urls(), vec!["r1", "r2", "r3"]);
        assert_eq!(h.nav.history_position(), Some((3, 3)));
    }

    #[tokio::test]
    async fn test_completion_order_decides_cache_order() {
        let mut h = Harness::new(2);
        h.nav.prefetch();
        h.succeed(1, "late-launch").await;
        h.succeed(0, "early-launch").await;

        h.nav.show_next();
        h.nav.show_next();
        assert_eq!(h.displayed(), vec!["late-launch", "early-launch"]);
    }

    #[tokio::test]
    async fn test_history_replay_skips_cache_and_pool() {
        let mut h = Harness::new(3);
        h.nav.prefetch();
        h.succeed(0, "r1").await;
        h.succeed(1, "r2").await;
        h.succeed(2, "r3").await;
        for _ in 0..3 {
            h.nav.show_next();
        }
        h.displayed();

        h.nav.show_previous();
        h.nav.show_previous();
        assert_eq!(h.displayed(), vec!["r2", "r1"]);
        assert_eq!(h.nav.history_position(), Some((1, 3)));
        assert_eq!(h.nav.current_record().unwrap().source_url, "r1");

        let launched = h.source.launched();
        let cached = h.nav.cache_depth();
        h.nav.show_next();

        assert_eq!(h.displayed(), vec!["r2"]);
        assert_eq!(h.nav.history_position(), Some((2, 3)));
        assert_eq!(h.source.launched(), launched);
        assert_eq!(h.nav.cache_depth(), cached);
    }

    #[tokio::test]
    async fn test_fresh_record_after_stepping_back_truncates_history() {
        let mut h = Harness::new(2);
        h.nav.prefetch();
        h.succeed(0, "r1").await;
        h.succeed(1, "r2").await;
        h.nav.show_next();
        h.nav.show_next();
        assert_eq!(h.source.launched(), 4);

        h.nav.show_previous();
        assert_eq!(h.nav.history_position(), Some((1, 2)));
        h.succeed(2, "r4").await;
        assert_eq!(h.nav.cache_depth(), 1);
        h.displayed();

        h.nav.show_fresh();

        assert_eq!(h.displayed(), vec!["r4"]);
        assert_eq!(h.history_urls(), vec!["r1", "r4"]);
        assert_eq!(h.nav.history_position(), Some((2, 2)));
    }

    #[tokio::test]
    async fn test_show_previous_edges() {
        let mut h = Harness::new(1);
        h.nav.show_previous();
        assert!(matches!(h.nav.drain_notices()[..], [Notice::NoHistory]));

        h.nav.show_next();
        h.succeed(0, "r1").await;
        h.nav.drain_notices();
        h.nav.show_previous();
        assert!(matches!(h.nav.drain_notices()[..], [Notice::AtFirst]));
        assert_eq!(h.nav.history_position(), Some((1, 1)));
    }

    #[tokio::test]
    async fn test_failures_exhaust_then_recover() {
        let mut h = Harness::new(2);
        h.nav.show_next();
        h.fail(0, "connection refused").await;
        h.fail(1, "connection refused").await;

        let notices = h.nav.drain_notices();
        assert!(notices.iter().any(|n| matches!(n, Notice::LoadFailed(_))));
        assert_eq!(
            notices
                .iter()
                .filter(|n| matches!(n, Notice::Error(_)))
                .count(),
            2
        );

        h.nav.show_next();
        assert!(h.nav.drain_notices().iter().any(|n| matches!(n, Notice::Exhausted)));
        assert_eq!(h.nav.state(), NavState::Idle);
        // Replacements were launched as each failure came in.
        assert_eq!(h.nav.live_fetches(), 2);

        h.succeed(2, "r5").await;
        assert!(h.displayed().is_empty());
        assert_eq!(h.nav.cache_depth(), 1);

        h.nav.show_next();
        assert_eq!(h.displayed(), vec!["r5"]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_exhaustion() {
        let mut h = Harness::new(3);
        h.nav.show_next();
        h.fail(0, "timeout").await;
        h.nav.drain_notices();

        h.nav.show_next();
        let notices = h.nav.drain_notices();
        assert!(!notices.iter().any(|n| matches!(n, Notice::Exhausted)));
        assert_eq!(h.nav.state(), NavState::LoadingFirst);
    }

    #[tokio::test]
    async fn test_failure_then_success_while_loading_displays() {
        let mut h = Harness::new(1);
        h.nav.start();
        h.fail(0, "503").await;
        assert_eq!(h.nav.state(), NavState::LoadingFirst);
        h.succeed(1, "r1").await;
        assert_eq!(h.displayed(), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_config_change_discards_everything() {
        let mut h = Harness::new(2);
        h.nav.start();
        h.succeed(0, "r1").await;
        h.nav.drain_notices();
        assert_eq!(h.nav.live_fetches(), 2);

        assert!(h.nav.update_config(CoreConfig::new("https://other.test/random", 3)));
        assert_eq!(h.nav.state(), NavState::LoadingFirst);
        assert!(h.nav.current_record().is_none());
        assert_eq!(h.nav.history_position(), None);
        assert_eq!(h.nav.cache_depth(), 0);
        assert_eq!(h.nav.live_fetches(), 3);
        assert_eq!(
            h.source.requested()[3..],
            [
                "https://other.test/random",
                "https://other.test/random",
                "https://other.test/random"
            ]
        );

        // A result from before the change arrives late and is ignored.
        h.succeed(1, "stale").await;
        assert!(h.displayed().is_empty());
        assert_eq!(h.nav.cache_depth(), 0);
        assert_eq!(h.nav.live_fetches(), 3);

        h.succeed(3, "fresh").await;
        assert_eq!(h.displayed(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_unchanged_config_is_a_no_op() {
        let mut h = Harness::new(2);
        h.nav.start();
        assert!(!h.nav.update_config(CoreConfig::new(ENDPOINT, 2)));
        assert_eq!(h.source.launched(), 2);
    }

    #[tokio::test]
    async fn test_refill_is_idempotent() {
        let mut h = Harness::new(4);
        h.nav.prefetch();
        h.nav.prefetch();
        h.nav.show_next();
        assert_eq!(h.source.launched(), 4);
        h.assert_bounded();
    }

    #[tokio::test]
    async fn test_bound_holds_through_mixed_outcomes() {
        let mut h = Harness::new(3);
        h.nav.start();
        let mut next = 0;
        for round in 0..12 {
            if round % 3 == 0 {
                h.fail(next, "reset by peer").await;
            } else {
                h.succeed(next, &format!("r{}", round)).await;
            }
            next += 1;
            h.assert_bounded();
            if round % 2 == 0 {
                h.nav.show_next();
                h.assert_bounded();
            }
        }
    }
}
