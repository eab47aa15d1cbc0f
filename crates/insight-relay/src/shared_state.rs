//! Shared application state handed to every axum handler.
//!
//! Everything is Arc-wrapped; handlers clone the state cheaply and never hold
//! a lock across the LLM call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{config::Config, llm::LlmClient, session_store::SessionStore};

/// Atomic counters for request accounting
#[derive(Debug, Default)]
pub struct AtomicCounters {
    pub total_requests: AtomicUsize,
    pub fresh_analyses: AtomicUsize,
    pub follow_ups: AtomicUsize,
}

impl AtomicCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_total_requests(&self) -> usize {
        self.total_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_fresh_analyses(&self) -> usize {
        self.fresh_analyses.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_follow_ups(&self) -> usize {
        self.follow_ups.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionStore>,
    pub llm: Arc<dyn LlmClient>,
    pub counters: Arc<AtomicCounters>,
}

impl AppState {
    pub fn new(config: Config, sessions: Arc<dyn SessionStore>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            llm,
            counters: Arc::new(AtomicCounters::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment_independently() {
        let counters = AtomicCounters::new();
        assert_eq!(counters.inc_total_requests(), 1);
        assert_eq!(counters.inc_total_requests(), 2);
        assert_eq!(counters.inc_fresh_analyses(), 1);
        assert_eq!(counters.follow_ups.load(Ordering::Relaxed), 0);
    }
}
