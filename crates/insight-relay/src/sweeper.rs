// insight-relay/crates/insight-relay/src/sweeper.rs
//! Background task that drops expired sessions on a fixed interval.
//!
//! Lazy expiry on `get` keeps lookups correct on its own; the sweep only
//! bounds how long abandoned sessions occupy the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::session_store::SessionStore;

pub struct SessionSweeper {
    handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl SessionSweeper {
    pub fn start(store: Arc<dyn SessionStore>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; skip it so a fresh store is not swept at boot.
            ticker.tick().await;
            info!("Session sweeper started (every {}s)", interval.as_secs());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_once(store.as_ref());
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Session sweeper received shutdown signal");
                        break;
                    }
                }
            }
            info!("Session sweeper stopped");
        });

        Self {
            handle,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.handle.await {
            warn!("Session sweeper task ended abnormally: {}", e);
        }
    }
}

pub fn sweep_once(store: &dyn SessionStore) -> usize {
    let removed = match store.sweep() {
        Ok(removed) => removed,
        Err(e) => {
            warn!("Session sweep failed: {}", e);
            return 0;
        }
    };
    if removed > 0 {
        info!("Swept {} expired session(s)", removed);
        metrics::inc_sessions_expired("sweep", removed);
    }
    report_stored_sessions(store);
    removed
}

/// Push the store's current size to the `sessions_stored` gauge.
pub fn report_stored_sessions(store: &dyn SessionStore) {
    match store.len() {
        Ok(count) => metrics::set_sessions_stored(count),
        Err(e) => debug!("Could not count stored sessions: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_store::{InMemorySessionStore, SessionRecord};
    use chrono::{Duration as ChronoDuration, Utc};

    fn store_with_one_stale() -> Arc<InMemorySessionStore> {
        let store = Arc::new(InMemorySessionStore::new());
        store.put("fresh", "a\n1", "ok").unwrap();
        store
            .insert(SessionRecord::new(
                "stale",
                "a\n1",
                "old",
                Utc::now() - ChronoDuration::seconds(4000),
                false,
            ))
            .unwrap();
        store
    }

    #[test]
    fn test_sweep_once_counts_removed() {
        let store = store_with_one_stale();
        assert_eq!(sweep_once(store.as_ref()), 1);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(sweep_once(store.as_ref()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval_and_stops() {
        let store = store_with_one_stale();
        let sweeper = SessionSweeper::start(store.clone(), Duration::from_secs(900));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.len().unwrap(), 2);

        tokio::time::sleep(Duration::from_secs(900)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.len().unwrap(), 1);

        sweeper.stop().await;
    }
}
