
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ttl_from_secs, SessionRecord, SessionStore, DEFAULT_SESSION_TTL_SECS};
use crate::metrics;

/// Process-local session store. Contents are lost on restart.
#[derive(Clone)]
pub struct InMemorySessionStore {
    records: Arc<DashMap<String, SessionRecord>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            ttl,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_ttl(ttl_from_secs(DEFAULT_SESSION_TTL_SECS))
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, record: SessionRecord) -> anyhow::Result<()> {
        debug!("Storing session {} in memory", record.session_id);
        self.records.insert(record.session_id.clone(), record);
        Ok(())
    }

    fn get(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        if session_id.is_empty() {
            return Ok(None);
        }

        let record = match self.records.get(session_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        let now = Utc::now();
        if record.is_expired(now, self.ttl) {
            // Re-check under the shard lock so a concurrent overwrite survives.
            let ttl = self.ttl;
            if self
                .records
                .remove_if(session_id, |_, r| r.is_expired(now, ttl))
                .is_some()
            {
                warn!("Session {} expired; removed on lookup", session_id);
                metrics::inc_sessions_expired("lookup", 1);
            }
            return Ok(None);
        }

        Ok(Some(record))
    }

    fn sweep(&self) -> anyhow::Result<usize> {
        let now = Utc::now();
        let ttl = self.ttl;
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired(now, ttl);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    fn len(&self) -> anyhow::Result<usize> {
        Ok(self.records.len())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
