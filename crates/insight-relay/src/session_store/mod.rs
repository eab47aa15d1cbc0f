//! Session store - keyed, time-limited analysis context for follow-up turns.
//!
//! Two interchangeable backends sit behind [`SessionStore`]: a `DashMap`
//! for single-process deployments and an r2d2-pooled SQLite table that also
//! keeps the full dataset. Expiry is enforced on every `get` and by a
//! periodic `sweep`.

pub mod memory;
pub mod migration;
pub mod schema;
pub mod sqlite;
pub mod summary;

pub use memory::InMemorySessionStore;
pub use migration::MigrationManager;
pub use sqlite::SqliteSessionStore;
pub use summary::DataSummary;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds a session stays readable after creation.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

pub fn ttl_from_secs(secs: u64) -> Duration {
    Duration::seconds(secs.min(i64::MAX as u64 / 1000) as i64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub data_summary: DataSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_data: Option<String>,
    pub initial_analysis: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        session_id: &str,
        dataset: &str,
        analysis: &str,
        now: DateTime<Utc>,
        keep_full_data: bool,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            data_summary: DataSummary::from_dataset(dataset),
            full_data: keep_full_data.then(|| dataset.to_string()),
            initial_analysis: analysis.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }
}

/// Storage contract shared by every backend.
///
/// `get` never fails for an empty id; it reports "not found". Concurrent
/// `put`s for the same id resolve last-write-wins.
pub trait SessionStore: Send + Sync {
    /// Store a prepared record, replacing any record with the same id.
    fn insert(&self, record: SessionRecord) -> anyhow::Result<()>;

    /// Fetch a live record. Expired records are deleted and reported as missing.
    fn get(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>>;

    /// Delete every expired record, returning how many were removed.
    fn sweep(&self) -> anyhow::Result<usize>;

    fn len(&self) -> anyhow::Result<usize>;

    fn ttl(&self) -> Duration;

    /// Whether records keep the complete dataset text.
    fn retains_full_data(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str;

    /// Summarize `dataset` and store it with the first analysis under `session_id`.
    fn put(&self, session_id: &str, dataset: &str, analysis: &str) -> anyhow::Result<SessionRecord> {
        let record = SessionRecord::new(
            session_id,
            dataset,
            analysis,
            Utc::now(),
            self.retains_full_data(),
        );
        self.insert(record.clone())?;
        Ok(record)
    }
}
