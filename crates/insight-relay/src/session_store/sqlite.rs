//! SQLite-backed session store. Survives restarts and keeps the full dataset text.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, warn};

use super::migration::MigrationManager;
use super::schema::{from_db_timestamp, to_db_timestamp, UPSERT_SESSION_SQL};
use super::{ttl_from_secs, DataSummary, SessionRecord, SessionStore, DEFAULT_SESSION_TTL_SECS};
use crate::metrics;

pub struct SqliteSessionStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
    ttl: Duration,
}

impl SqliteSessionStore {
    pub fn new(db_path: &Path, ttl: Duration) -> anyhow::Result<Self> {
        info!("Opening session database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
        let manager = SqliteConnectionManager::file(db_path).with_flags(
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        );
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }
        info!("Session database initialized successfully");
        Ok(Self {
            pool: Arc::new(pool),
            ttl,
        })
    }

    /// Single-connection in-memory database, mostly for tests.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }
        Ok(Self {
            pool: Arc::new(pool),
            ttl: ttl_from_secs(DEFAULT_SESSION_TTL_SECS),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }
}

impl SessionStore for SqliteSessionStore {
    fn insert(&self, record: SessionRecord) -> anyhow::Result<()> {
        let conn = self.get_conn()?;
        let summary_json = serde_json::to_string(&record.data_summary)?;
        conn.execute(
            UPSERT_SESSION_SQL,
            params![
                record.session_id,
                summary_json,
                record.full_data,
                record.initial_analysis,
                to_db_timestamp(record.created_at),
                to_db_timestamp(record.updated_at),
            ],
        )?;
        debug!("Upserted session {}", record.session_id);
        Ok(())
    }

    fn get(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        if session_id.is_empty() {
            return Ok(None);
        }

        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT session_id, data_summary, full_data, initial_analysis, created_at, updated_at
                 FROM analysis_sessions WHERE session_id = ?1",
                [session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, summary_json, full_data, initial_analysis, created_raw, updated_raw)) = row
        else {
            return Ok(None);
        };

        let data_summary: DataSummary = serde_json::from_str(&summary_json)
            .with_context(|| format!("Corrupt data summary for session {}", id))?;
        let record = SessionRecord {
            session_id: id,
            data_summary,
            full_data,
            initial_analysis,
            created_at: from_db_timestamp(&created_raw)?,
            updated_at: from_db_timestamp(&updated_raw)?,
        };

        if record.is_expired(Utc::now(), self.ttl) {
            // Match on created_at so a concurrent overwrite is not lost.
            let deleted = conn.execute(
                "DELETE FROM analysis_sessions WHERE session_id = ?1 AND created_at = ?2",
                params![session_id, created_raw],
            )?;
            if deleted > 0 {
                warn!("Session {} expired; removed on lookup", session_id);
                metrics::inc_sessions_expired("lookup", deleted);
            }
            return Ok(None);
        }

        Ok(Some(record))
    }

    fn sweep(&self) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let cutoff = to_db_timestamp(Utc::now() - self.ttl);
        let deleted = conn.execute(
            "DELETE FROM analysis_sessions WHERE created_at < ?1",
            [cutoff],
        )?;
        Ok(deleted)
    }

    fn len(&self) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM analysis_sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn retains_full_data(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backdated(id: &str, secs: i64) -> SessionRecord {
        SessionRecord::new(id, "a,b\n1,2", "old", Utc::now() - Duration::seconds(secs), true)
    }

    #[test]
    fn test_put_then_get_keeps_full_data() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        let dataset = "a,b\n1,2\n3,4\n5,6\n7,8";
        let stored = store.put("s1", dataset, "Four rows.").unwrap();

        let record = store.get("s1").unwrap().unwrap();
        assert_eq!(record, stored);
        assert_eq!(record.full_data.as_deref(), Some(dataset));
        assert_eq!(record.data_summary.total_rows, 4);
        assert_eq!(record.data_summary.sample_rows, vec!["1,2", "3,4", "5,6"]);
    }

    #[test]
    fn test_get_unknown_and_empty_ids() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
        assert!(store.get("").unwrap().is_none());
    }

    #[test]
    fn test_expired_record_is_deleted_on_get() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        store.insert(backdated("old", 3601)).unwrap();

        assert!(store.get("old").unwrap().is_none());
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.get("old").unwrap().is_none());
    }

    #[test]
    fn test_upsert_overwrites() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        store.put("s", "h\n1", "first").unwrap();
        store.put("s", "h\n1\n2\n3", "second").unwrap();

        assert_eq!(store.len().unwrap(), 1);
        let record = store.get("s").unwrap().unwrap();
        assert_eq!(record.initial_analysis, "second");
        assert_eq!(record.data_summary.total_rows, 3);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = SqliteSessionStore::new_in_memory().unwrap();
        store.insert(backdated("a", 7200)).unwrap();
        store.insert(backdated("b", 3602)).unwrap();
        store.insert(backdated("c", 60)).unwrap();

        assert_eq!(store.sweep().unwrap(), 2);
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.get("c").unwrap().is_some());
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let ttl = ttl_from_secs(DEFAULT_SESSION_TTL_SECS);

        {
            let store = SqliteSessionStore::new(&path, ttl).unwrap();
            store.put("persisted", "x,y\n1,2", "kept").unwrap();
        }

        let reopened = SqliteSessionStore::new(&path, ttl).unwrap();
        let record = reopened.get("persisted").unwrap().unwrap();
        assert_eq!(record.initial_analysis, "kept");
        assert_eq!(record.full_data.as_deref(), Some("x,y\n1,2"));
    }
}
