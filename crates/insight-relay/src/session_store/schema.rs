
//! Database schema definitions for the persisted session store
use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamps are fixed-width RFC 3339 (nanoseconds, `Z`), so text order is time order.
pub fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn from_db_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| anyhow::anyhow!("Failed to parse timestamp '{}': {}", raw, e))?
        .with_timezone(&Utc))
}

pub const SESSIONS_SQL: &str = "
-- Analysis sessions table
CREATE TABLE IF NOT EXISTS analysis_sessions (
    session_id TEXT PRIMARY KEY,
    data_summary TEXT NOT NULL,
    full_data TEXT,
    initial_analysis TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_analysis_sessions_created ON analysis_sessions (created_at);
";

pub const UPSERT_SESSION_SQL: &str = "
INSERT INTO analysis_sessions
    (session_id, data_summary, full_data, initial_analysis, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(session_id) DO UPDATE SET
    data_summary = excluded.data_summary,
    full_data = excluded.full_data,
    initial_analysis = excluded.initial_analysis,
    created_at = excluded.created_at,
    updated_at = excluded.updated_at
";
