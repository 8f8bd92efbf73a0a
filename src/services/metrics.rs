//! Request latency log kept by the daemon.

use std::path::Path;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS request_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    kind TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    success INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_request_log_timestamp ON request_log(timestamp);
CREATE INDEX IF NOT EXISTS idx_request_log_kind ON request_log(kind);
"#;

/// Operation a logged request performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Upload,
    Query,
    Clear,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Upload => "upload",
            RequestKind::Query => "query",
            RequestKind::Clear => "clear",
        }
    }
}

pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "auto_vacuum", "INCREMENTAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn record(&self, kind: RequestKind, latency_ms: u64, success: bool) {
        if let Err(e) = self.conn.execute(
            "INSERT INTO request_log (timestamp, kind, latency_ms, success)
             VALUES (datetime('now'), ?1, ?2, ?3)",
            params![kind.as_str(), latency_ms as i64, success as i32],
        ) {
            tracing::warn!(error = %e, "failed to record request metrics");
        }
    }

    pub fn get_summary(&self, retention_days: u32) -> MetricsSummary {
        let window = format!("-{} days", retention_days);
        let mut summary = self
            .conn
            .query_row(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(AVG(latency_ms), 0),
                    COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END) * 100.0 / NULLIF(COUNT(*), 0), 0)
                FROM request_log
                WHERE timestamp >= datetime('now', ?1)
                "#,
                params![window],
                |row| {
                    Ok(MetricsSummary {
                        total_requests: row.get::<_, i64>(0)? as u64,
                        avg_latency_ms: row.get::<_, f64>(1)? as u64,
                        error_rate: row.get::<_, f64>(2)? as f32,
                        ..Default::default()
                    })
                },
            )
            .unwrap_or_default();

        summary.uploads = self.count_kind(RequestKind::Upload, &window);
        summary.queries = self.count_kind(RequestKind::Query, &window);
        summary
    }

    fn count_kind(&self, kind: RequestKind, window: &str) -> u64 {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM request_log
                 WHERE kind = ?1 AND timestamp >= datetime('now', ?2)",
                params![kind.as_str(), window],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
            .unwrap_or(0)
    }

    /// Delete rows older than the retention window; returns how many went.
    pub fn cleanup(&self, retention_days: u32) -> usize {
        let window = format!("-{} days", retention_days);
        match self.conn.execute(
            "DELETE FROM request_log WHERE timestamp < datetime('now', ?1)",
            params![window],
        ) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "failed to purge old metrics");
                0
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub uploads: u64,
    pub queries: u64,
    pub avg_latency_ms: u64,
    /// Percentage of failed requests
    pub error_rate: f32,
}
