use super::traits::{LedgerMeta, Storage, StorageError, WriteSet};
use crate::ledger::model::{ActivityLog, Batch, SustainabilityLog};
use async_trait::async_trait;
use chrono::Utc;
use duckdb::Connection;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

impl From<duckdb::Error> for StorageError {
    fn from(e: duckdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// Check if a process with the given PID is still running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;
        Command::new("ps")
            .arg("-p")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        // Without a liveness check, treat the holder as alive
        let _ = pid;
        true
    }
}

/// Extract the holder PID from a DuckDB lock error, e.g. "... (PID 12345) ..."
fn extract_pid_from_lock_error(error_msg: &str) -> Option<u32> {
    let start = error_msg.find("(PID ")? + "(PID ".len();
    let end = error_msg[start..].find(')')?;
    error_msg[start..start + end].parse().ok()
}

fn remove_stale_lock_files(db_path: &Path) -> std::io::Result<()> {
    for suffix in ["wal", "lock"] {
        let path = PathBuf::from(format!("{}.{}", db_path.display(), suffix));
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::info!(path = %path.display(), "Removed stale DuckDB file");
        }
    }
    Ok(())
}

fn fetch_record<K, T>(conn: &Connection, sql: &str, key: K) -> Result<Option<T>, StorageError>
where
    K: duckdb::ToSql,
    T: DeserializeOwned,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(duckdb::params![key])?;

    if let Some(row) = rows.next()? {
        let payload: String = row.get(0)?;
        Ok(Some(serde_json::from_str(&payload)?))
    } else {
        Ok(None)
    }
}

/// DuckDB implementation of the Storage trait.
///
/// Each record is a keyed row holding its JSON form, next to a few plain
/// columns for ad-hoc SQL inspection.
pub struct DuckDbStorage {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStorage {
    /// Open (or create) a ledger database file.
    ///
    /// A lock left behind by a dead process is cleared and the open retried
    /// once. A lock held by a live process is reported as [`StorageError::Locked`].
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Database(format!(
                    "failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let err = match Connection::open(path) {
            Ok(conn) => return Ok(Self::from_connection(conn)),
            Err(e) => e,
        };

        let error_msg = err.to_string();
        if !error_msg.contains("Could not set lock") {
            return Err(err.into());
        }

        tracing::warn!(error = %error_msg, "Database lock detected");
        let Some(pid) = extract_pid_from_lock_error(&error_msg) else {
            return Err(err.into());
        };

        if is_process_running(pid) {
            tracing::error!(pid, "Ledger database is held by a running process");
            return Err(StorageError::Locked { pid });
        }

        tracing::warn!(pid, "Lock holder is gone, removing stale lock files");
        remove_stale_lock_files(path).map_err(|e| {
            StorageError::Database(format!("failed to remove stale lock files: {}", e))
        })?;

        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory DuckDB storage instance (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn fetch<K, T>(&self, sql: &'static str, key: K) -> Result<Option<T>, StorageError>
    where
        K: duckdb::ToSql + Send + 'static,
        T: DeserializeOwned + Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::Poisoned)?;
            fetch_record(&conn, sql, key)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl Storage for DuckDbStorage {
    async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::Poisoned)?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS batches (
                    batch_id VARCHAR PRIMARY KEY,
                    crop_name VARCHAR NOT NULL,
                    status VARCHAR NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    record VARCHAR NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS activity_logs (
                    log_id UBIGINT PRIMARY KEY,
                    batch_id VARCHAR NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    record VARCHAR NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS sustainability_logs (
                    log_id UBIGINT PRIMARY KEY,
                    batch_id VARCHAR NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    record VARCHAR NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS ledger_meta (
                    id INTEGER PRIMARY KEY DEFAULT 1,
                    meta_data VARCHAR NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    CHECK (id = 1)
                )",
                [],
            )?;

            tracing::debug!("Ledger schema ready");
            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, StorageError> {
        self.fetch(
            "SELECT record FROM batches WHERE batch_id = ?",
            batch_id.to_string(),
        )
        .await
    }

    async fn get_activity_log(&self, id: u64) -> Result<Option<ActivityLog>, StorageError> {
        self.fetch("SELECT record FROM activity_logs WHERE log_id = ?", id)
            .await
    }

    async fn get_sustainability_log(
        &self,
        id: u64,
    ) -> Result<Option<SustainabilityLog>, StorageError> {
        self.fetch("SELECT record FROM sustainability_logs WHERE log_id = ?", id)
            .await
    }

    async fn load_meta(&self) -> Result<Option<LedgerMeta>, StorageError> {
        self.fetch("SELECT meta_data FROM ledger_meta WHERE id = ?", 1i32)
            .await
    }

    async fn commit(&self, writes: WriteSet) -> Result<(), StorageError> {
        if writes.is_empty() {
            return Ok(());
        }

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StorageError::Poisoned)?;
            // Dropping the transaction without commit rolls it back
            let tx = conn.transaction()?;

            for batch in &writes.batches {
                let record = serde_json::to_string(batch)?;
                tx.execute(
                    "INSERT OR REPLACE INTO batches (batch_id, crop_name, status, updated_at, record)
                     VALUES (?, ?, ?, to_timestamp(? / 1000000.0), ?)",
                    duckdb::params![
                        batch.batch_id,
                        batch.crop_name,
                        batch.status,
                        batch.updated_at.timestamp_micros(),
                        record,
                    ],
                )?;
            }

            for log in &writes.activity_logs {
                let record = serde_json::to_string(log)?;
                tx.execute(
                    "INSERT OR REPLACE INTO activity_logs (log_id, batch_id, updated_at, record)
                     VALUES (?, ?, to_timestamp(? / 1000000.0), ?)",
                    duckdb::params![
                        log.id,
                        log.batch_id,
                        log.updated_at.timestamp_micros(),
                        record,
                    ],
                )?;
            }

            for log in &writes.sustainability_logs {
                let record = serde_json::to_string(log)?;
                tx.execute(
                    "INSERT OR REPLACE INTO sustainability_logs (log_id, batch_id, updated_at, record)
                     VALUES (?, ?, to_timestamp(? / 1000000.0), ?)",
                    duckdb::params![
                        log.id,
                        log.batch_id,
                        log.updated_at.timestamp_micros(),
                        record,
                    ],
                )?;
            }

            if let Some(meta) = &writes.meta {
                let meta_json = serde_json::to_string(meta)?;
                tx.execute(
                    "INSERT OR REPLACE INTO ledger_meta (id, meta_data, updated_at)
                     VALUES (1, ?, to_timestamp(? / 1000000.0))",
                    duckdb::params![meta_json, Utc::now().timestamp_micros()],
                )?;
            }

            tx.commit()?;
            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}
