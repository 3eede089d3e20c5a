use crate::ledger::model::{ActivityLog, Batch, Identity, SustainabilityLog};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Keyed record store behind the ledger.
///
/// Reads see the last committed state. [`Storage::commit`] applies a whole
/// [`WriteSet`] or nothing.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn init_schema(&self) -> Result<(), StorageError>;

    async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, StorageError>;

    async fn get_activity_log(&self, id: u64) -> Result<Option<ActivityLog>, StorageError>;

    async fn get_sustainability_log(&self, id: u64)
        -> Result<Option<SustainabilityLog>, StorageError>;

    async fn load_meta(&self) -> Result<Option<LedgerMeta>, StorageError>;

    async fn commit(&self, writes: WriteSet) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database is locked by running process {pid}")]
    Locked { pid: u32 },

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Ledger-wide state persisted next to the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMeta {
    /// Next id the shared log counter will hand out
    pub next_log_id: u64,
    pub owner: Identity,
    #[serde(default)]
    pub operators: BTreeSet<Identity>,
    #[serde(default)]
    pub paused: bool,
}

/// Records and metadata written together in one commit.
///
/// Record writes are upserts keyed by batch id or log id.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    pub batches: Vec<Batch>,
    pub activity_logs: Vec<ActivityLog>,
    pub sustainability_logs: Vec<SustainabilityLog>,
    pub meta: Option<LedgerMeta>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(mut self, batch: Batch) -> Self {
        self.batches.push(batch);
        self
    }

    pub fn with_activity_log(mut self, log: ActivityLog) -> Self {
        self.activity_logs.push(log);
        self
    }

    pub fn with_sustainability_log(mut self, log: SustainabilityLog) -> Self {
        self.sustainability_logs.push(log);
        self
    }

    pub fn with_meta(mut self, meta: LedgerMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
            && self.activity_logs.is_empty()
            && self.sustainability_logs.is_empty()
            && self.meta.is_none()
    }
}
