use super::traits::{LedgerMeta, Storage, StorageError, WriteSet};
use crate::ledger::model::{ActivityLog, Batch, SustainabilityLog};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Default)]
struct Tables {
    batches: HashMap<String, Batch>,
    activity_logs: HashMap<u64, ActivityLog>,
    sustainability_logs: HashMap<u64, SustainabilityLog>,
    meta: Option<LedgerMeta>,
}

/// In-process storage. Commits apply under a single write lock.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
    commits: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-empty commits applied so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init_schema(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.batches.get(batch_id).cloned())
    }

    async fn get_activity_log(&self, id: u64) -> Result<Option<ActivityLog>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.activity_logs.get(&id).cloned())
    }

    async fn get_sustainability_log(
        &self,
        id: u64,
    ) -> Result<Option<SustainabilityLog>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.sustainability_logs.get(&id).cloned())
    }

    async fn load_meta(&self) -> Result<Option<LedgerMeta>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.meta.clone())
    }

    async fn commit(&self, writes: WriteSet) -> Result<(), StorageError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().map_err(|_| StorageError::Poisoned)?;
        for batch in writes.batches {
            tables.batches.insert(batch.batch_id.clone(), batch);
        }
        for log in writes.activity_logs {
            tables.activity_logs.insert(log.id, log);
        }
        for log in writes.sustainability_logs {
            tables.sustainability_logs.insert(log.id, log);
        }
        if let Some(meta) = writes.meta {
            tables.meta = Some(meta);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::model::{self, BatchInput, Identity};
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn batch(id: &str) -> Batch {
        let start = model::now() - Duration::days(1);
        Batch::create(
            BatchInput {
                batch_id: id.to_string(),
                crop_name: "Rice".to_string(),
                start,
                end: start + Duration::days(90),
                farmer: "A".to_string(),
                expected_yield: 1000,
                land: "L1".to_string(),
                status: "Active".to_string(),
            },
            model::now(),
        )
    }

    #[tokio::test]
    async fn test_commit_and_read_back() {
        let storage = MemoryStorage::new();
        let meta = LedgerMeta {
            next_log_id: 1,
            owner: Identity::from("owner"),
            operators: BTreeSet::new(),
            paused: false,
        };

        storage
            .commit(
                WriteSet::new()
                    .with_batch(batch("B1"))
                    .with_activity_log(ActivityLog::zeroed(0))
                    .with_meta(meta.clone()),
            )
            .await
            .unwrap();

        assert_eq!(storage.get_batch("B1").await.unwrap().unwrap().crop_name, "Rice");
        assert!(storage.get_batch("B2").await.unwrap().is_none());
        assert!(storage.get_activity_log(0).await.unwrap().is_some());
        assert!(storage.get_sustainability_log(0).await.unwrap().is_none());
        assert_eq!(storage.load_meta().await.unwrap(), Some(meta));
        assert_eq!(storage.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_commit_is_not_counted() {
        let storage = MemoryStorage::new();
        storage.commit(WriteSet::new()).await.unwrap();
        assert_eq!(storage.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_upserts_by_key() {
        let storage = MemoryStorage::new();
        storage.commit(WriteSet::new().with_batch(batch("B1"))).await.unwrap();

        let mut updated = batch("B1");
        updated.crop_name = "Maize".to_string();
        storage.commit(WriteSet::new().with_batch(updated)).await.unwrap();

        assert_eq!(storage.get_batch("B1").await.unwrap().unwrap().crop_name, "Maize");
    }
}
