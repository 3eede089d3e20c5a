use super::access::{AccessControl, AccessError, Operation, PauseScope};
use super::events::{EventKind, EventSink, LedgerEvent};
use super::history::{Audited, HistoryEntry};
use super::ids::IdRegistry;
use super::model::{
    self, ActivityLog, ActivityLogEditInput, ActivityLogInput, Batch, BatchEditInput, BatchInput,
    Identity, SustainabilityLog, SustainabilityLogEditInput, SustainabilityLogInput,
};
use super::validation::{self, Limits, ValidationError};
use crate::config::types::LedgerConfig;
use crate::storage::traits::{LedgerMeta, Storage, StorageError, WriteSet};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("batch '{0}' already exists")]
    BatchAlreadyExists(String),

    #[error("log {0} does not exist")]
    LogNotFound(u64),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LedgerError {
    /// The validation failure behind this error, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            LedgerError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Behavioral knobs for a ledger instance.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Initial owner, applied only when the store holds no ledger state yet
    pub owner: Identity,
    /// Initial operator set, same rule as `owner`
    pub operators: Vec<Identity>,
    /// Reject batch id reuse and edits of unknown log ids
    pub strict_existence: bool,
    pub pause_scope: PauseScope,
    pub limits: Limits,
}

impl LedgerSettings {
    pub fn new(owner: impl Into<Identity>) -> Self {
        Self {
            owner: owner.into(),
            operators: Vec::new(),
            strict_existence: true,
            pause_scope: PauseScope::default(),
            limits: Limits::default(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            owner: Identity::new(config.owner.clone()),
            operators: config.operators.iter().cloned().map(Identity::new).collect(),
            strict_existence: config.strict_existence,
            pause_scope: config.pause_scope,
            limits: Limits {
                max_string_length: config.max_string_length,
            },
        }
    }
}

/// State that only changes inside the write section.
struct WriteState {
    access: AccessControl,
    ids: IdRegistry,
}

impl WriteState {
    fn from_meta(meta: LedgerMeta) -> Self {
        Self {
            access: AccessControl::restore(meta.owner, meta.operators, meta.paused),
            ids: IdRegistry::starting_at(meta.next_log_id),
        }
    }
}

fn ledger_meta(access: &AccessControl, next_log_id: u64) -> LedgerMeta {
    LedgerMeta {
        next_log_id,
        owner: access.owner().clone(),
        operators: access.operators().clone(),
        paused: access.is_paused(),
    }
}

/// The traceability ledger.
///
/// Every mutating call runs inside one global write section: authorization,
/// validation against current state, the storage commit, id allocation and
/// event emission all happen before the next mutation may start. Reads go
/// straight to storage and observe the last committed state.
pub struct Ledger {
    storage: Arc<dyn Storage>,
    sink: Arc<dyn EventSink>,
    settings: LedgerSettings,
    state: Mutex<WriteState>,
}

impl Ledger {
    /// Open a ledger over `storage`, initializing ledger state on first use.
    pub async fn open(
        storage: Arc<dyn Storage>,
        settings: LedgerSettings,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, LedgerError> {
        storage.init_schema().await?;

        let meta = match storage.load_meta().await? {
            Some(meta) => {
                info!(
                    owner = %meta.owner,
                    next_log_id = meta.next_log_id,
                    paused = meta.paused,
                    "Resuming existing ledger"
                );
                meta
            }
            None => {
                if settings.owner.is_empty() {
                    return Err(AccessError::EmptyIdentity.into());
                }
                let meta = LedgerMeta {
                    next_log_id: 0,
                    owner: settings.owner.clone(),
                    operators: settings
                        .operators
                        .iter()
                        .filter(|op| !op.is_empty())
                        .cloned()
                        .collect::<BTreeSet<_>>(),
                    paused: false,
                };
                storage.commit(WriteSet::new().with_meta(meta.clone())).await?;
                info!(
                    owner = %meta.owner,
                    operators = meta.operators.len(),
                    "Initialized new ledger"
                );
                meta
            }
        };

        Ok(Self {
            storage,
            sink,
            settings,
            state: Mutex::new(WriteState::from_meta(meta)),
        })
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    fn emit(&self, at: DateTime<Utc>, kind: EventKind) {
        self.sink.emit(&LedgerEvent::new(at, kind));
    }

    fn authorize(
        &self,
        state: &WriteState,
        caller: &Identity,
        operation: Operation,
    ) -> Result<(), LedgerError> {
        state
            .access
            .authorize(caller, operation, self.settings.pause_scope)
            .map_err(LedgerError::from)
    }

    fn rejected<T>(
        operation: Operation,
        caller: &Identity,
        result: Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        if let Err(e) = &result {
            warn!(operation = %operation, caller = %caller, error = %e, "Mutation rejected");
        }
        result
    }

    async fn existing_batch(&self, batch_id: &str) -> Result<Batch, LedgerError> {
        self.storage
            .get_batch(batch_id)
            .await?
            .filter(Batch::exists)
            .ok_or_else(|| ValidationError::InvalidBatchId(batch_id.to_string()).into())
    }

    pub async fn create_batch(
        &self,
        caller: &Identity,
        input: BatchInput,
    ) -> Result<String, LedgerError> {
        let state = self.state.lock().await;
        let result = self.create_batch_locked(&state, caller, input).await;
        Self::rejected(Operation::CreateBatch, caller, result)
    }

    async fn create_batch_locked(
        &self,
        state: &WriteState,
        caller: &Identity,
        input: BatchInput,
    ) -> Result<String, LedgerError> {
        self.authorize(state, caller, Operation::CreateBatch)?;
        validation::validate_batch(&input, &self.settings.limits)?;

        let previous = self.storage.get_batch(&input.batch_id).await?;
        if let Some(previous) = previous.filter(Batch::exists) {
            if self.settings.strict_existence {
                return Err(LedgerError::BatchAlreadyExists(previous.batch_id));
            }
            warn!(batch_id = %previous.batch_id, "Overwriting existing batch");
        }

        let now = model::now();
        let batch = Batch::create(input, now);
        self.storage
            .commit(WriteSet::new().with_batch(batch.clone()))
            .await?;

        info!(batch_id = %batch.batch_id, crop = %batch.crop_name, "Batch created");
        let batch_id = batch.batch_id.clone();
        self.emit(now, EventKind::BatchCreated { batch });
        Ok(batch_id)
    }

    pub async fn edit_batch(
        &self,
        caller: &Identity,
        input: BatchEditInput,
    ) -> Result<(), LedgerError> {
        let state = self.state.lock().await;
        let result = self.edit_batch_locked(&state, caller, input).await;
        Self::rejected(Operation::EditBatch, caller, result)
    }

    async fn edit_batch_locked(
        &self,
        state: &WriteState,
        caller: &Identity,
        input: BatchEditInput,
    ) -> Result<(), LedgerError> {
        self.authorize(state, caller, Operation::EditBatch)?;
        let mut batch = self.existing_batch(&input.batch_id).await?;
        validation::validate_batch(&input, &self.settings.limits)?;

        let now = model::now();
        batch.apply_edit(input, now);
        batch.push_history(HistoryEntry::edited(now));
        self.storage
            .commit(WriteSet::new().with_batch(batch.clone()))
            .await?;

        info!(batch_id = %batch.batch_id, revisions = batch.history.len(), "Batch edited");
        self.emit(now, EventKind::BatchEdited { batch });
        Ok(())
    }

    pub async fn deactivate_batch(
        &self,
        caller: &Identity,
        batch_id: &str,
    ) -> Result<(), LedgerError> {
        let state = self.state.lock().await;
        let result = self.deactivate_batch_locked(&state, caller, batch_id).await;
        Self::rejected(Operation::DeactivateBatch, caller, result)
    }

    async fn deactivate_batch_locked(
        &self,
        state: &WriteState,
        caller: &Identity,
        batch_id: &str,
    ) -> Result<(), LedgerError> {
        self.authorize(state, caller, Operation::DeactivateBatch)?;
        let mut batch = self.existing_batch(batch_id).await?;

        let now = model::now();
        batch.deactivate(now);
        batch.push_history(HistoryEntry::deactivated(now));
        self.storage
            .commit(WriteSet::new().with_batch(batch.clone()))
            .await?;

        info!(batch_id = %batch.batch_id, "Batch deactivated");
        self.emit(now, EventKind::BatchDeactivated { batch });
        Ok(())
    }

    pub async fn create_activity_log(
        &self,
        caller: &Identity,
        input: ActivityLogInput,
    ) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().await;
        let result = self.create_activity_log_locked(&mut state, caller, input).await;
        Self::rejected(Operation::CreateActivityLog, caller, result)
    }

    async fn create_activity_log_locked(
        &self,
        state: &mut WriteState,
        caller: &Identity,
        input: ActivityLogInput,
    ) -> Result<u64, LedgerError> {
        self.authorize(state, caller, Operation::CreateActivityLog)?;
        let batch = self.storage.get_batch(&input.batch_id).await?;
        validation::check_batch_reference(&input.batch_id, batch.as_ref())?;

        let now = model::now();
        validation::validate_activity(&input, now, &self.settings.limits)?;

        let id = state.ids.peek();
        let log = ActivityLog::create(id, input, now);
        let meta = ledger_meta(&state.access, id + 1);
        self.storage
            .commit(WriteSet::new().with_activity_log(log.clone()).with_meta(meta))
            .await?;
        state.ids.advance();

        info!(
            log_id = id,
            batch_id = %log.batch_id,
            activity = %log.activity_name,
            "Activity log created"
        );
        self.emit(now, EventKind::ActivityLogCreated { log });
        Ok(id)
    }

    pub async fn edit_activity_log(
        &self,
        caller: &Identity,
        input: ActivityLogEditInput,
    ) -> Result<(), LedgerError> {
        let state = self.state.lock().await;
        let result = self.edit_activity_log_locked(&state, caller, input).await;
        Self::rejected(Operation::EditActivityLog, caller, result)
    }

    async fn edit_activity_log_locked(
        &self,
        state: &WriteState,
        caller: &Identity,
        input: ActivityLogEditInput,
    ) -> Result<(), LedgerError> {
        self.authorize(state, caller, Operation::EditActivityLog)?;
        let now = model::now();
        validation::validate_activity_edit(&input, now, &self.settings.limits)?;

        // Lenient edits of never-issued ids are stored too, so later edits
        // must build on that record.
        let stored = self.storage.get_activity_log(input.id).await?;
        let mut log = if self.settings.strict_existence {
            stored
                .filter(|_| state.ids.is_issued(input.id))
                .ok_or(LedgerError::LogNotFound(input.id))?
        } else {
            stored.unwrap_or_else(|| {
                warn!(log_id = input.id, "Editing activity log that was never created");
                ActivityLog::zeroed(input.id)
            })
        };

        log.apply_edit(input, now);
        log.push_history(HistoryEntry::edited(now));
        self.storage
            .commit(WriteSet::new().with_activity_log(log.clone()))
            .await?;

        info!(log_id = log.id, revisions = log.history.len(), "Activity log edited");
        self.emit(now, EventKind::ActivityLogEdited { log });
        Ok(())
    }

    pub async fn create_sustainability_log(
        &self,
        caller: &Identity,
        input: SustainabilityLogInput,
    ) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().await;
        let result = self
            .create_sustainability_log_locked(&mut state, caller, input)
            .await;
        Self::rejected(Operation::CreateSustainabilityLog, caller, result)
    }

    async fn create_sustainability_log_locked(
        &self,
        state: &mut WriteState,
        caller: &Identity,
        input: SustainabilityLogInput,
    ) -> Result<u64, LedgerError> {
        self.authorize(state, caller, Operation::CreateSustainabilityLog)?;
        let batch = self.storage.get_batch(&input.batch_id).await?;
        validation::check_batch_reference(&input.batch_id, batch.as_ref())?;

        let now = model::now();
        validation::validate_sustainability(&input, now, &self.settings.limits)?;

        let id = state.ids.peek();
        let log = SustainabilityLog::create(id, input, now);
        let meta = ledger_meta(&state.access, id + 1);
        self.storage
            .commit(
                WriteSet::new()
                    .with_sustainability_log(log.clone())
                    .with_meta(meta),
            )
            .await?;
        state.ids.advance();

        info!(
            log_id = id,
            batch_id = %log.batch_id,
            practice = %log.practice_name,
            "Sustainability log created"
        );
        self.emit(now, EventKind::SustainabilityLogCreated { log });
        Ok(id)
    }

    pub async fn edit_sustainability_log(
        &self,
        caller: &Identity,
        input: SustainabilityLogEditInput,
    ) -> Result<(), LedgerError> {
        let state = self.state.lock().await;
        let result = self
            .edit_sustainability_log_locked(&state, caller, input)
            .await;
        Self::rejected(Operation::EditSustainabilityLog, caller, result)
    }

    async fn edit_sustainability_log_locked(
        &self,
        state: &WriteState,
        caller: &Identity,
        input: SustainabilityLogEditInput,
    ) -> Result<(), LedgerError> {
        self.authorize(state, caller, Operation::EditSustainabilityLog)?;
        let now = model::now();
        validation::validate_sustainability_edit(&input, now, &self.settings.limits)?;

        // Lenient edits of never-issued ids are stored too, so later edits
        // must build on that record.
        let stored = self.storage.get_sustainability_log(input.id).await?;
        let mut log = if self.settings.strict_existence {
            stored
                .filter(|_| state.ids.is_issued(input.id))
                .ok_or(LedgerError::LogNotFound(input.id))?
        } else {
            stored.unwrap_or_else(|| {
                warn!(log_id = input.id, "Editing sustainability log that was never created");
                SustainabilityLog::zeroed(input.id)
            })
        };

        log.apply_edit(input, now);
        log.push_history(HistoryEntry::edited(now));
        self.storage
            .commit(WriteSet::new().with_sustainability_log(log.clone()))
            .await?;

        info!(log_id = log.id, revisions = log.history.len(), "Sustainability log edited");
        self.emit(now, EventKind::SustainabilityLogEdited { log });
        Ok(())
    }

    /// Apply an access-control change: authorize, persist, then swap it in.
    async fn update_access<F>(
        &self,
        caller: &Identity,
        operation: Operation,
        change: F,
    ) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut AccessControl) -> Result<EventKind, AccessError>,
    {
        let mut state = self.state.lock().await;
        let result = async {
            self.authorize(&state, caller, operation)?;

            let mut access = state.access.clone();
            let kind = change(&mut access)?;
            let meta = ledger_meta(&access, state.ids.peek());
            self.storage.commit(WriteSet::new().with_meta(meta)).await?;
            state.access = access;

            info!(operation = %operation, caller = %caller, "Access control updated");
            self.emit(model::now(), kind);
            Ok::<(), LedgerError>(())
        }
        .await;
        Self::rejected(operation, caller, result)
    }

    pub async fn set_operator(
        &self,
        caller: &Identity,
        operator: Identity,
        enabled: bool,
    ) -> Result<(), LedgerError> {
        self.update_access(caller, Operation::SetOperator, |access| {
            access.set_operator(operator.clone(), enabled)?;
            Ok(EventKind::OperatorUpdated { operator, enabled })
        })
        .await
    }

    /// Pausing an already paused ledger is accepted and re-emits the event.
    pub async fn pause(&self, caller: &Identity) -> Result<(), LedgerError> {
        let by = caller.clone();
        self.update_access(caller, Operation::Pause, |access| {
            access.set_paused(true);
            Ok(EventKind::Paused { by })
        })
        .await
    }

    pub async fn unpause(&self, caller: &Identity) -> Result<(), LedgerError> {
        let by = caller.clone();
        self.update_access(caller, Operation::Unpause, |access| {
            access.set_paused(false);
            Ok(EventKind::Unpaused { by })
        })
        .await
    }

    pub async fn transfer_ownership(
        &self,
        caller: &Identity,
        new_owner: Identity,
    ) -> Result<(), LedgerError> {
        self.update_access(caller, Operation::TransferOwnership, |access| {
            let previous_owner = access.transfer_ownership(new_owner.clone())?;
            Ok(EventKind::OwnershipTransferred {
                previous_owner,
                new_owner,
            })
        })
        .await
    }

    pub async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, LedgerError> {
        debug!(batch_id, "Reading batch");
        Ok(self.storage.get_batch(batch_id).await?.filter(Batch::exists))
    }

    pub async fn batch_exists(&self, batch_id: &str) -> Result<bool, LedgerError> {
        Ok(self.get_batch(batch_id).await?.is_some())
    }

    pub async fn get_activity_log(&self, id: u64) -> Result<Option<ActivityLog>, LedgerError> {
        debug!(log_id = id, "Reading activity log");
        Ok(self.storage.get_activity_log(id).await?)
    }

    pub async fn get_sustainability_log(
        &self,
        id: u64,
    ) -> Result<Option<SustainabilityLog>, LedgerError> {
        debug!(log_id = id, "Reading sustainability log");
        Ok(self.storage.get_sustainability_log(id).await?)
    }

    /// Fails with `InvalidBatchId` when the batch does not exist.
    pub async fn get_batch_history(
        &self,
        batch_id: &str,
    ) -> Result<Vec<HistoryEntry>, LedgerError> {
        let batch = self.existing_batch(batch_id).await?;
        Ok(batch.history().to_vec())
    }

    /// Unknown ids yield an empty history.
    pub async fn get_activity_log_history(
        &self,
        id: u64,
    ) -> Result<Vec<HistoryEntry>, LedgerError> {
        Ok(self
            .get_activity_log(id)
            .await?
            .map(|log| log.history().to_vec())
            .unwrap_or_default())
    }

    /// Unknown ids yield an empty history.
    pub async fn get_sustainability_log_history(
        &self,
        id: u64,
    ) -> Result<Vec<HistoryEntry>, LedgerError> {
        Ok(self
            .get_sustainability_log(id)
            .await?
            .map(|log| log.history().to_vec())
            .unwrap_or_default())
    }

    pub async fn owner(&self) -> Identity {
        self.state.lock().await.access.owner().clone()
    }

    pub async fn is_operator(&self, identity: &Identity) -> bool {
        self.state.lock().await.access.is_operator(identity)
    }

    pub async fn is_paused(&self) -> bool {
        self.state.lock().await.access.is_paused()
    }

    /// Id the next successful log creation will receive.
    pub async fn next_log_id(&self) -> u64 {
        self.state.lock().await.ids.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::events::ChannelSink;
    use crate::storage::memory::MemoryStorage;
    use chrono::Duration;

    fn owner() -> Identity {
        Identity::from("owner")
    }

    fn batch_input(id: &str) -> BatchInput {
        let start = model::now() - Duration::days(10);
        BatchInput {
            batch_id: id.to_string(),
            crop_name: "Rice".to_string(),
            start,
            end: start + Duration::days(90),
            farmer: "A".to_string(),
            expected_yield: 1000,
            land: "L1".to_string(),
            status: "Active".to_string(),
        }
    }

    async fn open(settings: LedgerSettings) -> (Ledger, tokio::sync::mpsc::Receiver<LedgerEvent>) {
        let (sink, rx) = ChannelSink::new(64);
        let ledger = Ledger::open(Arc::new(MemoryStorage::new()), settings, Arc::new(sink))
            .await
            .unwrap();
        (ledger, rx)
    }

    #[tokio::test]
    async fn test_open_requires_owner() {
        let result = Ledger::open(
            Arc::new(MemoryStorage::new()),
            LedgerSettings::new(""),
            Arc::new(crate::ledger::events::NullSink),
        )
        .await;
        assert!(matches!(
            result,
            Err(LedgerError::Access(AccessError::EmptyIdentity))
        ));
    }

    #[tokio::test]
    async fn test_create_batch_emits_event() {
        let (ledger, mut rx) = open(LedgerSettings::new("owner")).await;

        let id = ledger.create_batch(&owner(), batch_input("B1")).await.unwrap();
        assert_eq!(id, "B1");

        let event = rx.recv().await.unwrap();
        match event.kind {
            EventKind::BatchCreated { batch } => {
                assert_eq!(batch.batch_id, "B1");
                assert!(batch.history.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_mutation_emits_nothing() {
        let (ledger, mut rx) = open(LedgerSettings::new("owner")).await;
        let mut input = batch_input("B1");
        input.expected_yield = 0;

        let err = ledger.create_batch(&owner(), input).await.unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::InvalidYield));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lenient_batch_reuse_resets_history() {
        let mut settings = LedgerSettings::new("owner");
        settings.strict_existence = false;
        let (ledger, _rx) = open(settings).await;

        ledger.create_batch(&owner(), batch_input("B1")).await.unwrap();
        ledger.edit_batch(&owner(), batch_input("B1")).await.unwrap();
        assert_eq!(ledger.get_batch_history("B1").await.unwrap().len(), 1);

        let mut again = batch_input("B1");
        again.crop_name = "Barley".to_string();
        ledger.create_batch(&owner(), again).await.unwrap();

        let batch = ledger.get_batch("B1").await.unwrap().unwrap();
        assert_eq!(batch.crop_name, "Barley");
        assert!(batch.history.is_empty());
    }

    #[tokio::test]
    async fn test_access_changes_are_persisted_in_meta() {
        let storage = Arc::new(MemoryStorage::new());
        let ledger = Ledger::open(
            storage.clone(),
            LedgerSettings::new("owner"),
            Arc::new(crate::ledger::events::NullSink),
        )
        .await
        .unwrap();

        ledger
            .set_operator(&owner(), Identity::from("op"), true)
            .await
            .unwrap();
        ledger.pause(&Identity::from("op")).await.unwrap();

        let meta = storage.load_meta().await.unwrap().unwrap();
        assert!(meta.paused);
        assert!(meta.operators.contains(&Identity::from("op")));
        assert_eq!(meta.next_log_id, 0);
    }
}
