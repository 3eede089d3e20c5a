use super::model::{ActivityLog, Batch, Identity, SustainabilityLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Notification emitted after every successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Unique per event, for deduplication by downstream indexers
    pub event_id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl LedgerEvent {
    pub fn new(at: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            at,
            kind,
        }
    }
}

/// Event payloads. Record events carry the full post-mutation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    BatchCreated { batch: Batch },
    BatchEdited { batch: Batch },
    BatchDeactivated { batch: Batch },
    ActivityLogCreated { log: ActivityLog },
    ActivityLogEdited { log: ActivityLog },
    SustainabilityLogCreated { log: SustainabilityLog },
    SustainabilityLogEdited { log: SustainabilityLog },
    OperatorUpdated { operator: Identity, enabled: bool },
    Paused { by: Identity },
    Unpaused { by: Identity },
    OwnershipTransferred { previous_owner: Identity, new_owner: Identity },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::BatchCreated { .. } => "batch_created",
            EventKind::BatchEdited { .. } => "batch_edited",
            EventKind::BatchDeactivated { .. } => "batch_deactivated",
            EventKind::ActivityLogCreated { .. } => "activity_log_created",
            EventKind::ActivityLogEdited { .. } => "activity_log_edited",
            EventKind::SustainabilityLogCreated { .. } => "sustainability_log_created",
            EventKind::SustainabilityLogEdited { .. } => "sustainability_log_edited",
            EventKind::OperatorUpdated { .. } => "operator_updated",
            EventKind::Paused { .. } => "paused",
            EventKind::Unpaused { .. } => "unpaused",
            EventKind::OwnershipTransferred { .. } => "ownership_transferred",
        }
    }
}

/// Receiver of ledger notifications.
///
/// Called from inside the ledger's write section, so implementations must not
/// block and must not call back into the ledger.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &LedgerEvent) {}
}

/// Writes each event as a structured tracing record.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LedgerEvent) {
        match serde_json::to_string(&event.kind) {
            Ok(payload) => tracing::info!(
                event = event.kind.name(),
                event_id = %event.event_id,
                at = %event.at,
                payload = %payload,
                "Ledger event"
            ),
            Err(e) => tracing::error!(
                event = event.kind.name(),
                event_id = %event.event_id,
                error = %e,
                "Failed to serialize ledger event"
            ),
        }
    }
}

/// Forwards events to a bounded channel. A full channel drops the event
/// instead of stalling the writer.
pub struct ChannelSink {
    tx: mpsc::Sender<LedgerEvent>,
}

impl ChannelSink {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<LedgerEvent>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &LedgerEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    event = dropped.kind.name(),
                    event_id = %dropped.event_id,
                    "Event channel full, dropping event"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Event channel closed, no subscriber");
            }
        }
    }
}

/// Delivers each event to several sinks in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &LedgerEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
