pub mod access;
pub mod events;
pub mod history;
pub mod ids;
pub mod model;
pub mod service;
pub mod validation;

pub use access::{AccessControl, AccessError, Operation, PauseScope, Role};
pub use events::{ChannelSink, EventKind, EventSink, FanoutSink, LedgerEvent, NullSink, TracingSink};
pub use history::{HistoryEntry, HistoryKind};
pub use model::{
    ActivityLog, ActivityLogEditInput, ActivityLogInput, Batch, BatchEditInput, BatchInput,
    Identity, LogDateTime, SustainabilityLog, SustainabilityLogEditInput, SustainabilityLogInput,
};
pub use service::{Ledger, LedgerError, LedgerSettings};
pub use validation::{Limits, ValidationError};
