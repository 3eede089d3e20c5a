use super::history::{Audited, HistoryEntry};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status value that marks a batch as deactivated.
pub const STATUS_CANCELLED: &str = "Cancelled";

/// Current time truncated to whole seconds. All ledger timestamps use this resolution.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Opaque caller identity (an account address, a username, a key fingerprint).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A tracked unit of crop production over a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub crop_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub farmer: String,
    pub expected_yield: u64,
    pub land: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Reserved for external indexers; never written by the ledger.
    #[serde(default)]
    pub last_indexed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Batch {
    pub fn create(input: BatchInput, at: DateTime<Utc>) -> Self {
        Self {
            batch_id: input.batch_id,
            crop_name: input.crop_name,
            start: input.start,
            end: input.end,
            farmer: input.farmer,
            expected_yield: input.expected_yield,
            land: input.land,
            status: input.status,
            created_at: at,
            updated_at: at,
            last_indexed_at: None,
            history: Vec::new(),
        }
    }

    /// Overwrites every mutable field. Identity, creation time and history are kept.
    pub fn apply_edit(&mut self, input: BatchEditInput, at: DateTime<Utc>) {
        self.crop_name = input.crop_name;
        self.start = input.start;
        self.end = input.end;
        self.farmer = input.farmer;
        self.expected_yield = input.expected_yield;
        self.land = input.land;
        self.status = input.status;
        self.updated_at = at;
    }

    pub fn deactivate(&mut self, at: DateTime<Utc>) {
        self.status = STATUS_CANCELLED.to_string();
        self.updated_at = at;
    }

    /// A batch exists once it carries a crop name.
    pub fn exists(&self) -> bool {
        !self.crop_name.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == STATUS_CANCELLED
    }
}

impl Audited for Batch {
    fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }
}

/// A point in time expressed as a calendar date plus hour and minute.
///
/// Field order matters: the derived ordering compares `date`, then `hour`,
/// then `minute`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogDateTime {
    pub date: DateTime<Utc>,
    pub hour: u8,
    pub minute: u8,
}

impl LogDateTime {
    pub fn new(date: DateTime<Utc>, hour: u8, minute: u8) -> Self {
        Self { date, hour, minute }
    }
}

/// A dated record of a discrete farming action tied to a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: u64,
    pub batch_id: String,
    pub activity_name: String,
    pub start: LogDateTime,
    pub end: LogDateTime,
    pub area_covered: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ActivityLog {
    pub fn create(id: u64, input: ActivityLogInput, at: DateTime<Utc>) -> Self {
        Self {
            id,
            batch_id: input.batch_id,
            activity_name: input.activity_name,
            start: input.start,
            end: input.end,
            area_covered: input.area_covered,
            created_at: at,
            updated_at: at,
            history: Vec::new(),
        }
    }

    /// Zero-valued record standing in for an id that was never created.
    pub fn zeroed(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn apply_edit(&mut self, input: ActivityLogEditInput, at: DateTime<Utc>) {
        self.activity_name = input.activity_name;
        self.start = input.start;
        self.end = input.end;
        self.area_covered = input.area_covered;
        self.updated_at = at;
    }
}

impl Audited for ActivityLog {
    fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }
}

/// A dated record of an environmental practice tied to a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SustainabilityLog {
    pub id: u64,
    pub batch_id: String,
    pub practice_name: String,
    pub implementation_date: DateTime<Utc>,
    pub impact_description: String,
    pub area_covered: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl SustainabilityLog {
    pub fn create(id: u64, input: SustainabilityLogInput, at: DateTime<Utc>) -> Self {
        Self {
            id,
            batch_id: input.batch_id,
            practice_name: input.practice_name,
            implementation_date: input.implementation_date,
            impact_description: input.impact_description,
            area_covered: input.area_covered,
            created_at: at,
            updated_at: at,
            history: Vec::new(),
        }
    }

    pub fn zeroed(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn apply_edit(&mut self, input: SustainabilityLogEditInput, at: DateTime<Utc>) {
        self.practice_name = input.practice_name;
        self.implementation_date = input.implementation_date;
        self.impact_description = input.impact_description;
        self.area_covered = input.area_covered;
        self.updated_at = at;
    }
}

impl Audited for SustainabilityLog {
    fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInput {
    pub batch_id: String,
    pub crop_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub farmer: String,
    pub expected_yield: u64,
    #[serde(default)]
    pub land: String,
    #[serde(default)]
    pub status: String,
}

/// Batch edits carry the full set of mutable fields, keyed by `batch_id`.
pub type BatchEditInput = BatchInput;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogInput {
    pub batch_id: String,
    pub activity_name: String,
    pub start: LogDateTime,
    pub end: LogDateTime,
    pub area_covered: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEditInput {
    pub id: u64,
    pub activity_name: String,
    pub start: LogDateTime,
    pub end: LogDateTime,
    pub area_covered: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SustainabilityLogInput {
    pub batch_id: String,
    pub practice_name: String,
    pub implementation_date: DateTime<Utc>,
    pub impact_description: String,
    pub area_covered: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SustainabilityLogEditInput {
    pub id: u64,
    pub practice_name: String,
    pub implementation_date: DateTime<Utc>,
    pub impact_description: String,
    pub area_covered: u64,
}
