use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Edited,
    Deactivated,
}

impl HistoryKind {
    pub fn label(self) -> &'static str {
        match self {
            HistoryKind::Edited => "Edited",
            HistoryKind::Deactivated => "Deactivated",
        }
    }
}

/// One audit marker. Appended on every mutation after creation, never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryKind,
}

impl HistoryEntry {
    pub fn edited(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind: HistoryKind::Edited,
        }
    }

    pub fn deactivated(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind: HistoryKind::Deactivated,
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at: {}",
            self.kind.label(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Records that carry an append-only audit trail.
///
/// The trail is exposed read-only; the only way to change it is to append.
pub trait Audited {
    fn history(&self) -> &[HistoryEntry];

    fn push_history(&mut self, entry: HistoryEntry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_matches_marker_format() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        assert_eq!(HistoryEntry::edited(ts).to_string(), "Edited at: 2024-05-06T07:08:09Z");
        assert_eq!(
            HistoryEntry::deactivated(ts).to_string(),
            "Deactivated at: 2024-05-06T07:08:09Z"
        );
    }

    #[test]
    fn test_entry_serializes_kind_in_snake_case() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let json = serde_json::to_value(HistoryEntry::deactivated(ts)).unwrap();

        assert_eq!(json["kind"], "deactivated");
        assert_eq!(json["timestamp"], "2024-05-06T07:08:09Z");
    }
}
