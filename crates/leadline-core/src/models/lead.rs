//! Lead model and per-row sync status

use serde::{Deserialize, Serialize};

use super::new_local_id;

/// Per-row marker telling the sync engine what it owes the server.
///
/// A row with `Synced` has no pending local mutation; any other value means
/// the next sync pass must push it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Row agrees with the server
    Synced,
    /// Row was created locally and never pushed
    Created,
    /// Row was modified locally since the last push
    Updated,
    /// Row was soft-deleted locally; server delete is pending
    Deleted,
}

impl SyncStatus {
    /// Stored integer representation (stable, part of the schema).
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Synced => 0,
            Self::Created => 1,
            Self::Updated => 2,
            Self::Deleted => 3,
        }
    }

    /// Parse the stored integer representation.
    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Synced),
            1 => Some(Self::Created),
            2 => Some(Self::Updated),
            3 => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether the sync engine owes the server a push for this row.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        !matches!(self, Self::Synced)
    }
}

/// A sales lead.
///
/// Identity starts as a `local_*` id and is swapped for the server's
/// canonical id after the first successful push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub education: Option<String>,
    pub budget: Option<f64>,
    /// Reference into the server-controlled `lead_statuses` table
    pub status_id: Option<String>,
    pub priority: i64,
    pub assigned_to: Option<String>,
    pub branch_id: Option<String>,
    /// Next follow-up reminder (Unix ms)
    pub next_follow_up_at: Option<i64>,
    pub reminder_note: Option<String>,
    pub total_calls: i64,
    pub total_notes: i64,
    pub sync_status: SyncStatus,
    /// When this row last agreed with the server (Unix ms)
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Soft-delete marker; set rows are excluded from default listings
    pub deleted_at: Option<i64>,
}

impl Lead {
    /// Create a new locally-owned lead pending its first push.
    #[must_use]
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: new_local_id(),
            name: name.into(),
            phone: phone.into(),
            email: None,
            education: None,
            budget: None,
            status_id: None,
            priority: 0,
            assigned_to: None,
            branch_id: None,
            next_follow_up_at: None,
            reminder_note: None,
            total_calls: 0,
            total_notes: 0,
            sync_status: SyncStatus::Created,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether this row still carries a device-local identity.
    #[must_use]
    pub fn has_local_id(&self) -> bool {
        super::is_local_id(&self.id)
    }

    /// Whether the row is soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_roundtrips_through_i64() {
        for status in [
            SyncStatus::Synced,
            SyncStatus::Created,
            SyncStatus::Updated,
            SyncStatus::Deleted,
        ] {
            assert_eq!(SyncStatus::from_i64(status.as_i64()), Some(status));
        }
        assert_eq!(SyncStatus::from_i64(42), None);
    }

    #[test]
    fn only_synced_is_not_pending() {
        assert!(!SyncStatus::Synced.is_pending());
        assert!(SyncStatus::Created.is_pending());
        assert!(SyncStatus::Updated.is_pending());
        assert!(SyncStatus::Deleted.is_pending());
    }

    #[test]
    fn new_lead_starts_created_with_local_id() {
        let lead = Lead::new("Asha", "+91 98765 43210");
        assert!(lead.has_local_id());
        assert_eq!(lead.sync_status, SyncStatus::Created);
        assert!(!lead.is_deleted());
        assert_eq!(lead.created_at, lead.updated_at);
    }
}
