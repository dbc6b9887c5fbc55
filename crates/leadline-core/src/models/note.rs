//! Lead note model

use serde::{Deserialize, Serialize};

use super::{new_local_id, SyncStatus};

/// A free-form note attached to a lead.
///
/// Notes are cascade-deleted with their owning lead and carry the same
/// push/pull sync lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadNote {
    pub id: String,
    pub lead_id: String,
    pub content: String,
    /// Free-form category (e.g. "call", "visit", "followup")
    pub note_type: Option<String>,
    pub created_by: Option<String>,
    pub sync_status: SyncStatus,
    pub created_at: i64,
    pub updated_at: i64,
    /// Soft-delete marker
    pub deleted_at: Option<i64>,
}

impl LeadNote {
    /// Create a new locally-owned note pending its first push.
    #[must_use]
    pub fn new(lead_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: new_local_id(),
            lead_id: lead_id.into(),
            content: content.into(),
            note_type: None,
            created_by: None,
            sync_status: SyncStatus::Created,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_starts_created() {
        let note = LeadNote::new("srv_1", "asked for brochure");
        assert_eq!(note.sync_status, SyncStatus::Created);
        assert!(super::super::is_local_id(&note.id));
        assert_eq!(note.lead_id, "srv_1");
    }
}
