//! Wire types for the CRM API.

use serde::{Deserialize, Serialize};

use crate::models::{Lead, LeadNote, LeadStatus, SyncStatus};

/// Lead as the server reports it.
///
/// Serializable both ways: conflict snapshots are stored as JSON and
/// re-parsed on resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLead {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub status_id: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub next_follow_up_at: Option<i64>,
    #[serde(default)]
    pub reminder_note: Option<String>,
    #[serde(default)]
    pub total_calls: Option<i64>,
    #[serde(default)]
    pub total_notes: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteLead {
    /// Materialize a local row that agrees with the server as of `synced_at`.
    ///
    /// Server-omitted counters fall back to the local values so a pull does
    /// not zero out activity recorded offline.
    #[must_use]
    pub fn into_synced_lead(self, local: Option<&Lead>, synced_at: i64) -> Lead {
        Lead {
            id: self.id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            education: self.education,
            budget: self.budget,
            status_id: self.status_id,
            priority: self.priority,
            assigned_to: self.assigned_to,
            branch_id: self.branch_id,
            next_follow_up_at: self.next_follow_up_at,
            reminder_note: self.reminder_note,
            total_calls: self
                .total_calls
                .unwrap_or_else(|| local.map_or(0, |l| l.total_calls)),
            total_notes: self
                .total_notes
                .unwrap_or_else(|| local.map_or(0, |l| l.total_notes)),
            sync_status: SyncStatus::Synced,
            last_synced_at: Some(synced_at),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: None,
        }
    }
}

/// Note as the server reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteNote {
    pub id: String,
    pub lead_id: String,
    pub content: String,
    #[serde(default)]
    pub note_type: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteNote {
    /// Materialize the canonical local row for an acknowledged note.
    #[must_use]
    pub fn into_synced_note(self) -> LeadNote {
        LeadNote {
            id: self.id,
            lead_id: self.lead_id,
            content: self.content,
            note_type: self.note_type,
            created_by: self.created_by,
            sync_status: SyncStatus::Synced,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: None,
        }
    }
}

/// Lead status reference row as the server reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteLeadStatus {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl From<RemoteLeadStatus> for LeadStatus {
    fn from(remote: RemoteLeadStatus) -> Self {
        Self {
            id: remote.id,
            name: remote.name,
            color: remote.color,
            sort_order: remote.sort_order,
            is_default: remote.is_default,
            is_active: remote.is_active,
        }
    }
}

/// Per-item outcome report for a call-log batch push.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallSyncSummary {
    #[serde(default)]
    pub accepted: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<CallRejection>,
    #[serde(default)]
    pub leads_matched: i64,
}

/// A call log the server refused, with its reason.
#[derive(Debug, Clone, Deserialize)]
pub struct CallRejection {
    pub id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Presigned upload slot issued by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadGrant {
    pub recording_id: String,
    pub upload_url: String,
    pub storage_key: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}
