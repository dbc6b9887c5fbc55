//! Lead conflict model

use serde::{Deserialize, Serialize};

/// A lead with both an un-pushed local mutation and a divergent server-side
/// change, awaiting explicit resolution.
///
/// The server snapshot is stored alongside the detection metadata so
/// "use server" can be resolved later without connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Lead involved in the conflict
    pub lead_id: String,
    /// Local row's `updated_at` when the conflict was observed
    pub local_updated_at: i64,
    /// Server row's `updated_at` that diverged
    pub server_updated_at: i64,
    /// JSON snapshot of the pulled server lead
    pub server_snapshot: String,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
}
