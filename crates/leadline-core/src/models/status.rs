//! Lead status reference model

use serde::{Deserialize, Serialize};

/// Server-controlled lead status (e.g. "New", "Interested", "Closed").
///
/// The local table is a cache: each successful pull replaces it wholesale,
/// so these rows never carry a sync status of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStatus {
    pub id: String,
    pub name: String,
    /// Display color as `#rrggbb`
    pub color: Option<String>,
    pub sort_order: i64,
    pub is_default: bool,
    pub is_active: bool,
}
