//! Core data models shared by the store, sync engine, and pipeline.

mod call;
mod conflict;
mod lead;
mod note;
mod recording;
mod status;

pub use call::{CallLog, CallSyncState, CallType};
pub use conflict::LeadConflict;
pub use lead::{Lead, SyncStatus};
pub use note::LeadNote;
pub use recording::{CallRecording, RecordingStatus};
pub use status::LeadStatus;

use uuid::Uuid;

/// Prefix marking identities generated on-device before the server has
/// assigned a canonical id.
pub const LOCAL_ID_PREFIX: &str = "local_";

/// Generate a new device-local identity (UUID v7, time-sortable).
#[must_use]
pub fn new_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", Uuid::now_v7())
}

/// Check whether an identity was generated on-device and still awaits a
/// server-issued replacement.
#[must_use]
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_unique_and_prefixed() {
        let a = new_local_id();
        let b = new_local_id();
        assert_ne!(a, b);
        assert!(is_local_id(&a));
        assert!(!is_local_id("srv_123"));
    }
}
