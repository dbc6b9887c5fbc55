//! Call log model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction/outcome of an OS-reported call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Incoming,
    Outgoing,
    Missed,
}

impl CallType {
    /// Stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::Missed => "missed",
        }
    }

    /// Parse the stored string representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "incoming" => Some(Self::Incoming),
            "outgoing" => Some(Self::Outgoing),
            "missed" => Some(Self::Missed),
            _ => None,
        }
    }
}

/// Server reconciliation state of a call log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSyncState {
    Pending,
    Synced,
    Error,
}

impl CallSyncState {
    /// Stored integer representation.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Synced => 1,
            Self::Error => 2,
        }
    }

    /// Parse the stored integer representation.
    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Synced),
            2 => Some(Self::Error),
            _ => None,
        }
    }
}

/// A call reported by the OS telephony layer.
///
/// `device_call_id` is the OS-side identity and is UNIQUE in the store so a
/// re-delivered call event dedupes instead of inserting twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLog {
    pub id: String,
    pub phone_number: String,
    pub call_type: CallType,
    pub duration_secs: i64,
    /// When the call happened (Unix ms)
    pub call_at: i64,
    pub device_call_id: String,
    /// Matched lead, if any; set NULL when the lead is deleted
    pub lead_id: Option<String>,
    pub notes: Option<String>,
    pub sync_state: CallSyncState,
    pub created_at: i64,
}

impl CallLog {
    /// Build a call log row from a raw OS call event.
    #[must_use]
    pub fn from_event(
        phone_number: impl Into<String>,
        call_type: CallType,
        duration_secs: i64,
        call_at: i64,
        device_call_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            phone_number: phone_number.into(),
            call_type,
            duration_secs,
            call_at,
            device_call_id: device_call_id.into(),
            lead_id: None,
            notes: None,
            sync_state: CallSyncState::Pending,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_type_roundtrips() {
        for call_type in [CallType::Incoming, CallType::Outgoing, CallType::Missed] {
            assert_eq!(CallType::parse(call_type.as_str()), Some(call_type));
        }
        assert_eq!(CallType::parse("rejected"), None);
    }

    #[test]
    fn call_sync_state_roundtrips() {
        for state in [
            CallSyncState::Pending,
            CallSyncState::Synced,
            CallSyncState::Error,
        ] {
            assert_eq!(CallSyncState::from_i64(state.as_i64()), Some(state));
        }
    }

    #[test]
    fn from_event_starts_pending() {
        let log = CallLog::from_event("9876543210", CallType::Incoming, 42, 1_700_000_000_000, "dev-1");
        assert_eq!(log.sync_state, CallSyncState::Pending);
        assert_eq!(log.duration_secs, 42);
        assert!(log.lead_id.is_none());
    }
}
