//! Call recording model and its pipeline state machine

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline state persisted on the recording row.
///
/// `Pending` is the at-rest state between stages; each stage moves the row
/// into its in-flight state before doing work and back to `Pending` (or
/// forward to `Uploaded`) after persisting its result, so a restarted
/// process can resume at the right stage instead of replaying the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Pending,
    Finding,
    Compressing,
    Uploading,
    Uploaded,
    Failed,
}

impl RecordingStatus {
    /// Stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Finding => "finding",
            Self::Compressing => "compressing",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
        }
    }

    /// Parse the stored string representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "finding" => Some(Self::Finding),
            "compressing" => Some(Self::Compressing),
            "uploading" => Some(Self::Uploading),
            "uploaded" => Some(Self::Uploaded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether no further automatic transition may leave this state.
    ///
    /// `Failed` only leaves via an explicit external retry trigger
    /// (`CallRepository::reset_recording_for_retry`), never through the
    /// normal stage transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Uploaded | Self::Failed)
    }

    /// Legality table for automatic stage transitions.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        match self {
            Self::Pending => matches!(
                to,
                Self::Finding | Self::Compressing | Self::Uploading | Self::Failed
            ),
            Self::Finding | Self::Compressing => matches!(to, Self::Pending | Self::Failed),
            Self::Uploading => matches!(to, Self::Uploaded | Self::Failed),
            Self::Uploaded | Self::Failed => false,
        }
    }
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A voice-call recording tracked through find → compress → upload.
///
/// Exactly one recording exists per call log (UNIQUE constraint) and the row
/// is destroyed only via cascade when the call log is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecording {
    pub id: String,
    pub call_log_id: String,
    pub local_file_path: Option<String>,
    pub original_file_name: Option<String>,
    pub original_file_size: Option<i64>,
    pub compressed_file_size: Option<i64>,
    pub duration_secs: Option<i64>,
    /// Audio container/format label (e.g. "wav", "m4a", "mp3")
    pub format: Option<String>,
    pub storage_key: Option<String>,
    pub storage_url: Option<String>,
    pub status: RecordingStatus,
    /// 0..=100
    pub upload_progress: i64,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CallRecording {
    /// Create a fresh recording row for a call log, ready for the Find stage.
    #[must_use]
    pub fn new(call_log_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: Uuid::now_v7().to_string(),
            call_log_id: call_log_id.into(),
            local_file_path: None,
            original_file_name: None,
            original_file_size: None,
            compressed_file_size: None,
            duration_secs: None,
            format: None,
            storage_key: None,
            storage_url: None,
            status: RecordingStatus::Pending,
            upload_progress: 0,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_str() {
        for status in [
            RecordingStatus::Pending,
            RecordingStatus::Finding,
            RecordingStatus::Compressing,
            RecordingStatus::Uploading,
            RecordingStatus::Uploaded,
            RecordingStatus::Failed,
        ] {
            assert_eq!(RecordingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RecordingStatus::parse("queued"), None);
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        use RecordingStatus::{Compressing, Finding, Pending, Uploaded, Uploading};
        assert!(Pending.can_transition(Finding));
        assert!(Finding.can_transition(Pending));
        assert!(Pending.can_transition(Compressing));
        assert!(Compressing.can_transition(Pending));
        assert!(Pending.can_transition(Uploading));
        assert!(Uploading.can_transition(Uploaded));
    }

    #[test]
    fn failed_is_reachable_from_every_non_terminal_state() {
        use RecordingStatus::{Compressing, Failed, Finding, Pending, Uploading};
        for from in [Pending, Finding, Compressing, Uploading] {
            assert!(from.can_transition(Failed), "{from} -> failed");
        }
    }

    #[test]
    fn terminal_states_have_no_automatic_exit() {
        use RecordingStatus::{Failed, Pending, Uploaded};
        for to in [
            Pending,
            RecordingStatus::Finding,
            RecordingStatus::Compressing,
            RecordingStatus::Uploading,
            Uploaded,
            Failed,
        ] {
            assert!(!Uploaded.can_transition(to), "uploaded -> {to}");
            assert!(!Failed.can_transition(to), "failed -> {to}");
        }
    }

    #[test]
    fn backwards_and_skipping_transitions_are_illegal() {
        use RecordingStatus::{Compressing, Finding, Uploaded, Uploading};
        assert!(!Finding.can_transition(Compressing));
        assert!(!Compressing.can_transition(Uploading));
        assert!(!Finding.can_transition(Uploaded));
        assert!(!Uploading.can_transition(Finding));
    }
}
