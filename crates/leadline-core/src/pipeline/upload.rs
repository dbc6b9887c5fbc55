//! Upload stage: ship the compressed artifact through a presigned slot.

use std::path::Path;

use crate::db::CallRepository;
use crate::error::{Error, Result};
use crate::models::{CallLog, CallRecording, RecordingStatus};
use crate::remote::RemoteApi;

/// Map an audio container format to its upload content type.
#[must_use]
pub fn content_type_for(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "wav" => "audio/wav",
        "m4a" | "aac" => "audio/mp4",
        "amr" => "audio/amr",
        "ogg" | "opus" => "audio/ogg",
        "3gp" => "audio/3gpp",
        _ => "audio/mpeg",
    }
}

/// Run the upload chain for a recording that has a compressed artifact:
/// presign, direct PUT, server confirmation, then scratch cleanup.
pub async fn upload_recording<R: RemoteApi>(
    remote: &R,
    calls: &CallRepository<'_>,
    recording: &CallRecording,
    call: &CallLog,
) -> Result<()> {
    let path = recording
        .local_file_path
        .as_deref()
        .ok_or_else(|| Error::Pipeline(format!("recording {} has no artifact", recording.id)))?;
    let format = recording.format.as_deref().unwrap_or("mp3");

    calls
        .transition_recording(&recording.id, RecordingStatus::Pending, RecordingStatus::Uploading)
        .await?;
    calls.set_upload_progress(&recording.id, 0).await?;

    let grant = remote.request_upload(recording, call).await?;
    remote
        .upload_file(&grant, Path::new(path), content_type_for(format))
        .await?;
    let storage_url = remote.confirm_upload(&grant, recording).await?;

    calls
        .complete_upload(&recording.id, &grant.storage_key, storage_url.as_deref())
        .await?;

    // scratch artifact is no longer needed; removal is best-effort
    if let Err(error) = tokio::fs::remove_file(path).await {
        tracing::debug!(path, %error, "scratch artifact cleanup failed");
    }
    tracing::info!(
        recording_id = %recording.id,
        storage_key = %grant.storage_key,
        "recording uploaded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("WAV"), "audio/wav");
        assert_eq!(content_type_for("m4a"), "audio/mp4");
        assert_eq!(content_type_for("amr"), "audio/amr");
        assert_eq!(content_type_for("mp3"), "audio/mpeg");
        assert_eq!(content_type_for("unknown"), "audio/mpeg");
    }
}
