//! Call-recording pipeline: Find, Compress, Upload.
//!
//! Each stage parks the recording back at `pending` after persisting its
//! result, so a pipeline interrupted at any point resumes from the last
//! completed stage. Stage failures land the recording in `failed`, which
//! only an explicit retry leaves.

pub mod compress;
pub mod find;
pub mod upload;

use std::path::PathBuf;

use crate::db::{CallRepository, Database};
use crate::error::{Error, Result};
use crate::models::{CallLog, CallRecording, RecordingStatus};
use crate::remote::RemoteApi;

pub use compress::{compress_recording, CompressedFile};
pub use find::{find_recording, FoundFile};
pub use upload::{content_type_for, upload_recording};

/// Where the pipeline looks for recorder output and keeps its artifacts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Vendor call-recorder output directories, checked first.
    pub recorder_dirs: Vec<PathBuf>,
    /// General media directories, the fallback search space.
    pub media_dirs: Vec<PathBuf>,
    /// Scratch directory for compressed artifacts awaiting upload.
    pub scratch_dir: PathBuf,
}

/// Orchestrator running the Find, Compress and Upload stages for one call.
pub struct RecordingPipeline<'a, R: RemoteApi> {
    db: &'a Database,
    remote: &'a R,
    config: PipelineConfig,
}

impl<'a, R: RemoteApi> RecordingPipeline<'a, R> {
    pub const fn new(db: &'a Database, remote: &'a R, config: PipelineConfig) -> Self {
        Self { db, remote, config }
    }

    fn calls(&self) -> CallRepository<'_> {
        CallRepository::new(self.db.connection(), self.db.changes())
    }

    /// Run the chain for a call log until the recording is uploaded or a
    /// stage fails.
    ///
    /// Resumes from the last completed stage; a `failed` recording is not
    /// re-run here, that takes an explicit retry reset first.
    pub async fn run(&self, call_log_id: &str) -> Result<CallRecording> {
        let calls = self.calls();
        let call = calls
            .get_log(call_log_id)
            .await?
            .ok_or_else(|| Error::NotFound(call_log_id.to_string()))?;

        let mut recording = calls.recording_for_call(call_log_id).await?;
        match recording.status {
            RecordingStatus::Uploaded => return Ok(recording),
            RecordingStatus::Failed => {
                return Err(Error::Pipeline(format!(
                    "recording {} failed previously; retry it explicitly",
                    recording.id
                )));
            }
            RecordingStatus::Pending => {}
            _ => {
                // left in-flight by an interrupted run
                calls.recover_in_flight(&recording.id).await?;
                recording = calls
                    .get_recording(&recording.id)
                    .await?
                    .ok_or_else(|| Error::NotFound(recording.id.clone()))?;
            }
        }

        if recording.local_file_path.is_none() {
            self.stage(&recording.id, self.run_find(&call, &recording))
                .await?;
            recording = self.reload(&recording.id).await?;
        }

        if recording.compressed_file_size.is_none() {
            self.stage(&recording.id, self.run_compress(&call, &recording))
                .await?;
            recording = self.reload(&recording.id).await?;
        }

        self.stage(
            &recording.id,
            upload_recording(self.remote, &self.calls(), &recording, &call),
        )
        .await?;
        self.reload(&recording.id).await
    }

    /// Run a stage; on error, record the failure on the row before
    /// propagating.
    async fn stage<F>(&self, recording_id: &str, fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        match fut.await {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::warn!(recording_id, %error, "pipeline stage failed");
                self.calls()
                    .mark_recording_failed(recording_id, &error.to_string())
                    .await
                    .ok();
                Err(error)
            }
        }
    }

    async fn run_find(&self, call: &CallLog, recording: &CallRecording) -> Result<()> {
        let calls = self.calls();
        calls
            .transition_recording(&recording.id, RecordingStatus::Pending, RecordingStatus::Finding)
            .await?;

        let found = find_recording(call, &self.config.recorder_dirs, &self.config.media_dirs)?
            .ok_or_else(|| {
                Error::Pipeline(format!(
                    "no recording file matched call {} ({})",
                    call.id, call.phone_number
                ))
            })?;

        calls
            .complete_find(
                &recording.id,
                &found.path.to_string_lossy(),
                &found.file_name,
                found.size,
                &found.format,
            )
            .await
    }

    async fn run_compress(&self, call: &CallLog, recording: &CallRecording) -> Result<()> {
        let calls = self.calls();
        let input = recording
            .local_file_path
            .clone()
            .ok_or_else(|| Error::Pipeline(format!("recording {} has no source file", recording.id)))?;
        let format = recording.format.clone().unwrap_or_else(|| "mp3".to_string());

        calls
            .transition_recording(
                &recording.id,
                RecordingStatus::Pending,
                RecordingStatus::Compressing,
            )
            .await?;

        let recording_id = recording.id.clone();
        let scratch_dir = self.config.scratch_dir.clone();
        let compressed = tokio::task::spawn_blocking(move || {
            compress_recording(&recording_id, PathBuf::from(input).as_path(), &format, &scratch_dir)
        })
        .await
        .map_err(|error| Error::Pipeline(format!("compress task panicked: {error}")))??;

        // pass-through formats carry no decoded duration; the call log's is
        // the best available figure
        let duration = compressed.duration_secs.unwrap_or(call.duration_secs);
        calls
            .complete_compress(
                &recording.id,
                &compressed.path.to_string_lossy(),
                compressed.size,
                duration,
                &compressed.format,
            )
            .await
    }

    async fn reload(&self, recording_id: &str) -> Result<CallRecording> {
        self.calls()
            .get_recording(recording_id)
            .await?
            .ok_or_else(|| Error::NotFound(recording_id.to_string()))
    }
}
