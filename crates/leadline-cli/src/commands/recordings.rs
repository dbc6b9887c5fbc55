use leadline_core::db::CallRepository;
use leadline_core::models::{CallRecording, RecordingStatus};
use leadline_core::pipeline::RecordingPipeline;
use leadline_core::remote::RemoteApi;

use crate::commands::common::{format_recording_lines, CliContext};
use crate::error::CliError;

pub async fn run_process(ctx: &CliContext, call_id: &str) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let remote = ctx.remote()?;

    let calls = CallRepository::new(db.connection(), db.changes());
    if calls.get_log(call_id).await?.is_none() {
        return Err(CliError::InvalidInput(format!(
            "no call log with id: {call_id}"
        )));
    }

    let config = ctx.config.pipeline_config(&ctx.data_dir());
    let pipeline = RecordingPipeline::new(&db, &remote, config);
    let recording = pipeline.run(call_id).await?;
    println!(
        "Recording {} uploaded (key: {})",
        recording.id,
        recording.storage_key.as_deref().unwrap_or("-")
    );
    Ok(())
}

pub async fn run_retry(ctx: &CliContext, call_id: &str) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let calls = CallRepository::new(db.connection(), db.changes());

    let recording = calls
        .get_recording_for_call(call_id)
        .await?
        .ok_or_else(|| CliError::InvalidInput(format!("no recording for call: {call_id}")))?;
    if recording.status == RecordingStatus::Failed {
        calls.reset_recording_for_retry(&recording.id).await?;
    }
    drop(db);

    run_process(ctx, call_id).await
}

pub async fn run_url(ctx: &CliContext, call_id: &str) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let calls = CallRepository::new(db.connection(), db.changes());

    let recording = calls
        .get_recording_for_call(call_id)
        .await?
        .ok_or_else(|| CliError::InvalidInput(format!("no recording for call: {call_id}")))?;
    if recording.status != RecordingStatus::Uploaded {
        return Err(CliError::InvalidInput(format!(
            "recording is {}, not uploaded yet",
            recording.status
        )));
    }

    let remote = ctx.remote()?;
    let url = remote.stream_url(&recording.id).await?;
    println!("{url}");
    Ok(())
}

pub async fn run_list(
    ctx: &CliContext,
    status: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let calls = CallRepository::new(db.connection(), db.changes());

    let rows: Vec<CallRecording> = match status {
        Some(value) => {
            let status = RecordingStatus::parse(value.trim()).ok_or_else(|| {
                CliError::InvalidInput(format!("unknown recording status: {value}"))
            })?;
            calls.list_recordings_by_status(status).await?
        }
        None => {
            let mut rows = Vec::new();
            for status in [
                RecordingStatus::Pending,
                RecordingStatus::Finding,
                RecordingStatus::Compressing,
                RecordingStatus::Uploading,
                RecordingStatus::Uploaded,
                RecordingStatus::Failed,
            ] {
                rows.extend(calls.list_recordings_by_status(status).await?);
            }
            rows
        }
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No recordings tracked.");
        return Ok(());
    }
    for line in format_recording_lines(&rows) {
        println!("{line}");
    }
    Ok(())
}
