use std::time::{SystemTime, UNIX_EPOCH};

use leadline_core::db::CallRepository;
use leadline_core::models::{CallLog, CallType};

use crate::commands::common::{format_call_lines, CliContext};
use crate::error::CliError;

pub async fn run_log(
    ctx: &CliContext,
    phone: &str,
    call_type: CallType,
    duration_secs: i64,
    device_call_id: Option<String>,
    process: bool,
) -> Result<(), CliError> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(CliError::InvalidInput(
            "phone number must not be empty".to_string(),
        ));
    }
    if duration_secs < 0 {
        return Err(CliError::InvalidInput(
            "duration must not be negative".to_string(),
        ));
    }

    let db = ctx.open_database().await?;
    let calls = CallRepository::new(db.connection(), db.changes());

    let device_call_id = device_call_id.unwrap_or_else(generated_device_call_id);
    let call = calls
        .ingest_event(CallLog::from_event(
            phone,
            call_type,
            duration_secs,
            chrono::Utc::now().timestamp_millis(),
            device_call_id,
        ))
        .await?;

    match &call.lead_id {
        Some(lead_id) => println!("Logged call {} (matched lead {lead_id})", call.id),
        None => println!("Logged call {} (no matching lead)", call.id),
    }

    if process {
        crate::commands::recordings::run_process(ctx, &call.id).await?;
    }
    Ok(())
}

pub async fn run_list(ctx: &CliContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let calls = CallRepository::new(db.connection(), db.changes());
    let rows = calls.list_logs(limit, 0).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No calls logged.");
        return Ok(());
    }
    for line in format_call_lines(&rows) {
        println!("{line}");
    }
    Ok(())
}

/// Device identity for calls entered by hand; the OS feed supplies real ones.
fn generated_device_call_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    format!("cli-{}-{now}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_device_call_ids_are_unique() {
        assert_ne!(generated_device_call_id(), generated_device_call_id());
    }
}
