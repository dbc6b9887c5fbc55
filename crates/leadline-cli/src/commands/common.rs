use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use leadline_core::config::{AppConfig, Profile};
use leadline_core::db::Database;
use leadline_core::models::{CallLog, CallRecording, Lead, LeadConflict, LeadNote, SyncStatus};
use leadline_core::remote::HttpRemoteClient;

use crate::auth::resolve_token;
use crate::error::CliError;

/// Everything a command needs to reach the store and the server.
pub struct CliContext {
    pub db_path: PathBuf,
    pub profile: Profile,
    pub config: AppConfig,
}

impl CliContext {
    pub fn build(
        db_path: Option<PathBuf>,
        profile: Option<&str>,
        config_path: Option<&Path>,
    ) -> Result<Self, CliError> {
        let mut config = load_config(config_path)?;
        if let Some(name) = profile {
            config.profile = name.parse()?;
        }
        let config = config.with_env()?;

        Ok(Self {
            db_path: resolve_db_path(db_path),
            profile: config.profile,
            config,
        })
    }

    pub async fn open_database(&self) -> Result<Database, CliError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Database::open(&self.db_path).await?)
    }

    pub fn remote(&self) -> Result<HttpRemoteClient, CliError> {
        let token = resolve_token(self.profile)?;
        Ok(HttpRemoteClient::new(self.config.api_base_url(), token)?)
    }

    /// Directory for pipeline scratch files, next to the database.
    pub fn data_dir(&self) -> PathBuf {
        self.db_path
            .parent()
            .map_or_else(default_data_dir, Path::to_path_buf)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("LEADLINE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(|| default_data_dir().join("leadline.db"))
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| panic!("Failed to resolve CLI data directory"))
        .join("leadline")
}

fn load_config(config_path: Option<&Path>) -> Result<AppConfig, CliError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => {
            let Some(dir) = dirs::config_dir() else {
                return Ok(AppConfig::default());
            };
            let path = dir.join("leadline").join("config.json");
            if !path.exists() {
                return Ok(AppConfig::default());
            }
            path
        }
    };
    let payload = std::fs::read_to_string(&path)?;
    Ok(AppConfig::from_json(&payload)?)
}

#[derive(Debug, Serialize)]
pub struct LeadListItem {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub priority: i64,
    pub total_calls: i64,
    pub total_notes: i64,
    pub sync_status: SyncStatus,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub lead_id: String,
    pub local_updated_at: i64,
    pub server_updated_at: i64,
    pub detected_at: i64,
    pub detected_at_iso: String,
}

pub fn lead_to_list_item(lead: &Lead) -> LeadListItem {
    let now_ms = Utc::now().timestamp_millis();
    LeadListItem {
        id: lead.id.clone(),
        name: lead.name.clone(),
        phone: lead.phone.clone(),
        email: lead.email.clone(),
        priority: lead.priority,
        total_calls: lead.total_calls,
        total_notes: lead.total_notes,
        sync_status: lead.sync_status,
        updated_at: lead.updated_at,
        relative_time: format_relative_time(lead.updated_at, now_ms),
    }
}

pub fn conflict_to_item(conflict: &LeadConflict) -> ConflictItem {
    ConflictItem {
        lead_id: conflict.lead_id.clone(),
        local_updated_at: conflict.local_updated_at,
        server_updated_at: conflict.server_updated_at,
        detected_at: conflict.detected_at,
        detected_at_iso: format_timestamp(conflict.detected_at),
    }
}

pub fn format_lead_lines(leads: &[Lead]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    leads
        .iter()
        .map(|lead| {
            let short_id = short_id(&lead.id);
            let marker = sync_marker(lead.sync_status);
            let relative_time = format_relative_time(lead.updated_at, now_ms);
            format!(
                "{short_id:<13}  {:<24}  {:<14}  {marker:<8}  {relative_time}",
                truncate(&lead.name, 24),
                lead.phone
            )
        })
        .collect()
}

pub fn format_note_lines(notes: &[LeadNote]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(&note.id);
            let marker = sync_marker(note.sync_status);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            format!(
                "{short_id:<13}  {:<48}  {marker:<8}  {relative_time}",
                truncate(&note.content, 48)
            )
        })
        .collect()
}

pub fn format_call_lines(calls: &[CallLog]) -> Vec<String> {
    calls
        .iter()
        .map(|call| {
            let lead = call.lead_id.as_deref().unwrap_or("-");
            format!(
                "{:<13}  {:<14}  {:<8}  {:>5}s  lead={}  {}",
                short_id(&call.id),
                call.phone_number,
                call.call_type.as_str(),
                call.duration_secs,
                short_id(lead),
                format_timestamp(call.call_at)
            )
        })
        .collect()
}

pub fn format_recording_lines(recordings: &[CallRecording]) -> Vec<String> {
    recordings
        .iter()
        .map(|recording| {
            let detail = match recording.status {
                leadline_core::RecordingStatus::Uploading => {
                    format!("{}%", recording.upload_progress)
                }
                leadline_core::RecordingStatus::Failed => recording
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
                _ => recording.storage_key.clone().unwrap_or_default(),
            };
            format!(
                "{:<13}  call={:<13}  {:<12}  retries={}  {}",
                short_id(&recording.id),
                short_id(&recording.call_log_id),
                recording.status.as_str(),
                recording.retry_count,
                truncate(&detail, 60)
            )
        })
        .collect()
}

pub fn format_conflict_lines(conflicts: &[LeadConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  lead={}  local={} server={}",
                format_timestamp(conflict.detected_at),
                conflict.lead_id,
                conflict.local_updated_at,
                conflict.server_updated_at
            )
        })
        .collect()
}

pub const fn sync_marker(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Synced => "synced",
        SyncStatus::Created => "new",
        SyncStatus::Updated => "edited",
        SyncStatus::Deleted => "deleted",
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Content from command arguments, falling back to piped stdin.
pub fn resolve_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }
    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }
    Err(CliError::InvalidInput(
        "note content must not be empty".to_string(),
    ))
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}
