//! reqwest-backed implementation of the CRM API.

use std::path::Path;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde_json::json;

use crate::models::{CallLog, CallRecording, Lead, LeadNote};
use crate::util::{compact_text, is_http_url};

use super::{
    ApiError, ApiResult, CallSyncSummary, RemoteApi, RemoteLead, RemoteLeadStatus, RemoteNote,
    UploadGrant,
};

/// Ceiling on any single request; recording uploads are the slowest and
/// ride mobile uplinks.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the CRM API, authenticated with a bearer token.
#[derive(Clone)]
pub struct HttpRemoteClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpRemoteClient {
    /// Build a client against `base_url`, which must be an http(s) URL.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(ApiError::InvalidPayload(
                "API token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            token,
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .connect_timeout(CONNECT_TIMEOUT)
                .build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn check(response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status,
                message: compact_text(&body),
            });
        }
        Ok(response)
    }

    async fn delete(&self, path: &str) -> ApiResult<()> {
        let response = self
            .client
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;

        // already gone on the server counts as deleted
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }
}

impl RemoteApi for HttpRemoteClient {
    async fn save_lead(&self, lead: &Lead) -> ApiResult<RemoteLead> {
        let body = json!({
            "name": lead.name,
            "phone": lead.phone,
            "email": lead.email,
            "education": lead.education,
            "budget": lead.budget,
            "status_id": lead.status_id,
            "priority": lead.priority,
            "assigned_to": lead.assigned_to,
            "branch_id": lead.branch_id,
            "next_follow_up_at": lead.next_follow_up_at,
            "reminder_note": lead.reminder_note,
            "updated_at": lead.updated_at,
        });

        // locally created leads have no server identity yet; the local id
        // travels as client_ref so retried creates stay idempotent
        let request = if crate::models::is_local_id(&lead.id) {
            let mut body = body;
            body["client_ref"] = json!(lead.id);
            self.client.post(self.url("v1/leads")).json(&body)
        } else {
            self.client
                .put(self.url(&format!("v1/leads/{}", urlencoding::encode(&lead.id))))
                .json(&body)
        };

        let response = request.bearer_auth(&self.token).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_lead(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("v1/leads/{}", urlencoding::encode(id)))
            .await
    }

    async fn list_leads(&self, updated_since: Option<i64>) -> ApiResult<Vec<RemoteLead>> {
        let mut request = self.client.get(self.url("v1/leads"));
        if let Some(since) = updated_since {
            request = request.query(&[("updated_since", since)]);
        }
        let response = request.bearer_auth(&self.token).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn list_lead_statuses(&self) -> ApiResult<Vec<RemoteLeadStatus>> {
        let response = self
            .client
            .get(self.url("v1/lead-statuses"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn save_note(&self, note: &LeadNote) -> ApiResult<RemoteNote> {
        let body = json!({
            "lead_id": note.lead_id,
            "content": note.content,
            "note_type": note.note_type,
            "created_by": note.created_by,
            "updated_at": note.updated_at,
        });

        let request = if crate::models::is_local_id(&note.id) {
            let mut body = body;
            body["client_ref"] = json!(note.id);
            self.client.post(self.url("v1/notes")).json(&body)
        } else {
            self.client
                .put(self.url(&format!("v1/notes/{}", urlencoding::encode(&note.id))))
                .json(&body)
        };

        let response = request.bearer_auth(&self.token).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_note(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("v1/notes/{}", urlencoding::encode(id)))
            .await
    }

    async fn push_call_logs(&self, logs: &[CallLog]) -> ApiResult<CallSyncSummary> {
        let items: Vec<_> = logs
            .iter()
            .map(|log| {
                json!({
                    "id": log.id,
                    "phone_number": log.phone_number,
                    "call_type": log.call_type.as_str(),
                    "duration_secs": log.duration_secs,
                    "call_at": log.call_at,
                    "device_call_id": log.device_call_id,
                    "lead_id": log.lead_id,
                    "notes": log.notes,
                })
            })
            .collect();

        let response = self
            .client
            .post(self.url("v1/calls/sync"))
            .bearer_auth(&self.token)
            .json(&json!({ "calls": items }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn request_upload(
        &self,
        recording: &CallRecording,
        call: &CallLog,
    ) -> ApiResult<UploadGrant> {
        let response = self
            .client
            .post(self.url("v1/recordings/uploads"))
            .bearer_auth(&self.token)
            .json(&json!({
                "recording_id": recording.id,
                "call_log_id": call.id,
                "device_call_id": call.device_call_id,
                "file_name": recording.original_file_name,
                "file_size": recording.compressed_file_size.or(recording.original_file_size),
                "format": recording.format,
                "duration_secs": recording.duration_secs,
            }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn upload_file(
        &self,
        grant: &UploadGrant,
        path: &Path,
        content_type: &str,
    ) -> ApiResult<()> {
        if !is_http_url(&grant.upload_url) {
            return Err(ApiError::InvalidPayload(format!(
                "upload_url is not an http(s) URL: {}",
                compact_text(&grant.upload_url)
            )));
        }

        let bytes = tokio::fs::read(path).await.map_err(|error| {
            ApiError::InvalidPayload(format!("cannot read {}: {error}", path.display()))
        })?;

        // presigned PUT: the URL carries its own auth, no bearer token
        let response = self
            .client
            .put(&grant.upload_url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn confirm_upload(
        &self,
        grant: &UploadGrant,
        recording: &CallRecording,
    ) -> ApiResult<Option<String>> {
        let size = recording
            .compressed_file_size
            .or(recording.original_file_size);
        let response = self
            .client
            .post(self.url(&format!(
                "v1/recordings/{}/confirm",
                urlencoding::encode(&grant.recording_id)
            )))
            .bearer_auth(&self.token)
            .json(&json!({
                "storage_key": grant.storage_key,
                "file_size": size,
                "duration_secs": recording.duration_secs,
                "format": recording.format,
                "bitrate_kbps": bitrate_kbps(size, recording.duration_secs),
            }))
            .send()
            .await?;

        #[derive(serde::Deserialize)]
        struct Confirmed {
            #[serde(default)]
            storage_url: Option<String>,
        }
        let confirmed: Confirmed = Self::check(response).await?.json().await?;
        Ok(confirmed.storage_url)
    }

    async fn stream_url(&self, recording_id: &str) -> ApiResult<String> {
        let response = self
            .client
            .get(self.url(&format!(
                "v1/recordings/{}/stream-url",
                urlencoding::encode(recording_id)
            )))
            .bearer_auth(&self.token)
            .send()
            .await?;

        #[derive(serde::Deserialize)]
        struct StreamUrl {
            url: String,
        }
        let payload: StreamUrl = Self::check(response).await?.json().await?;
        if !is_http_url(&payload.url) {
            return Err(ApiError::InvalidPayload(
                "stream url is not an http(s) URL".to_string(),
            ));
        }
        Ok(payload.url)
    }
}

/// Average bitrate of the final artifact, when both inputs are known.
fn bitrate_kbps(size_bytes: Option<i64>, duration_secs: Option<i64>) -> Option<i64> {
    match (size_bytes, duration_secs) {
        (Some(size), Some(duration)) if size > 0 && duration > 0 => {
            Some(size * 8 / duration / 1000)
        }
        _ => None,
    }
}

fn normalize_base_url(base_url: String) -> ApiResult<String> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    if !is_http_url(&base_url) {
        return Err(ApiError::InvalidPayload(format!(
            "API base URL must start with http:// or https://, got: {}",
            compact_text(&base_url)
        )));
    }
    Ok(base_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_base_url_normalized() {
        let client = HttpRemoteClient::new(" https://api.example.com/ ", "tok").unwrap();
        assert_eq!(client.url("v1/leads"), "https://api.example.com/v1/leads");
        assert_eq!(client.url("/v1/leads"), "https://api.example.com/v1/leads");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(HttpRemoteClient::new("api.example.com", "tok").is_err());
    }

    #[test]
    fn test_rejects_empty_token() {
        assert!(HttpRemoteClient::new("https://api.example.com", "  ").is_err());
    }

    #[test]
    fn test_bitrate_needs_both_inputs() {
        assert_eq!(bitrate_kbps(Some(240_000), Some(60)), Some(32));
        assert_eq!(bitrate_kbps(Some(240_000), None), None);
        assert_eq!(bitrate_kbps(None, Some(60)), None);
        assert_eq!(bitrate_kbps(Some(0), Some(60)), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = HttpRemoteClient::new("https://api.example.com", "secret").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
