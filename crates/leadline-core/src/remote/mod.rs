//! Remote CRM API client: lead/note/call sync endpoints plus the
//! presigned recording upload flow.

mod http;
mod types;

use std::future::Future;
use std::path::Path;

use thiserror::Error;

pub use http::HttpRemoteClient;
pub use types::{
    CallRejection, CallSyncSummary, RemoteLead, RemoteLeadStatus, RemoteNote, UploadGrant,
};

use crate::models::{CallLog, CallRecording, Lead, LeadNote};

/// Errors surfaced by the remote API layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("API rejected credentials")]
    Unauthorized,
    #[error("Invalid API payload: {0}")]
    InvalidPayload(String),
}

impl ApiError {
    /// Whether a retry with the same request could plausibly succeed.
    ///
    /// Transport failures, 429 and 5xx are retryable; auth and other 4xx
    /// responses are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::Api { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Self::Unauthorized | Self::InvalidPayload(_) => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Server-side CRM operations the sync engine and recording pipeline need.
///
/// Implemented over HTTP in production; tests substitute in-memory fakes.
/// Methods return `Send` futures so the scheduler can run them on spawned
/// tasks; `async fn` implementations satisfy that as long as they hold
/// nothing non-`Send` across an await.
pub trait RemoteApi {
    /// Create or update a lead. For a locally created lead the server
    /// assigns the canonical id, returned in the response.
    fn save_lead(&self, lead: &Lead) -> impl Future<Output = ApiResult<RemoteLead>> + Send;

    /// Delete a lead on the server.
    fn delete_lead(&self, id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// List leads changed since the given Unix-ms timestamp (all when
    /// `None`).
    fn list_leads(
        &self,
        updated_since: Option<i64>,
    ) -> impl Future<Output = ApiResult<Vec<RemoteLead>>> + Send;

    /// Fetch the full lead status reference table.
    fn list_lead_statuses(&self) -> impl Future<Output = ApiResult<Vec<RemoteLeadStatus>>> + Send;

    /// Create or update a note; returns the canonical server row.
    fn save_note(&self, note: &LeadNote) -> impl Future<Output = ApiResult<RemoteNote>> + Send;

    /// Delete a note on the server.
    fn delete_note(&self, id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// Push a batch of call logs; the server reports per-item outcomes.
    fn push_call_logs(
        &self,
        logs: &[CallLog],
    ) -> impl Future<Output = ApiResult<CallSyncSummary>> + Send;

    /// Ask the server for a presigned upload slot for a recording.
    fn request_upload(
        &self,
        recording: &CallRecording,
        call: &CallLog,
    ) -> impl Future<Output = ApiResult<UploadGrant>> + Send;

    /// PUT the file at `path` to the granted presigned URL.
    fn upload_file(
        &self,
        grant: &UploadGrant,
        path: &Path,
        content_type: &str,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Tell the server the presigned upload completed, reporting the final
    /// artifact metadata. Returns the public storage URL when the server
    /// issues one.
    fn confirm_upload(
        &self,
        grant: &UploadGrant,
        recording: &CallRecording,
    ) -> impl Future<Output = ApiResult<Option<String>>> + Send;

    /// Resolve a short-lived playback URL for an uploaded recording.
    fn stream_url(&self, recording_id: &str) -> impl Future<Output = ApiResult<String>> + Send;
}
