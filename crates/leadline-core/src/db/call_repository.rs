//! Call log and call recording repository implementation

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{CallLog, CallRecording, CallSyncState, CallType, RecordingStatus};
use crate::util::phone_tail;

use super::{ChangeFeed, ChangeKind, Entity};

const CALL_COLUMNS: &str = "id, phone_number, call_type, duration_secs, call_at, \
     device_call_id, lead_id, notes, sync_state, created_at";

const RECORDING_COLUMNS: &str = "id, call_log_id, local_file_path, original_file_name, \
     original_file_size, compressed_file_size, duration_secs, format, storage_key, storage_url, \
     status, upload_progress, retry_count, last_error, created_at, updated_at";

/// libSQL repository for call logs and their recordings.
pub struct CallRepository<'a> {
    conn: &'a Connection,
    changes: &'a ChangeFeed,
}

impl<'a> CallRepository<'a> {
    /// Create a new repository over the given connection and change feed.
    pub const fn new(conn: &'a Connection, changes: &'a ChangeFeed) -> Self {
        Self { conn, changes }
    }

    // --- call logs ----------------------------------------------------------

    /// Ingest an OS call event: dedupe on `device_call_id`, match a lead by
    /// phone tail, insert, and bump the matched lead's call counter.
    ///
    /// Returns the stored row; on a duplicate event that is the existing row.
    pub async fn ingest_event(&self, mut log: CallLog) -> Result<CallLog> {
        if let Some(existing) = self.get_log_by_device_id(&log.device_call_id).await? {
            return Ok(existing);
        }

        if log.lead_id.is_none() {
            log.lead_id = self.match_lead_id(&log.phone_number).await?;
        }

        self.conn
            .execute(
                "INSERT INTO call_logs (id, phone_number, call_type, duration_secs, call_at,
                    device_call_id, lead_id, notes, sync_state, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    log.id.clone(),
                    log.phone_number.clone(),
                    log.call_type.as_str(),
                    log.duration_secs,
                    log.call_at,
                    log.device_call_id.clone(),
                    log.lead_id.clone(),
                    log.notes.clone(),
                    log.sync_state.as_i64(),
                    log.created_at,
                ],
            )
            .await?;

        if let Some(lead_id) = &log.lead_id {
            self.conn
                .execute(
                    "UPDATE leads SET total_calls = total_calls + 1 WHERE id = ?",
                    [lead_id.clone()],
                )
                .await?;
        }

        self.changes
            .publish(Entity::CallLog, log.id.clone(), ChangeKind::Inserted);
        Ok(log)
    }

    async fn match_lead_id(&self, phone: &str) -> Result<Option<String>> {
        let tail = phone_tail(phone, 10);
        if tail.is_empty() {
            return Ok(None);
        }
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM leads
                 WHERE deleted_at IS NULL AND phone_tail = ?
                 ORDER BY updated_at DESC LIMIT 1",
                [tail],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Fetch a call log by id.
    pub async fn get_log(&self, id: &str) -> Result<Option<CallLog>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CALL_COLUMNS} FROM call_logs WHERE id = ?"),
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(parse_call(&row)?)),
            None => Ok(None),
        }
    }

    /// Fetch a call log by the OS-side call identity.
    pub async fn get_log_by_device_id(&self, device_call_id: &str) -> Result<Option<CallLog>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CALL_COLUMNS} FROM call_logs WHERE device_call_id = ?"),
                [device_call_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(parse_call(&row)?)),
            None => Ok(None),
        }
    }

    /// List call logs, newest first.
    pub async fn list_logs(&self, limit: usize, offset: usize) -> Result<Vec<CallLog>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CALL_COLUMNS} FROM call_logs
                     ORDER BY call_at DESC LIMIT ? OFFSET ?"
                ),
                params![limit as i64, offset as i64],
            )
            .await?;
        collect_calls(&mut rows).await
    }

    /// List call logs inside `[from, to)` (Unix ms), newest first.
    pub async fn list_logs_between(&self, from: i64, to: i64) -> Result<Vec<CallLog>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CALL_COLUMNS} FROM call_logs
                     WHERE call_at >= ? AND call_at < ?
                     ORDER BY call_at DESC"
                ),
                params![from, to],
            )
            .await?;
        collect_calls(&mut rows).await
    }

    /// List call logs still owing a server push, oldest first.
    pub async fn list_pending_logs(&self) -> Result<Vec<CallLog>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CALL_COLUMNS} FROM call_logs
                     WHERE sync_state = ?
                     ORDER BY call_at ASC"
                ),
                [CallSyncState::Pending.as_i64()],
            )
            .await?;
        collect_calls(&mut rows).await
    }

    /// Record the outcome of a call-log push.
    pub async fn set_log_sync_state(&self, id: &str, state: CallSyncState) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE call_logs SET sync_state = ? WHERE id = ?",
                params![state.as_i64(), id],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.changes
            .publish(Entity::CallLog, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Remove a call log; its recording goes with it (cascade).
    pub async fn delete_log(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM call_logs WHERE id = ?", [id])
            .await?;
        self.changes
            .publish(Entity::CallLog, id.to_string(), ChangeKind::Deleted);
        Ok(())
    }

    // --- recordings ---------------------------------------------------------

    /// Fetch or create the recording row for a call log.
    pub async fn recording_for_call(&self, call_log_id: &str) -> Result<CallRecording> {
        if let Some(existing) = self.get_recording_for_call(call_log_id).await? {
            return Ok(existing);
        }

        let recording = CallRecording::new(call_log_id);
        self.conn
            .execute(
                "INSERT INTO call_recordings (id, call_log_id, status, upload_progress,
                    retry_count, created_at, updated_at)
                 VALUES (?, ?, ?, 0, 0, ?, ?)
                 ON CONFLICT(call_log_id) DO NOTHING",
                params![
                    recording.id.clone(),
                    call_log_id,
                    recording.status.as_str(),
                    recording.created_at,
                    recording.updated_at,
                ],
            )
            .await?;
        self.changes.publish(
            Entity::CallRecording,
            recording.id.clone(),
            ChangeKind::Inserted,
        );

        // re-read: a concurrent creator may have won the ON CONFLICT race
        self.get_recording_for_call(call_log_id)
            .await?
            .ok_or_else(|| Error::NotFound(call_log_id.to_string()))
    }

    /// Fetch a recording by id.
    pub async fn get_recording(&self, id: &str) -> Result<Option<CallRecording>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RECORDING_COLUMNS} FROM call_recordings WHERE id = ?"),
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(parse_recording(&row)?)),
            None => Ok(None),
        }
    }

    /// Fetch the recording owned by a call log.
    pub async fn get_recording_for_call(&self, call_log_id: &str) -> Result<Option<CallRecording>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RECORDING_COLUMNS} FROM call_recordings WHERE call_log_id = ?"),
                [call_log_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(parse_recording(&row)?)),
            None => Ok(None),
        }
    }

    /// List recordings in a given state, oldest first.
    pub async fn list_recordings_by_status(
        &self,
        status: RecordingStatus,
    ) -> Result<Vec<CallRecording>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {RECORDING_COLUMNS} FROM call_recordings
                     WHERE status = ? ORDER BY updated_at ASC"
                ),
                [status.as_str()],
            )
            .await?;
        let mut recordings = Vec::new();
        while let Some(row) = rows.next().await? {
            recordings.push(parse_recording(&row)?);
        }
        Ok(recordings)
    }

    /// Move a recording between states, enforcing the legality table.
    ///
    /// The UPDATE is guarded on the expected current state so two writers
    /// cannot both claim the same transition.
    pub async fn transition_recording(
        &self,
        id: &str,
        from: RecordingStatus,
        to: RecordingStatus,
    ) -> Result<()> {
        if !from.can_transition(to) {
            return Err(Error::IllegalTransition { from, to });
        }
        let rows = self
            .conn
            .execute(
                "UPDATE call_recordings SET status = ?, updated_at = ?
                 WHERE id = ? AND status = ?",
                params![
                    to.as_str(),
                    chrono::Utc::now().timestamp_millis(),
                    id,
                    from.as_str(),
                ],
            )
            .await?;
        if rows == 0 {
            return Err(Error::Database(format!(
                "recording {id} was not in state {from}"
            )));
        }
        self.changes
            .publish(Entity::CallRecording, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Persist the Find stage result and return the row to `pending`.
    pub async fn complete_find(
        &self,
        id: &str,
        local_file_path: &str,
        original_file_name: &str,
        original_file_size: i64,
        format: &str,
    ) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE call_recordings SET local_file_path = ?, original_file_name = ?,
                    original_file_size = ?, format = ?, status = ?, updated_at = ?
                 WHERE id = ? AND status = ?",
                params![
                    local_file_path,
                    original_file_name,
                    original_file_size,
                    format,
                    RecordingStatus::Pending.as_str(),
                    chrono::Utc::now().timestamp_millis(),
                    id,
                    RecordingStatus::Finding.as_str(),
                ],
            )
            .await?;
        if rows == 0 {
            return Err(Error::Database(format!("recording {id} was not finding")));
        }
        self.changes
            .publish(Entity::CallRecording, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Persist the Compress stage result and return the row to `pending`.
    ///
    /// `local_file_path` moves to the scratch artifact the Upload stage
    /// will ship.
    pub async fn complete_compress(
        &self,
        id: &str,
        local_file_path: &str,
        compressed_file_size: i64,
        duration_secs: i64,
        format: &str,
    ) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE call_recordings SET local_file_path = ?, compressed_file_size = ?,
                    duration_secs = ?, format = ?, status = ?, updated_at = ?
                 WHERE id = ? AND status = ?",
                params![
                    local_file_path,
                    compressed_file_size,
                    duration_secs,
                    format,
                    RecordingStatus::Pending.as_str(),
                    chrono::Utc::now().timestamp_millis(),
                    id,
                    RecordingStatus::Compressing.as_str(),
                ],
            )
            .await?;
        if rows == 0 {
            return Err(Error::Database(format!(
                "recording {id} was not compressing"
            )));
        }
        self.changes
            .publish(Entity::CallRecording, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Record upload progress (0..=100).
    pub async fn set_upload_progress(&self, id: &str, progress: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE call_recordings SET upload_progress = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    progress.clamp(0, 100),
                    chrono::Utc::now().timestamp_millis(),
                    id,
                ],
            )
            .await?;
        self.changes
            .publish(Entity::CallRecording, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Persist the Upload stage result and finish the chain.
    pub async fn complete_upload(
        &self,
        id: &str,
        storage_key: &str,
        storage_url: Option<&str>,
    ) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE call_recordings SET storage_key = ?, storage_url = ?,
                    status = ?, upload_progress = 100, updated_at = ?
                 WHERE id = ? AND status = ?",
                params![
                    storage_key,
                    storage_url.map(ToString::to_string),
                    RecordingStatus::Uploaded.as_str(),
                    chrono::Utc::now().timestamp_millis(),
                    id,
                    RecordingStatus::Uploading.as_str(),
                ],
            )
            .await?;
        if rows == 0 {
            return Err(Error::Database(format!("recording {id} was not uploading")));
        }
        self.changes
            .publish(Entity::CallRecording, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Fail a recording from any non-terminal state: bump `retry_count`,
    /// record the error.
    pub async fn mark_recording_failed(&self, id: &str, error_message: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE call_recordings SET status = ?, retry_count = retry_count + 1,
                    last_error = ?, updated_at = ?
                 WHERE id = ? AND status NOT IN (?, ?)",
                params![
                    RecordingStatus::Failed.as_str(),
                    error_message,
                    chrono::Utc::now().timestamp_millis(),
                    id,
                    RecordingStatus::Uploaded.as_str(),
                    RecordingStatus::Failed.as_str(),
                ],
            )
            .await?;
        if rows == 0 {
            return Err(Error::Database(format!(
                "recording {id} is terminal, cannot fail"
            )));
        }
        self.changes
            .publish(Entity::CallRecording, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Explicit external retry trigger: the only exit from `failed`.
    pub async fn reset_recording_for_retry(&self, id: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE call_recordings SET status = ?, updated_at = ?
                 WHERE id = ? AND status = ?",
                params![
                    RecordingStatus::Pending.as_str(),
                    chrono::Utc::now().timestamp_millis(),
                    id,
                    RecordingStatus::Failed.as_str(),
                ],
            )
            .await?;
        if rows == 0 {
            return Err(Error::Database(format!("recording {id} is not failed")));
        }
        self.changes
            .publish(Entity::CallRecording, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Restart recovery: a recording left in-flight by a crashed process is
    /// parked back at `pending` so the orchestrator can resume its chain.
    pub async fn recover_in_flight(&self, id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE call_recordings SET status = ?, updated_at = ?
                 WHERE id = ? AND status IN (?, ?, ?)",
                params![
                    RecordingStatus::Pending.as_str(),
                    chrono::Utc::now().timestamp_millis(),
                    id,
                    RecordingStatus::Finding.as_str(),
                    RecordingStatus::Compressing.as_str(),
                    RecordingStatus::Uploading.as_str(),
                ],
            )
            .await?;
        Ok(())
    }
}

async fn collect_calls(rows: &mut libsql::Rows) -> Result<Vec<CallLog>> {
    let mut calls = Vec::new();
    while let Some(row) = rows.next().await? {
        calls.push(parse_call(&row)?);
    }
    Ok(calls)
}

fn parse_call(row: &Row) -> Result<CallLog> {
    let call_type: String = row.get(2)?;
    let sync_state: i64 = row.get(8)?;
    Ok(CallLog {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        call_type: CallType::parse(&call_type)
            .ok_or_else(|| Error::Database(format!("invalid call_type {call_type}")))?,
        duration_secs: row.get(3)?,
        call_at: row.get(4)?,
        device_call_id: row.get(5)?,
        lead_id: row.get(6)?,
        notes: row.get(7)?,
        sync_state: CallSyncState::from_i64(sync_state)
            .ok_or_else(|| Error::Database(format!("invalid call sync_state {sync_state}")))?,
        created_at: row.get(9)?,
    })
}

fn parse_recording(row: &Row) -> Result<CallRecording> {
    let status: String = row.get(10)?;
    Ok(CallRecording {
        id: row.get(0)?,
        call_log_id: row.get(1)?,
        local_file_path: row.get(2)?,
        original_file_name: row.get(3)?,
        original_file_size: row.get(4)?,
        compressed_file_size: row.get(5)?,
        duration_secs: row.get(6)?,
        format: row.get(7)?,
        storage_key: row.get(8)?,
        storage_url: row.get(9)?,
        status: RecordingStatus::parse(&status)
            .ok_or_else(|| Error::Database(format!("invalid recording status {status}")))?,
        upload_progress: row.get(11)?,
        retry_count: row.get(12)?,
        last_error: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LeadRepository};
    use crate::models::Lead;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn event(device_id: &str) -> CallLog {
        CallLog::from_event("9876543210", CallType::Incoming, 42, 1_700_000_000_000, device_id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ingest_dedupes_on_device_call_id() {
        let db = setup().await;
        let repo = CallRepository::new(db.connection(), db.changes());

        let first = repo.ingest_event(event("dev-1")).await.unwrap();
        let second = repo.ingest_event(event("dev-1")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.list_logs(10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ingest_matches_lead_and_bumps_counter() {
        let db = setup().await;
        let leads = LeadRepository::new(db.connection(), db.changes());
        let lead = Lead::new("Asha", "+91 98765 43210");
        leads.insert(&lead).await.unwrap();

        let repo = CallRepository::new(db.connection(), db.changes());
        let log = repo.ingest_event(event("dev-1")).await.unwrap();
        assert_eq!(log.lead_id.as_deref(), Some(lead.id.as_str()));

        let fetched = leads.get(&lead.id).await.unwrap().unwrap();
        assert_eq!(fetched.total_calls, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lead_delete_nulls_call_reference() {
        let db = setup().await;
        let leads = LeadRepository::new(db.connection(), db.changes());
        let lead = Lead::new("Asha", "9876543210");
        leads.insert(&lead).await.unwrap();

        let repo = CallRepository::new(db.connection(), db.changes());
        let log = repo.ingest_event(event("dev-1")).await.unwrap();
        assert!(log.lead_id.is_some());

        leads.hard_delete(&lead.id).await.unwrap();
        let fetched = repo.get_log(&log.id).await.unwrap().unwrap();
        assert_eq!(fetched.lead_id, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recording_unique_per_call_and_cascade() {
        let db = setup().await;
        let repo = CallRepository::new(db.connection(), db.changes());
        let log = repo.ingest_event(event("dev-1")).await.unwrap();

        let a = repo.recording_for_call(&log.id).await.unwrap();
        let b = repo.recording_for_call(&log.id).await.unwrap();
        assert_eq!(a.id, b.id);

        repo.delete_log(&log.id).await.unwrap();
        assert!(repo.get_recording(&a.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transition_guard_rejects_illegal_moves() {
        let db = setup().await;
        let repo = CallRepository::new(db.connection(), db.changes());
        let log = repo.ingest_event(event("dev-1")).await.unwrap();
        let recording = repo.recording_for_call(&log.id).await.unwrap();

        // pending -> uploaded skips the chain
        let err = repo
            .transition_recording(&recording.id, RecordingStatus::Pending, RecordingStatus::Uploaded)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { .. }));

        // legal move works and the guard sees the new state
        repo.transition_recording(&recording.id, RecordingStatus::Pending, RecordingStatus::Finding)
            .await
            .unwrap();
        let fetched = repo.get_recording(&recording.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RecordingStatus::Finding);

        // stale expected-state is rejected
        assert!(repo
            .transition_recording(&recording.id, RecordingStatus::Pending, RecordingStatus::Finding)
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fail_increments_retry_and_blocks_terminal() {
        let db = setup().await;
        let repo = CallRepository::new(db.connection(), db.changes());
        let log = repo.ingest_event(event("dev-1")).await.unwrap();
        let recording = repo.recording_for_call(&log.id).await.unwrap();

        repo.mark_recording_failed(&recording.id, "no recorder dir")
            .await
            .unwrap();
        let fetched = repo.get_recording(&recording.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RecordingStatus::Failed);
        assert_eq!(fetched.retry_count, 1);
        assert_eq!(fetched.last_error.as_deref(), Some("no recorder dir"));

        // already failed: a second failure is rejected, retry resets it
        assert!(repo
            .mark_recording_failed(&recording.id, "again")
            .await
            .is_err());
        repo.reset_recording_for_retry(&recording.id).await.unwrap();
        let fetched = repo.get_recording(&recording.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RecordingStatus::Pending);
        assert_eq!(fetched.retry_count, 1);
    }
}
