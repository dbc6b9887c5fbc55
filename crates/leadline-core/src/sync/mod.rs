//! Push/pull sync engine for leads, notes and call logs.
//!
//! A sync pass pushes local mutations first (oldest first, per-item
//! best-effort), then pulls server state. Pulled leads that collide with
//! unpushed local edits are parked in the conflict log instead of being
//! applied; resolution is an explicit user action.

use serde::Serialize;

use crate::db::{CallRepository, Database, LeadRepository, NoteRepository, StatusRepository};
use crate::error::{Error, Result};
use crate::models::{is_local_id, CallSyncState, Lead, LeadConflict, SyncStatus};
use crate::remote::{RemoteApi, RemoteLead};

/// Outcome counters for one sync pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub pushed_leads: usize,
    pub pushed_notes: usize,
    pub deleted_leads: usize,
    pub deleted_notes: usize,
    pub pushed_calls: usize,
    pub pulled_leads: usize,
    pub pulled_statuses: usize,
    pub conflicts: usize,
    pub failures: Vec<String>,
}

impl SyncReport {
    /// Whether the pass moved any data in either direction.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.pushed_leads == 0
            && self.pushed_notes == 0
            && self.deleted_leads == 0
            && self.deleted_notes == 0
            && self.pushed_calls == 0
            && self.pulled_leads == 0
            && self.pulled_statuses == 0
            && self.conflicts == 0
            && self.failures.is_empty()
    }
}

/// Sync engine over a local database and a remote API.
pub struct SyncEngine<'a, R: RemoteApi> {
    db: &'a Database,
    remote: &'a R,
}

impl<'a, R: RemoteApi> SyncEngine<'a, R> {
    pub const fn new(db: &'a Database, remote: &'a R) -> Self {
        Self { db, remote }
    }

    fn leads(&self) -> LeadRepository<'_> {
        LeadRepository::new(self.db.connection(), self.db.changes())
    }

    fn notes(&self) -> NoteRepository<'_> {
        NoteRepository::new(self.db.connection(), self.db.changes())
    }

    fn statuses(&self) -> StatusRepository<'_> {
        StatusRepository::new(self.db.connection(), self.db.changes())
    }

    fn calls(&self) -> CallRepository<'_> {
        CallRepository::new(self.db.connection(), self.db.changes())
    }

    /// Run one full sync pass: push leads, notes and calls, then pull
    /// statuses and leads.
    ///
    /// Item failures are collected in the report, never fatal for the pass.
    pub async fn run_pass(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        self.push_leads(&mut report).await?;
        self.push_notes(&mut report).await?;
        self.push_calls(&mut report).await?;
        self.pull_statuses(&mut report).await?;
        self.pull_leads(&mut report).await?;

        tracing::info!(
            pushed_leads = report.pushed_leads,
            pushed_notes = report.pushed_notes,
            pushed_calls = report.pushed_calls,
            pulled_leads = report.pulled_leads,
            conflicts = report.conflicts,
            failures = report.failures.len(),
            "sync pass finished"
        );
        Ok(report)
    }

    // --- push ----------------------------------------------------------------

    async fn push_leads(&self, report: &mut SyncReport) -> Result<()> {
        let leads = self.leads();

        for status in [SyncStatus::Created, SyncStatus::Updated] {
            for lead in leads.list_by_sync_status(status).await? {
                if lead.deleted_at.is_some() {
                    // deleted before it was ever pushed; handled in the
                    // Deleted drain below
                    continue;
                }
                match self.push_one_lead(&lead).await {
                    Ok(()) => report.pushed_leads += 1,
                    Err(e) => {
                        tracing::warn!(lead_id = %lead.id, error = %e, "lead push failed");
                        report.failures.push(format!("lead {}: {e}", lead.id));
                    }
                }
            }
        }

        for lead in leads.list_by_sync_status(SyncStatus::Deleted).await? {
            let result = if is_local_id(&lead.id) {
                // never reached the server; purge locally
                Ok(())
            } else {
                self.remote.delete_lead(&lead.id).await.map_err(Error::from)
            };
            match result {
                Ok(()) => {
                    leads.clear_conflict(&lead.id).await?;
                    leads.hard_delete(&lead.id).await?;
                    report.deleted_leads += 1;
                }
                Err(e) => {
                    tracing::warn!(lead_id = %lead.id, error = %e, "lead delete push failed");
                    report.failures.push(format!("lead {}: {e}", lead.id));
                }
            }
        }

        Ok(())
    }

    async fn push_one_lead(&self, lead: &Lead) -> Result<()> {
        let leads = self.leads();
        let remote = self.remote.save_lead(lead).await?;
        let now = chrono::Utc::now().timestamp_millis();

        if remote.id == lead.id {
            leads.mark_synced(&lead.id, now).await?;
        } else {
            // server assigned the canonical identity; swap atomically so
            // notes and call logs follow
            let canonical = remote.into_synced_lead(Some(lead), now);
            leads.replace_identity(&lead.id, &canonical).await?;
        }
        Ok(())
    }

    async fn push_notes(&self, report: &mut SyncReport) -> Result<()> {
        let notes = self.notes();

        for status in [SyncStatus::Created, SyncStatus::Updated] {
            for note in notes.list_by_sync_status(status).await? {
                if note.deleted_at.is_some() {
                    continue;
                }
                if is_local_id(&note.lead_id) {
                    // owning lead hasn't been pushed yet; retry next pass
                    tracing::debug!(note_id = %note.id, "note waits for its lead");
                    continue;
                }
                match self.push_one_note(&note).await {
                    Ok(()) => report.pushed_notes += 1,
                    Err(e) => {
                        tracing::warn!(note_id = %note.id, error = %e, "note push failed");
                        report.failures.push(format!("note {}: {e}", note.id));
                    }
                }
            }
        }

        for note in notes.list_by_sync_status(SyncStatus::Deleted).await? {
            let result = if is_local_id(&note.id) {
                Ok(())
            } else {
                self.remote.delete_note(&note.id).await.map_err(Error::from)
            };
            match result {
                Ok(()) => {
                    notes.hard_delete(&note.id).await?;
                    report.deleted_notes += 1;
                }
                Err(e) => {
                    tracing::warn!(note_id = %note.id, error = %e, "note delete push failed");
                    report.failures.push(format!("note {}: {e}", note.id));
                }
            }
        }

        Ok(())
    }

    async fn push_one_note(&self, note: &crate::models::LeadNote) -> Result<()> {
        let notes = self.notes();
        let remote = self.remote.save_note(note).await?;

        if remote.id == note.id {
            notes.mark_synced(&note.id).await?;
        } else {
            let canonical = remote.into_synced_note();
            notes.replace_identity(&note.id, &canonical).await?;
        }
        Ok(())
    }

    async fn push_calls(&self, report: &mut SyncReport) -> Result<()> {
        let calls = self.calls();
        let pending = calls.list_pending_logs().await?;
        if pending.is_empty() {
            return Ok(());
        }

        match self.remote.push_call_logs(&pending).await {
            Ok(summary) => {
                for id in &summary.accepted {
                    calls.set_log_sync_state(id, CallSyncState::Synced).await?;
                    report.pushed_calls += 1;
                }
                for rejection in &summary.rejected {
                    let reason = rejection.reason.as_deref().unwrap_or("rejected");
                    tracing::warn!(call_id = %rejection.id, reason, "call log rejected");
                    // rejected means the server refused the row; park it
                    // instead of re-pushing every pass
                    calls
                        .set_log_sync_state(&rejection.id, CallSyncState::Error)
                        .await?;
                    report
                        .failures
                        .push(format!("call {}: {reason}", rejection.id));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "call log batch push failed");
                report.failures.push(format!("calls: {e}"));
            }
        }
        Ok(())
    }

    // --- pull ----------------------------------------------------------------

    async fn pull_statuses(&self, report: &mut SyncReport) -> Result<()> {
        match self.remote.list_lead_statuses().await {
            Ok(remote_statuses) => {
                let statuses: Vec<_> = remote_statuses.into_iter().map(Into::into).collect();
                self.statuses().replace_all(&statuses).await?;
                report.pulled_statuses = statuses.len();
            }
            Err(e) => {
                tracing::warn!(error = %e, "status pull failed");
                report.failures.push(format!("statuses: {e}"));
            }
        }
        Ok(())
    }

    async fn pull_leads(&self, report: &mut SyncReport) -> Result<()> {
        let remote_leads = match self.remote.list_leads(None).await {
            Ok(leads) => leads,
            Err(e) => {
                tracing::warn!(error = %e, "lead pull failed");
                report.failures.push(format!("leads: {e}"));
                return Ok(());
            }
        };

        let leads = self.leads();
        let now = chrono::Utc::now().timestamp_millis();

        for remote in remote_leads {
            let local = leads.get(&remote.id).await?;
            match local {
                None => {
                    leads
                        .upsert_from_server(&remote.into_synced_lead(None, now))
                        .await?;
                    report.pulled_leads += 1;
                }
                Some(local) if local.deleted_at.is_some() => {
                    // local deletion is pending; the push drain will settle it
                }
                Some(local) if local.sync_status.is_pending() => {
                    if remote.updated_at > local.last_synced_at.unwrap_or(0) {
                        // both sides changed since the last agreement point
                        let snapshot = serde_json::to_string(&remote)?;
                        leads
                            .record_conflict(&local.id, local.updated_at, remote.updated_at, &snapshot)
                            .await?;
                        report.conflicts += 1;
                    }
                    // server row unchanged since last sync: local edit wins,
                    // it pushes next pass
                }
                Some(local) => {
                    if remote.updated_at > local.updated_at {
                        leads
                            .upsert_from_server(&remote.into_synced_lead(Some(&local), now))
                            .await?;
                        report.pulled_leads += 1;
                    }
                }
            }
        }
        Ok(())
    }

    // --- conflict resolution ---------------------------------------------------

    /// List leads waiting on an explicit conflict resolution.
    pub async fn conflicted_leads(&self) -> Result<Vec<LeadConflict>> {
        self.leads().list_conflicts().await
    }

    /// Keep the local edit: clear the conflict and leave the row pending so
    /// the next push overwrites the server.
    pub async fn resolve_keep_local(&self, lead_id: &str) -> Result<()> {
        let leads = self.leads();
        if leads.get_conflict(lead_id).await?.is_none() {
            return Err(Error::NotFound(format!("no conflict for lead {lead_id}")));
        }
        let mut lead = leads
            .get(lead_id)
            .await?
            .ok_or_else(|| Error::NotFound(lead_id.to_string()))?;
        if lead.sync_status == SyncStatus::Synced {
            lead.sync_status = SyncStatus::Updated;
            leads.update(&lead).await?;
        }
        leads.clear_conflict(lead_id).await?;
        tracing::info!(lead_id, "conflict resolved keeping local edit");
        Ok(())
    }

    /// Adopt the server row recorded in the conflict snapshot, discarding
    /// the local edit.
    pub async fn resolve_use_server(&self, lead_id: &str) -> Result<()> {
        let leads = self.leads();
        let conflict = leads
            .get_conflict(lead_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no conflict for lead {lead_id}")))?;

        let remote: RemoteLead = serde_json::from_str(&conflict.server_snapshot)?;
        let local = leads.get(lead_id).await?;
        let now = chrono::Utc::now().timestamp_millis();

        leads
            .upsert_from_server(&remote.into_synced_lead(local.as_ref(), now))
            .await?;
        leads.clear_conflict(lead_id).await?;
        tracing::info!(lead_id, "conflict resolved adopting server row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{CallLog, CallRecording, CallType, LeadNote};
    use crate::remote::{
        ApiError, ApiResult, CallRejection, CallSyncSummary, RemoteLeadStatus, RemoteNote,
        UploadGrant,
    };

    #[derive(Default)]
    struct MockState {
        counter: usize,
        fail_ids: HashSet<String>,
        deleted_leads: Vec<String>,
        deleted_notes: Vec<String>,
        pull_leads: Vec<RemoteLead>,
        pull_statuses: Vec<RemoteLeadStatus>,
        reject_calls: HashSet<String>,
        saved_leads: Vec<String>,
    }

    #[derive(Default)]
    struct MockRemote {
        state: Mutex<MockState>,
    }

    fn server_error() -> ApiError {
        ApiError::Api {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: "boom".to_string(),
        }
    }

    impl RemoteApi for MockRemote {
        async fn save_lead(&self, lead: &Lead) -> ApiResult<RemoteLead> {
            let mut state = self.state.lock().unwrap();
            if state.fail_ids.contains(&lead.id) {
                return Err(server_error());
            }
            let id = if is_local_id(&lead.id) {
                state.counter += 1;
                format!("srv_lead_{}", state.counter)
            } else {
                lead.id.clone()
            };
            state.saved_leads.push(id.clone());
            Ok(RemoteLead {
                id,
                name: lead.name.clone(),
                phone: lead.phone.clone(),
                email: lead.email.clone(),
                education: lead.education.clone(),
                budget: lead.budget,
                status_id: lead.status_id.clone(),
                priority: lead.priority,
                assigned_to: lead.assigned_to.clone(),
                branch_id: lead.branch_id.clone(),
                next_follow_up_at: lead.next_follow_up_at,
                reminder_note: lead.reminder_note.clone(),
                total_calls: None,
                total_notes: None,
                created_at: lead.created_at,
                updated_at: lead.updated_at,
            })
        }

        async fn delete_lead(&self, id: &str) -> ApiResult<()> {
            let mut state = self.state.lock().unwrap();
            if state.fail_ids.contains(id) {
                return Err(server_error());
            }
            state.deleted_leads.push(id.to_string());
            Ok(())
        }

        async fn list_leads(&self, _updated_since: Option<i64>) -> ApiResult<Vec<RemoteLead>> {
            Ok(self.state.lock().unwrap().pull_leads.clone())
        }

        async fn list_lead_statuses(&self) -> ApiResult<Vec<RemoteLeadStatus>> {
            Ok(self.state.lock().unwrap().pull_statuses.clone())
        }

        async fn save_note(&self, note: &LeadNote) -> ApiResult<RemoteNote> {
            let mut state = self.state.lock().unwrap();
            if state.fail_ids.contains(&note.id) {
                return Err(server_error());
            }
            let id = if is_local_id(&note.id) {
                state.counter += 1;
                format!("srv_note_{}", state.counter)
            } else {
                note.id.clone()
            };
            Ok(RemoteNote {
                id,
                lead_id: note.lead_id.clone(),
                content: note.content.clone(),
                note_type: note.note_type.clone(),
                created_by: note.created_by.clone(),
                created_at: note.created_at,
                updated_at: note.updated_at,
            })
        }

        async fn delete_note(&self, id: &str) -> ApiResult<()> {
            self.state.lock().unwrap().deleted_notes.push(id.to_string());
            Ok(())
        }

        async fn push_call_logs(&self, logs: &[CallLog]) -> ApiResult<CallSyncSummary> {
            let state = self.state.lock().unwrap();
            let mut summary = CallSyncSummary::default();
            for log in logs {
                if state.reject_calls.contains(&log.id) {
                    summary.rejected.push(CallRejection {
                        id: log.id.clone(),
                        reason: Some("missing lead".to_string()),
                    });
                } else {
                    summary.accepted.push(log.id.clone());
                }
            }
            Ok(summary)
        }

        async fn request_upload(
            &self,
            _recording: &CallRecording,
            _call: &CallLog,
        ) -> ApiResult<UploadGrant> {
            Err(server_error())
        }

        async fn upload_file(
            &self,
            _grant: &UploadGrant,
            _path: &Path,
            _content_type: &str,
        ) -> ApiResult<()> {
            Err(server_error())
        }

        async fn confirm_upload(
            &self,
            _grant: &UploadGrant,
            _recording: &CallRecording,
        ) -> ApiResult<Option<String>> {
            Err(server_error())
        }

        async fn stream_url(&self, _recording_id: &str) -> ApiResult<String> {
            Err(server_error())
        }
    }

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn remote_lead(id: &str, name: &str, updated_at: i64) -> RemoteLead {
        RemoteLead {
            id: id.to_string(),
            name: name.to_string(),
            phone: "9876543210".to_string(),
            email: None,
            education: None,
            budget: None,
            status_id: None,
            priority: 0,
            assigned_to: None,
            branch_id: None,
            next_follow_up_at: None,
            reminder_note: None,
            total_calls: None,
            total_notes: None,
            created_at: 1,
            updated_at,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_created_lead_push_swaps_identity_and_repoints_note() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        let lead = Lead::new("Asha", "9876543210");
        engine.leads().insert(&lead).await.unwrap();
        let note = LeadNote::new(&lead.id, "call back friday");
        engine.notes().insert(&note).await.unwrap();

        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.pushed_leads, 1);
        assert_eq!(report.pushed_notes, 1);
        assert!(report.failures.is_empty());

        // old identity is gone, the canonical row is synced
        assert!(engine.leads().get(&lead.id).await.unwrap().is_none());
        let synced = engine.leads().get("srv_lead_1").await.unwrap().unwrap();
        assert_eq!(synced.sync_status, SyncStatus::Synced);
        assert!(synced.last_synced_at.is_some());

        // the note followed the lead and got its own canonical id
        let notes = engine.notes().list_for_lead("srv_lead_1").await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].sync_status, SyncStatus::Synced);
        assert!(!is_local_id(&notes[0].id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_pass_pushes_nothing_for_synced_lead() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        let lead = Lead::new("Asha", "9876543210");
        engine.leads().insert(&lead).await.unwrap();

        let first = engine.run_pass().await.unwrap();
        assert_eq!(first.pushed_leads, 1);

        // re-running the pass over an already-synced store is a no-op push:
        // the server saw the lead exactly once, no duplicate was created
        let second = engine.run_pass().await.unwrap();
        assert_eq!(second.pushed_leads, 0);
        assert!(second.failures.is_empty());
        assert_eq!(remote.state.lock().unwrap().saved_leads.len(), 1);
        assert_eq!(engine.leads().list(10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_failure_does_not_stop_the_pass() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        let good = Lead::new("Good", "1111111111");
        let bad = Lead::new("Bad", "2222222222");
        engine.leads().insert(&good).await.unwrap();
        engine.leads().insert(&bad).await.unwrap();
        remote.state.lock().unwrap().fail_ids.insert(bad.id.clone());

        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.pushed_leads, 1);
        assert_eq!(report.failures.len(), 1);

        // the failed lead stays pending for the next pass
        let still_pending = engine
            .leads()
            .list_by_sync_status(SyncStatus::Created)
            .await
            .unwrap();
        assert_eq!(still_pending.len(), 1);
        assert_eq!(still_pending[0].id, bad.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deleted_synced_lead_pushes_delete_then_purges() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        let mut lead = Lead::new("Asha", "9876543210");
        lead.id = "srv_lead_9".to_string();
        lead.sync_status = SyncStatus::Synced;
        engine.leads().insert(&lead).await.unwrap();
        engine.leads().soft_delete(&lead.id).await.unwrap();

        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.deleted_leads, 1);
        assert_eq!(
            remote.state.lock().unwrap().deleted_leads,
            vec!["srv_lead_9".to_string()]
        );
        assert!(engine.leads().get(&lead.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_local_only_deleted_lead_never_hits_server() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        let lead = Lead::new("Draft", "3333333333");
        engine.leads().insert(&lead).await.unwrap();
        engine.leads().soft_delete(&lead.id).await.unwrap();

        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.deleted_leads, 1);
        assert!(remote.state.lock().unwrap().deleted_leads.is_empty());
        assert!(engine.leads().get(&lead.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_inserts_and_updates_synced_rows() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        remote.state.lock().unwrap().pull_leads = vec![remote_lead("srv_1", "Fresh", 100)];
        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.pulled_leads, 1);

        // a newer server row overwrites the synced local copy
        remote.state.lock().unwrap().pull_leads = vec![remote_lead("srv_1", "Renamed", 200)];
        engine.run_pass().await.unwrap();
        let lead = engine.leads().get("srv_1").await.unwrap().unwrap();
        assert_eq!(lead.name, "Renamed");
        assert_eq!(lead.sync_status, SyncStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_conflicting_pull_is_parked_not_applied() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        // a synced row edited locally after its last agreement point
        remote.state.lock().unwrap().pull_leads = vec![remote_lead("srv_1", "Original", 100)];
        engine.run_pass().await.unwrap();

        let mut lead = engine.leads().get("srv_1").await.unwrap().unwrap();
        lead.name = "Local edit".to_string();
        engine.leads().save_local_edit(&lead).await.unwrap();

        // server changed it too
        let last_synced = engine
            .leads()
            .get("srv_1")
            .await
            .unwrap()
            .unwrap()
            .last_synced_at
            .unwrap();
        remote.state.lock().unwrap().pull_leads =
            vec![remote_lead("srv_1", "Server edit", last_synced + 1000)];
        // keep the local edit from being pushed so the collision survives
        remote
            .state
            .lock()
            .unwrap()
            .fail_ids
            .insert("srv_1".to_string());

        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.conflicts, 1);

        // local edit untouched, server snapshot parked
        let lead = engine.leads().get("srv_1").await.unwrap().unwrap();
        assert_eq!(lead.name, "Local edit");
        assert_eq!(engine.conflicted_leads().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resolve_keep_local_re_marks_for_push() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        let mut lead = Lead::new("Asha", "9876543210");
        lead.id = "srv_1".to_string();
        lead.sync_status = SyncStatus::Updated;
        lead.last_synced_at = Some(50);
        engine.leads().insert(&lead).await.unwrap();
        engine
            .leads()
            .record_conflict(
                "srv_1",
                lead.updated_at,
                999,
                &serde_json::to_string(&remote_lead("srv_1", "Server", 999)).unwrap(),
            )
            .await
            .unwrap();

        engine.resolve_keep_local("srv_1").await.unwrap();
        assert!(engine.conflicted_leads().await.unwrap().is_empty());
        let resolved = engine.leads().get("srv_1").await.unwrap().unwrap();
        assert_eq!(resolved.name, "Asha");
        assert!(resolved.sync_status.is_pending());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resolve_use_server_adopts_snapshot() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        let mut lead = Lead::new("Local", "9876543210");
        lead.id = "srv_1".to_string();
        lead.sync_status = SyncStatus::Updated;
        engine.leads().insert(&lead).await.unwrap();
        engine
            .leads()
            .record_conflict(
                "srv_1",
                lead.updated_at,
                999,
                &serde_json::to_string(&remote_lead("srv_1", "Server", 999)).unwrap(),
            )
            .await
            .unwrap();

        engine.resolve_use_server("srv_1").await.unwrap();
        assert!(engine.conflicted_leads().await.unwrap().is_empty());
        let resolved = engine.leads().get("srv_1").await.unwrap().unwrap();
        assert_eq!(resolved.name, "Server");
        assert_eq!(resolved.sync_status, SyncStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_call_logs_push_per_item_outcomes() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        let calls = engine.calls();
        let ok = calls
            .ingest_event(CallLog::from_event(
                "1111111111",
                CallType::Outgoing,
                30,
                1_700_000_000_000,
                "dev-ok",
            ))
            .await
            .unwrap();
        let bad = calls
            .ingest_event(CallLog::from_event(
                "2222222222",
                CallType::Missed,
                0,
                1_700_000_001_000,
                "dev-bad",
            ))
            .await
            .unwrap();
        remote
            .state
            .lock()
            .unwrap()
            .reject_calls
            .insert(bad.id.clone());

        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.pushed_calls, 1);
        assert_eq!(report.failures.len(), 1);

        let synced = calls.get_log(&ok.id).await.unwrap().unwrap();
        assert_eq!(synced.sync_state, CallSyncState::Synced);
        let rejected = calls.get_log(&bad.id).await.unwrap().unwrap();
        assert_eq!(rejected.sync_state, CallSyncState::Error);

        // a rejected call is not offered again on the next pass
        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.pushed_calls, 0);
        assert!(report.failures.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_statuses_replaced_wholesale_on_pull() {
        let db = setup().await;
        let remote = MockRemote::default();
        let engine = SyncEngine::new(&db, &remote);

        remote.state.lock().unwrap().pull_statuses = vec![RemoteLeadStatus {
            id: "s1".to_string(),
            name: "New".to_string(),
            color: None,
            sort_order: 0,
            is_default: true,
            is_active: true,
        }];

        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.pulled_statuses, 1);
        assert!(engine.statuses().get("s1").await.unwrap().is_some());
    }
}
