//! Lead repository implementation

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{Lead, LeadConflict, SyncStatus};
use crate::util::phone_tail;

use super::{ChangeFeed, ChangeKind, Entity};

const LEAD_COLUMNS: &str = "id, name, phone, email, education, budget, status_id, priority, \
     assigned_to, branch_id, next_follow_up_at, reminder_note, total_calls, total_notes, \
     sync_status, last_synced_at, created_at, updated_at, deleted_at";

/// libSQL repository for leads and their conflict log.
pub struct LeadRepository<'a> {
    conn: &'a Connection,
    changes: &'a ChangeFeed,
}

impl<'a> LeadRepository<'a> {
    /// Create a new repository over the given connection and change feed.
    pub const fn new(conn: &'a Connection, changes: &'a ChangeFeed) -> Self {
        Self { conn, changes }
    }

    /// Insert a new lead row.
    pub async fn insert(&self, lead: &Lead) -> Result<()> {
        self.insert_row(lead).await?;
        self.changes
            .publish(Entity::Lead, lead.id.clone(), ChangeKind::Inserted);
        Ok(())
    }

    /// Insert a batch of leads atomically.
    pub async fn insert_all(&self, leads: &[Lead]) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        for lead in leads {
            if let Err(e) = self.insert_row(lead).await {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        }
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        for lead in leads {
            self.changes
                .publish(Entity::Lead, lead.id.clone(), ChangeKind::Inserted);
        }
        Ok(())
    }

    /// Fetch a lead by exact id.
    ///
    /// Soft-deleted rows stay addressable here even though they are excluded
    /// from every listing.
    pub async fn get(&self, id: &str) -> Result<Option<Lead>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?"),
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_lead(&row)?)),
            None => Ok(None),
        }
    }

    /// List non-deleted leads, most recently updated first.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Lead>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE deleted_at IS NULL
                     ORDER BY updated_at DESC
                     LIMIT ? OFFSET ?"
                ),
                params![limit as i64, offset as i64],
            )
            .await?;

        collect_leads(&mut rows).await
    }

    /// Search non-deleted leads by name or phone substring.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Lead>> {
        if query.trim().is_empty() {
            return self.list(limit, 0).await;
        }
        let pattern = format!("%{}%", query.trim());
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE deleted_at IS NULL AND (name LIKE ? OR phone LIKE ?)
                     ORDER BY updated_at DESC
                     LIMIT ?"
                ),
                params![pattern.clone(), pattern, limit as i64],
            )
            .await?;

        collect_leads(&mut rows).await
    }

    /// Find a non-deleted lead whose phone has the same 10-digit tail.
    ///
    /// Matching goes through the stored `phone_tail` column so display
    /// formatting in `phone` ("+91 98765 43210") never defeats the lookup.
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>> {
        let tail = phone_tail(phone, 10);
        if tail.is_empty() {
            return Ok(None);
        }
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE deleted_at IS NULL AND phone_tail = ?
                     ORDER BY updated_at DESC
                     LIMIT 1"
                ),
                [tail],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_lead(&row)?)),
            None => Ok(None),
        }
    }

    /// List non-deleted leads carrying a given status reference.
    pub async fn list_by_status(&self, status_id: &str) -> Result<Vec<Lead>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE deleted_at IS NULL AND status_id = ?
                     ORDER BY updated_at DESC"
                ),
                [status_id],
            )
            .await?;

        collect_leads(&mut rows).await
    }

    /// List leads by sync status, oldest mutation first.
    ///
    /// Includes soft-deleted rows: `Deleted` drains rely on it.
    pub async fn list_by_sync_status(&self, status: SyncStatus) -> Result<Vec<Lead>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE sync_status = ?
                     ORDER BY updated_at ASC"
                ),
                [status.as_i64()],
            )
            .await?;

        collect_leads(&mut rows).await
    }

    /// List non-deleted leads created inside `[from, to)` (Unix ms).
    pub async fn list_created_between(&self, from: i64, to: i64) -> Result<Vec<Lead>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE deleted_at IS NULL AND created_at >= ? AND created_at < ?
                     ORDER BY created_at DESC"
                ),
                params![from, to],
            )
            .await?;

        collect_leads(&mut rows).await
    }

    /// Rewrite a lead row exactly as passed. The caller owns timestamps and
    /// sync status semantics.
    pub async fn update(&self, lead: &Lead) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE leads SET name = ?, phone = ?, phone_tail = ?, email = ?,
                    education = ?, budget = ?, status_id = ?, priority = ?, assigned_to = ?,
                    branch_id = ?, next_follow_up_at = ?, reminder_note = ?, total_calls = ?,
                    total_notes = ?, sync_status = ?, last_synced_at = ?, created_at = ?,
                    updated_at = ?, deleted_at = ?
                 WHERE id = ?",
                params![
                    lead.name.clone(),
                    lead.phone.clone(),
                    phone_tail(&lead.phone, 10),
                    lead.email.clone(),
                    lead.education.clone(),
                    lead.budget,
                    lead.status_id.clone(),
                    lead.priority,
                    lead.assigned_to.clone(),
                    lead.branch_id.clone(),
                    lead.next_follow_up_at,
                    lead.reminder_note.clone(),
                    lead.total_calls,
                    lead.total_notes,
                    lead.sync_status.as_i64(),
                    lead.last_synced_at,
                    lead.created_at,
                    lead.updated_at,
                    lead.deleted_at,
                    lead.id.clone(),
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(lead.id.clone()));
        }
        self.changes
            .publish(Entity::Lead, lead.id.clone(), ChangeKind::Updated);
        Ok(())
    }

    /// Record a local edit: bump `updated_at` and mark the row as owing a
    /// push (`Created` rows stay `Created`, everything else becomes
    /// `Updated`).
    pub async fn save_local_edit(&self, lead: &Lead) -> Result<Lead> {
        let mut edited = lead.clone();
        edited.updated_at = chrono::Utc::now().timestamp_millis();
        if edited.sync_status != SyncStatus::Created {
            edited.sync_status = SyncStatus::Updated;
        }
        self.update(&edited).await?;
        Ok(edited)
    }

    /// Insert-or-overwrite a lead from a server pull. Server wins for every
    /// field it returns; the row lands `Synced`.
    pub async fn upsert_from_server(&self, lead: &Lead) -> Result<()> {
        let existed = self.get(&lead.id).await?.is_some();
        let mut row = lead.clone();
        row.sync_status = SyncStatus::Synced;
        if existed {
            self.update(&row).await?;
        } else {
            self.insert(&row).await?;
        }
        Ok(())
    }

    /// Soft-delete: set the marker, force `sync_status = Deleted`, bump
    /// `updated_at`. The row stays until the sync engine gets a server ack.
    pub async fn soft_delete(&self, id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let rows = self
            .conn
            .execute(
                "UPDATE leads SET deleted_at = ?, sync_status = ?, updated_at = ?
                 WHERE id = ? AND deleted_at IS NULL",
                params![now, SyncStatus::Deleted.as_i64(), now, id],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.changes
            .publish(Entity::Lead, id.to_string(), ChangeKind::Deleted);
        Ok(())
    }

    /// Physically remove a row. Only the sync engine issues this, after the
    /// server acknowledged the delete.
    pub async fn hard_delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM leads WHERE id = ?", [id])
            .await?;
        self.changes
            .publish(Entity::Lead, id.to_string(), ChangeKind::Deleted);
        Ok(())
    }

    /// Mark a row as agreeing with the server.
    pub async fn mark_synced(&self, id: &str, synced_at: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE leads SET sync_status = ?, last_synced_at = ? WHERE id = ?",
                params![SyncStatus::Synced.as_i64(), synced_at, id],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.changes
            .publish(Entity::Lead, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Swap a temporary local identity for the server's canonical row.
    ///
    /// Runs as one transaction: insert the canonical row, repoint child
    /// notes and call logs, delete the old row. A concurrent reader sees
    /// either the old identity or the new one, never both and never neither.
    pub async fn replace_identity(&self, old_id: &str, canonical: &Lead) -> Result<()> {
        if canonical.id == old_id {
            return Err(Error::InvalidInput(
                "identity swap requires a different canonical id".to_string(),
            ));
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = self.replace_identity_inner(old_id, canonical).await;
        match result {
            Ok(()) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        }

        self.changes
            .publish(Entity::Lead, old_id.to_string(), ChangeKind::Deleted);
        self.changes
            .publish(Entity::Lead, canonical.id.clone(), ChangeKind::Inserted);
        Ok(())
    }

    async fn replace_identity_inner(&self, old_id: &str, canonical: &Lead) -> Result<()> {
        self.insert_row(canonical).await?;
        self.conn
            .execute(
                "UPDATE lead_notes SET lead_id = ? WHERE lead_id = ?",
                params![canonical.id.clone(), old_id],
            )
            .await?;
        self.conn
            .execute(
                "UPDATE call_logs SET lead_id = ? WHERE lead_id = ?",
                params![canonical.id.clone(), old_id],
            )
            .await?;
        let deleted = self
            .conn
            .execute("DELETE FROM leads WHERE id = ?", [old_id])
            .await?;
        if deleted == 0 {
            return Err(Error::NotFound(old_id.to_string()));
        }
        Ok(())
    }

    /// Bump the denormalized call counter.
    pub async fn increment_total_calls(&self, id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE leads SET total_calls = total_calls + 1 WHERE id = ?",
                [id],
            )
            .await?;
        self.changes
            .publish(Entity::Lead, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Bump the denormalized note counter.
    pub async fn increment_total_notes(&self, id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE leads SET total_notes = total_notes + 1 WHERE id = ?",
                [id],
            )
            .await?;
        self.changes
            .publish(Entity::Lead, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    // --- conflict log -----------------------------------------------------

    /// Record a conflicted pull, replacing any earlier record for the lead.
    pub async fn record_conflict(
        &self,
        lead_id: &str,
        local_updated_at: i64,
        server_updated_at: i64,
        server_snapshot: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO lead_conflicts
                    (lead_id, local_updated_at, server_updated_at, server_snapshot, detected_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(lead_id) DO UPDATE SET
                    local_updated_at = excluded.local_updated_at,
                    server_updated_at = excluded.server_updated_at,
                    server_snapshot = excluded.server_snapshot,
                    detected_at = excluded.detected_at",
                params![
                    lead_id,
                    local_updated_at,
                    server_updated_at,
                    server_snapshot,
                    chrono::Utc::now().timestamp_millis(),
                ],
            )
            .await?;
        Ok(())
    }

    /// List open conflicts, most recent first.
    pub async fn list_conflicts(&self) -> Result<Vec<LeadConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, lead_id, local_updated_at, server_updated_at, server_snapshot, detected_at
                 FROM lead_conflicts
                 ORDER BY detected_at DESC",
                (),
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(parse_conflict(&row)?);
        }
        Ok(conflicts)
    }

    /// Fetch the open conflict for a lead, if any.
    pub async fn get_conflict(&self, lead_id: &str) -> Result<Option<LeadConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, lead_id, local_updated_at, server_updated_at, server_snapshot, detected_at
                 FROM lead_conflicts WHERE lead_id = ?",
                [lead_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_conflict(&row)?)),
            None => Ok(None),
        }
    }

    /// Drop the conflict record for a lead.
    pub async fn clear_conflict(&self, lead_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM lead_conflicts WHERE lead_id = ?", [lead_id])
            .await?;
        Ok(())
    }

    async fn insert_row(&self, lead: &Lead) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO leads (id, name, phone, phone_tail, email, education, budget,
                    status_id, priority, assigned_to, branch_id, next_follow_up_at,
                    reminder_note, total_calls, total_notes, sync_status, last_synced_at,
                    created_at, updated_at, deleted_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    lead.id.clone(),
                    lead.name.clone(),
                    lead.phone.clone(),
                    phone_tail(&lead.phone, 10),
                    lead.email.clone(),
                    lead.education.clone(),
                    lead.budget,
                    lead.status_id.clone(),
                    lead.priority,
                    lead.assigned_to.clone(),
                    lead.branch_id.clone(),
                    lead.next_follow_up_at,
                    lead.reminder_note.clone(),
                    lead.total_calls,
                    lead.total_notes,
                    lead.sync_status.as_i64(),
                    lead.last_synced_at,
                    lead.created_at,
                    lead.updated_at,
                    lead.deleted_at,
                ],
            )
            .await?;
        Ok(())
    }
}

async fn collect_leads(rows: &mut libsql::Rows) -> Result<Vec<Lead>> {
    let mut leads = Vec::new();
    while let Some(row) = rows.next().await? {
        leads.push(parse_lead(&row)?);
    }
    Ok(leads)
}

fn parse_lead(row: &Row) -> Result<Lead> {
    let sync_status: i64 = row.get(14)?;
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        education: row.get(4)?,
        budget: row.get(5)?,
        status_id: row.get(6)?,
        priority: row.get(7)?,
        assigned_to: row.get(8)?,
        branch_id: row.get(9)?,
        next_follow_up_at: row.get(10)?,
        reminder_note: row.get(11)?,
        total_calls: row.get(12)?,
        total_notes: row.get(13)?,
        sync_status: SyncStatus::from_i64(sync_status)
            .ok_or_else(|| Error::Database(format!("invalid lead sync_status {sync_status}")))?,
        last_synced_at: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
        deleted_at: row.get(18)?,
    })
}

fn parse_conflict(row: &Row) -> Result<LeadConflict> {
    Ok(LeadConflict {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        local_updated_at: row.get(2)?,
        server_updated_at: row.get(3)?,
        server_snapshot: row.get(4)?,
        detected_at: row.get(5)?,
    })
}
