//! Lead note repository implementation

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{LeadNote, SyncStatus};

use super::{ChangeFeed, ChangeKind, Entity};

const NOTE_COLUMNS: &str =
    "id, lead_id, content, note_type, created_by, sync_status, created_at, updated_at, deleted_at";

/// libSQL repository for lead notes.
pub struct NoteRepository<'a> {
    conn: &'a Connection,
    changes: &'a ChangeFeed,
}

impl<'a> NoteRepository<'a> {
    /// Create a new repository over the given connection and change feed.
    pub const fn new(conn: &'a Connection, changes: &'a ChangeFeed) -> Self {
        Self { conn, changes }
    }

    /// Insert a note and bump the owning lead's note counter.
    pub async fn insert(&self, note: &LeadNote) -> Result<()> {
        self.insert_row(note).await?;
        self.conn
            .execute(
                "UPDATE leads SET total_notes = total_notes + 1 WHERE id = ?",
                [note.lead_id.clone()],
            )
            .await?;
        self.changes
            .publish(Entity::LeadNote, note.id.clone(), ChangeKind::Inserted);
        Ok(())
    }

    /// Fetch a note by exact id, soft-deleted included.
    pub async fn get(&self, id: &str) -> Result<Option<LeadNote>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {NOTE_COLUMNS} FROM lead_notes WHERE id = ?"),
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_note(&row)?)),
            None => Ok(None),
        }
    }

    /// List non-deleted notes for a lead, newest first.
    pub async fn list_for_lead(&self, lead_id: &str) -> Result<Vec<LeadNote>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {NOTE_COLUMNS} FROM lead_notes
                     WHERE lead_id = ? AND deleted_at IS NULL
                     ORDER BY created_at DESC"
                ),
                [lead_id],
            )
            .await?;

        collect_notes(&mut rows).await
    }

    /// List notes by sync status, oldest mutation first (soft-deleted
    /// included: `Deleted` drains rely on it).
    pub async fn list_by_sync_status(&self, status: SyncStatus) -> Result<Vec<LeadNote>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {NOTE_COLUMNS} FROM lead_notes
                     WHERE sync_status = ?
                     ORDER BY updated_at ASC"
                ),
                [status.as_i64()],
            )
            .await?;

        collect_notes(&mut rows).await
    }

    /// Update a note's content as a local edit.
    pub async fn update_content(&self, id: &str, content: &str) -> Result<LeadNote> {
        let now = chrono::Utc::now().timestamp_millis();
        let rows = self
            .conn
            .execute(
                "UPDATE lead_notes SET content = ?, updated_at = ?,
                    sync_status = CASE sync_status WHEN ? THEN ? ELSE ? END
                 WHERE id = ? AND deleted_at IS NULL",
                params![
                    content,
                    now,
                    SyncStatus::Created.as_i64(),
                    SyncStatus::Created.as_i64(),
                    SyncStatus::Updated.as_i64(),
                    id,
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.changes
            .publish(Entity::LeadNote, id.to_string(), ChangeKind::Updated);
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Soft-delete: set the marker, force `sync_status = Deleted`.
    pub async fn soft_delete(&self, id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let rows = self
            .conn
            .execute(
                "UPDATE lead_notes SET deleted_at = ?, sync_status = ?, updated_at = ?
                 WHERE id = ? AND deleted_at IS NULL",
                params![now, SyncStatus::Deleted.as_i64(), now, id],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.changes
            .publish(Entity::LeadNote, id.to_string(), ChangeKind::Deleted);
        Ok(())
    }

    /// Physically remove a row after server acknowledgment.
    pub async fn hard_delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM lead_notes WHERE id = ?", [id])
            .await?;
        self.changes
            .publish(Entity::LeadNote, id.to_string(), ChangeKind::Deleted);
        Ok(())
    }

    /// Mark a row as agreeing with the server.
    pub async fn mark_synced(&self, id: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE lead_notes SET sync_status = ? WHERE id = ?",
                params![SyncStatus::Synced.as_i64(), id],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.changes
            .publish(Entity::LeadNote, id.to_string(), ChangeKind::Updated);
        Ok(())
    }

    /// Swap a temporary note identity for the server's canonical row, as one
    /// transaction.
    pub async fn replace_identity(&self, old_id: &str, canonical: &LeadNote) -> Result<()> {
        if canonical.id == old_id {
            return Err(Error::InvalidInput(
                "identity swap requires a different canonical id".to_string(),
            ));
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result: Result<()> = async {
            self.insert_row(canonical).await?;
            let deleted = self
                .conn
                .execute("DELETE FROM lead_notes WHERE id = ?", [old_id])
                .await?;
            if deleted == 0 {
                return Err(Error::NotFound(old_id.to_string()));
            }
            Ok(())
        }
        .await;

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
            .publish(Entity::LeadNote, old_id.to_string(), ChangeKind::Deleted);
        self.changes
            .publish(Entity::LeadNote, canonical.id.clone(), ChangeKind::Inserted);
        Ok(())
    }

    async fn insert_row(&self, note: &LeadNote) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO lead_notes (id, lead_id, content, note_type, created_by,
                    sync_status, created_at, updated_at, deleted_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    note.id.clone(),
                    note.lead_id.clone(),
                    note.content.clone(),
                    note.note_type.clone(),
                    note.created_by.clone(),
                    note.sync_status.as_i64(),
                    note.created_at,
                    note.updated_at,
                    note.deleted_at,
                ],
            )
            .await?;
        Ok(())
    }
}

async fn collect_notes(rows: &mut libsql::Rows) -> Result<Vec<LeadNote>> {
    let mut notes = Vec::new();
    while let Some(row) = rows.next().await? {
        notes.push(parse_note(&row)?);
    }
    Ok(notes)
}

fn parse_note(row: &Row) -> Result<LeadNote> {
    let sync_status: i64 = row.get(5)?;
    Ok(LeadNote {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        content: row.get(2)?,
        note_type: row.get(3)?,
        created_by: row.get(4)?,
        sync_status: SyncStatus::from_i64(sync_status)
            .ok_or_else(|| Error::Database(format!("invalid note sync_status {sync_status}")))?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        deleted_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LeadRepository};
    use crate::models::Lead;
    use pretty_assertions::assert_eq;

    async fn setup_with_lead() -> (Database, Lead) {
        let db = Database::open_in_memory().await.unwrap();
        let lead = Lead::new("Asha", "9876543210");
        LeadRepository::new(db.connection(), db.changes())
            .insert(&lead)
            .await
            .unwrap();
        (db, lead)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_bumps_lead_counter() {
        let (db, lead) = setup_with_lead().await;
        let repo = NoteRepository::new(db.connection(), db.changes());

        repo.insert(&LeadNote::new(&lead.id, "asked for brochure"))
            .await
            .unwrap();

        let leads = LeadRepository::new(db.connection(), db.changes());
        let fetched = leads.get(&lead.id).await.unwrap().unwrap();
        assert_eq!(fetched.total_notes, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_content_marks_updated_unless_created() {
        let (db, lead) = setup_with_lead().await;
        let repo = NoteRepository::new(db.connection(), db.changes());

        let note = LeadNote::new(&lead.id, "v1");
        repo.insert(&note).await.unwrap();

        // still Created: never pushed, edits fold into the pending create
        let edited = repo.update_content(&note.id, "v2").await.unwrap();
        assert_eq!(edited.sync_status, SyncStatus::Created);

        repo.mark_synced(&note.id).await.unwrap();
        let edited = repo.update_content(&note.id, "v3").await.unwrap();
        assert_eq!(edited.sync_status, SyncStatus::Updated);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_soft_delete_hides_from_listing() {
        let (db, lead) = setup_with_lead().await;
        let repo = NoteRepository::new(db.connection(), db.changes());

        let note = LeadNote::new(&lead.id, "to delete");
        repo.insert(&note).await.unwrap();
        repo.soft_delete(&note.id).await.unwrap();

        assert!(repo.list_for_lead(&lead.id).await.unwrap().is_empty());
        let pending = repo.list_by_sync_status(SyncStatus::Deleted).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cascade_delete_with_lead() {
        let (db, lead) = setup_with_lead().await;
        let repo = NoteRepository::new(db.connection(), db.changes());

        let note = LeadNote::new(&lead.id, "cascades");
        repo.insert(&note).await.unwrap();

        LeadRepository::new(db.connection(), db.changes())
            .hard_delete(&lead.id)
            .await
            .unwrap();

        assert!(repo.get(&note.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_identity() {
        let (db, lead) = setup_with_lead().await;
        let repo = NoteRepository::new(db.connection(), db.changes());

        let note = LeadNote::new(&lead.id, "swap me");
        repo.insert(&note).await.unwrap();

        let mut canonical = note.clone();
        canonical.id = "srv_note_1".to_string();
        canonical.sync_status = SyncStatus::Synced;
        repo.replace_identity(&note.id, &canonical).await.unwrap();

        assert!(repo.get(&note.id).await.unwrap().is_none());
        let swapped = repo.get("srv_note_1").await.unwrap().unwrap();
        assert_eq!(swapped.sync_status, SyncStatus::Synced);
    }
}
