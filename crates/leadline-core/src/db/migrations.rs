//! Database migrations

use libsql::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: Initial schema
///
/// Six tables plus conflict log, with the indexes implied by the query
/// patterns: phone and status lookups, sync-status drains, call timestamp
/// windows, device-call and recording-per-call uniqueness.
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside a transaction for atomicity.

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Server-controlled status reference table, replaced wholesale on pull
        "CREATE TABLE IF NOT EXISTS lead_statuses (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            color TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_default INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        // Leads
        "CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            phone_tail TEXT NOT NULL DEFAULT '',
            email TEXT,
            education TEXT,
            budget REAL,
            status_id TEXT REFERENCES lead_statuses(id) ON DELETE SET NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            assigned_to TEXT,
            branch_id TEXT,
            next_follow_up_at INTEGER,
            reminder_note TEXT,
            total_calls INTEGER NOT NULL DEFAULT 0,
            total_notes INTEGER NOT NULL DEFAULT 0,
            sync_status INTEGER NOT NULL DEFAULT 1,
            last_synced_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_leads_phone ON leads(phone)",
        "CREATE INDEX IF NOT EXISTS idx_leads_phone_tail ON leads(phone_tail)",
        "CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status_id)",
        "CREATE INDEX IF NOT EXISTS idx_leads_sync_status ON leads(sync_status)",
        "CREATE INDEX IF NOT EXISTS idx_leads_deleted ON leads(deleted_at)",
        "CREATE INDEX IF NOT EXISTS idx_leads_updated ON leads(updated_at DESC)",
        // Lead notes, cascade-deleted with their lead
        "CREATE TABLE IF NOT EXISTS lead_notes (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            note_type TEXT,
            created_by TEXT,
            sync_status INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_lead_notes_lead ON lead_notes(lead_id)",
        "CREATE INDEX IF NOT EXISTS idx_lead_notes_sync_status ON lead_notes(sync_status)",
        // Call logs; device_call_id dedupes OS-reported calls
        "CREATE TABLE IF NOT EXISTS call_logs (
            id TEXT PRIMARY KEY,
            phone_number TEXT NOT NULL,
            call_type TEXT NOT NULL,
            duration_secs INTEGER NOT NULL DEFAULT 0,
            call_at INTEGER NOT NULL,
            device_call_id TEXT NOT NULL UNIQUE,
            lead_id TEXT REFERENCES leads(id) ON DELETE SET NULL,
            notes TEXT,
            sync_state INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_call_logs_phone ON call_logs(phone_number)",
        "CREATE INDEX IF NOT EXISTS idx_call_logs_call_at ON call_logs(call_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_call_logs_sync_state ON call_logs(sync_state)",
        // Call recordings; exactly one per call log, cascade-deleted with it
        "CREATE TABLE IF NOT EXISTS call_recordings (
            id TEXT PRIMARY KEY,
            call_log_id TEXT NOT NULL UNIQUE REFERENCES call_logs(id) ON DELETE CASCADE,
            local_file_path TEXT,
            original_file_name TEXT,
            original_file_size INTEGER,
            compressed_file_size INTEGER,
            duration_secs INTEGER,
            format TEXT,
            storage_key TEXT,
            storage_url TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            upload_progress INTEGER NOT NULL DEFAULT 0,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_call_recordings_status ON call_recordings(status)",
        // Conflicted leads awaiting explicit resolution
        "CREATE TABLE IF NOT EXISTS lead_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lead_id TEXT NOT NULL UNIQUE,
            local_updated_at INTEGER NOT NULL,
            server_updated_at INTEGER NOT NULL,
            server_snapshot TEXT NOT NULL,
            detected_at INTEGER NOT NULL
        )",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_all_tables_exist() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in [
            "leads",
            "lead_notes",
            "lead_statuses",
            "call_logs",
            "call_recordings",
            "lead_conflicts",
        ] {
            let mut rows = conn
                .query(
                    "SELECT EXISTS(
                        SELECT 1 FROM sqlite_master
                        WHERE type = 'table' AND name = ?
                    )",
                    [table],
                )
                .await
                .unwrap();

            let exists = rows
                .next()
                .await
                .unwrap()
                .is_some_and(|row| row.get::<i32>(0).unwrap() != 0);

            assert!(exists, "missing table {table}");
        }
    }
}
