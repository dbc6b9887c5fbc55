//! Lead status reference-table repository

use libsql::{params, Connection, Row};

use crate::error::Result;
use crate::models::LeadStatus;

use super::{ChangeFeed, ChangeKind, Entity};

/// libSQL repository for the server-controlled lead status cache.
pub struct StatusRepository<'a> {
    conn: &'a Connection,
    changes: &'a ChangeFeed,
}

impl<'a> StatusRepository<'a> {
    /// Create a new repository over the given connection and change feed.
    pub const fn new(conn: &'a Connection, changes: &'a ChangeFeed) -> Self {
        Self { conn, changes }
    }

    /// Replace the whole cached table with the pulled list, atomically.
    ///
    /// The server owns this data; last writer is always the server.
    pub async fn replace_all(&self, statuses: &[LeadStatus]) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result: Result<()> = async {
            // status_id on leads is ON DELETE SET NULL; clearing the cache
            // must not null out references that survive the pull, so rows
            // are upserted first and stale ones removed after.
            for status in statuses {
                self.conn
                    .execute(
                        "INSERT INTO lead_statuses (id, name, color, sort_order, is_default, is_active)
                         VALUES (?, ?, ?, ?, ?, ?)
                         ON CONFLICT(id) DO UPDATE SET
                            name = excluded.name,
                            color = excluded.color,
                            sort_order = excluded.sort_order,
                            is_default = excluded.is_default,
                            is_active = excluded.is_active",
                        params![
                            status.id.clone(),
                            status.name.clone(),
                            status.color.clone(),
                            status.sort_order,
                            i64::from(status.is_default),
                            i64::from(status.is_active),
                        ],
                    )
                    .await?;
            }

            let keep: Vec<String> = statuses.iter().map(|s| s.id.clone()).collect();
            if keep.is_empty() {
                self.conn.execute("DELETE FROM lead_statuses", ()).await?;
            } else {
                let placeholders = vec!["?"; keep.len()].join(", ");
                self.conn
                    .execute(
                        &format!("DELETE FROM lead_statuses WHERE id NOT IN ({placeholders})"),
                        keep,
                    )
                    .await?;
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
            .publish(Entity::LeadStatus, "*", ChangeKind::Updated);
        Ok(())
    }

    /// Fetch a status by id.
    pub async fn get(&self, id: &str) -> Result<Option<LeadStatus>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, color, sort_order, is_default, is_active
                 FROM lead_statuses WHERE id = ?",
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_status(&row)?)),
            None => Ok(None),
        }
    }

    /// List active statuses in display order.
    pub async fn list_active(&self) -> Result<Vec<LeadStatus>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, color, sort_order, is_default, is_active
                 FROM lead_statuses
                 WHERE is_active = 1
                 ORDER BY sort_order ASC, name ASC",
                (),
            )
            .await?;

        let mut statuses = Vec::new();
        while let Some(row) = rows.next().await? {
            statuses.push(parse_status(&row)?);
        }
        Ok(statuses)
    }
}

fn parse_status(row: &Row) -> Result<LeadStatus> {
    Ok(LeadStatus {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        sort_order: row.get(3)?,
        is_default: row.get::<i64>(4)? != 0,
        is_active: row.get::<i64>(5)? != 0,
    })
}
