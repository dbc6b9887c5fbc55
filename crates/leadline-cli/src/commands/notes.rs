use leadline_core::db::{LeadRepository, NoteRepository};
use leadline_core::models::LeadNote;

use crate::commands::common::{format_note_lines, resolve_content, CliContext};
use crate::error::CliError;

pub async fn run_add(
    ctx: &CliContext,
    lead_id: &str,
    content_parts: &[String],
) -> Result<(), CliError> {
    let content = resolve_content(content_parts)?;

    let db = ctx.open_database().await?;
    let leads = LeadRepository::new(db.connection(), db.changes());
    let notes = NoteRepository::new(db.connection(), db.changes());

    if leads.get(lead_id).await?.is_none() {
        return Err(CliError::LeadNotFound(lead_id.to_string()));
    }

    let note = LeadNote::new(lead_id, content);
    notes.insert(&note).await?;
    println!("Added note {} to lead {lead_id}", note.id);
    Ok(())
}

pub async fn run_list(ctx: &CliContext, lead_id: &str, as_json: bool) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let leads = LeadRepository::new(db.connection(), db.changes());
    let notes = NoteRepository::new(db.connection(), db.changes());

    if leads.get(lead_id).await?.is_none() {
        return Err(CliError::LeadNotFound(lead_id.to_string()));
    }
    let rows = notes.list_for_lead(lead_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No notes on this lead.");
        return Ok(());
    }
    for line in format_note_lines(&rows) {
        println!("{line}");
    }
    Ok(())
}
