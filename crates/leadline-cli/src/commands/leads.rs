use leadline_core::db::{LeadRepository, NoteRepository};
use leadline_core::models::Lead;

use crate::commands::common::{
    format_lead_lines, format_note_lines, lead_to_list_item, CliContext, LeadListItem,
};
use crate::error::CliError;

pub async fn run_add(
    ctx: &CliContext,
    name: &str,
    phone: &str,
    email: Option<String>,
    budget: Option<f64>,
    as_json: bool,
) -> Result<(), CliError> {
    let name = name.trim();
    let phone = phone.trim();
    if name.is_empty() || phone.is_empty() {
        return Err(CliError::InvalidInput(
            "lead name and phone must not be empty".to_string(),
        ));
    }

    let db = ctx.open_database().await?;
    let leads = LeadRepository::new(db.connection(), db.changes());

    let mut lead = Lead::new(name, phone);
    lead.email = email.map(|value| value.trim().to_string());
    lead.budget = budget;
    leads.insert(&lead).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&lead_to_list_item(&lead))?);
    } else {
        println!("Created lead {} ({})", lead.id, lead.name);
    }
    Ok(())
}

pub async fn run_list(ctx: &CliContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let leads = LeadRepository::new(db.connection(), db.changes());
    let rows = leads.list(limit, 0).await?;

    print_leads(&rows, as_json)
}

pub async fn run_search(
    ctx: &CliContext,
    query: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::InvalidInput(
            "search query must not be empty".to_string(),
        ));
    }

    let db = ctx.open_database().await?;
    let leads = LeadRepository::new(db.connection(), db.changes());
    let rows = leads.search(query, limit).await?;

    print_leads(&rows, as_json)
}

pub async fn run_show(ctx: &CliContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let leads = LeadRepository::new(db.connection(), db.changes());
    let notes = NoteRepository::new(db.connection(), db.changes());

    let lead = leads
        .get(id)
        .await?
        .ok_or_else(|| CliError::LeadNotFound(id.to_string()))?;
    let lead_notes = notes.list_for_lead(&lead.id).await?;

    if as_json {
        let payload = serde_json::json!({
            "lead": lead,
            "notes": lead_notes,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{}  {}", lead.name, lead.phone);
    if let Some(email) = &lead.email {
        println!("email: {email}");
    }
    println!(
        "id: {}  calls: {}  notes: {}  status: {}",
        lead.id,
        lead.total_calls,
        lead.total_notes,
        crate::commands::common::sync_marker(lead.sync_status)
    );
    if !lead_notes.is_empty() {
        println!();
        for line in format_note_lines(&lead_notes) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_delete(ctx: &CliContext, id: &str) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let leads = LeadRepository::new(db.connection(), db.changes());

    if leads.get(id).await?.is_none() {
        return Err(CliError::LeadNotFound(id.to_string()));
    }
    leads.soft_delete(id).await?;
    println!("Deleted lead {id} (server removal on next sync)");
    Ok(())
}

fn print_leads(rows: &[Lead], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let items = rows.iter().map(lead_to_list_item).collect::<Vec<LeadListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No leads found.");
        return Ok(());
    }
    for line in format_lead_lines(rows) {
        println!("{line}");
    }
    Ok(())
}
