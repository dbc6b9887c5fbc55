use std::sync::Arc;

use leadline_core::db::LeadRepository;
use leadline_core::scheduler::JobScheduler;
use leadline_core::sync::SyncEngine;

use crate::commands::common::{conflict_to_item, format_conflict_lines, CliContext, ConflictItem};
use crate::error::CliError;

pub async fn run_now(ctx: &CliContext, as_json: bool) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let remote = ctx.remote()?;

    let engine = SyncEngine::new(&db, &remote);
    let report = engine.run_pass().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.is_noop() {
        println!("Already up to date.");
        return Ok(());
    }
    println!(
        "Pushed {} leads, {} notes, {} calls; pulled {} leads, {} statuses.",
        report.pushed_leads,
        report.pushed_notes,
        report.pushed_calls,
        report.pulled_leads,
        report.pulled_statuses
    );
    if report.deleted_leads + report.deleted_notes > 0 {
        println!(
            "Removed {} leads and {} notes from the server.",
            report.deleted_leads, report.deleted_notes
        );
    }
    if report.conflicts > 0 {
        println!(
            "{} lead(s) parked in conflict; run `leadline sync conflicts`.",
            report.conflicts
        );
    }
    for failure in &report.failures {
        eprintln!("failed: {failure}");
    }
    Ok(())
}

pub async fn run_daemon(ctx: &CliContext) -> Result<(), CliError> {
    let db = Arc::new(ctx.open_database().await?);
    let remote = Arc::new(ctx.remote()?);

    let scheduler_config = ctx.config.scheduler_config();
    let sync_interval = scheduler_config.sync_interval;
    let scheduler = JobScheduler::new(
        Arc::clone(&db),
        remote,
        scheduler_config,
        ctx.config.pipeline_config(&ctx.data_dir()),
    );
    scheduler.start_periodic_sync();
    let queued = scheduler.enqueue_unfinished_recordings().await?;
    tracing::info!(?sync_interval, queued, "daemon started");

    println!("Syncing every {sync_interval:?}; {queued} recording(s) queued.");
    println!("Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    scheduler.cancel_all();
    println!("Stopped.");
    Ok(())
}

pub async fn run_conflicts(ctx: &CliContext, as_json: bool) -> Result<(), CliError> {
    // listing conflicts is a purely local read, no token required
    let db = ctx.open_database().await?;
    let leads = LeadRepository::new(db.connection(), db.changes());
    let conflicts = leads.list_conflicts().await?;

    if as_json {
        let items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No conflicts pending.");
        return Ok(());
    }
    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_resolve(
    ctx: &CliContext,
    lead_id: &str,
    keep_local: bool,
    use_server: bool,
) -> Result<(), CliError> {
    if keep_local == use_server {
        return Err(CliError::InvalidInput(
            "pass exactly one of --keep-local or --use-server".to_string(),
        ));
    }

    let db = ctx.open_database().await?;
    let remote = ctx.remote()?;
    let engine = SyncEngine::new(&db, &remote);

    if keep_local {
        engine.resolve_keep_local(lead_id).await?;
        println!("Kept local version of {lead_id}; it pushes on the next sync.");
    } else {
        engine.resolve_use_server(lead_id).await?;
        println!("Adopted server version of {lead_id}.");
    }
    Ok(())
}
