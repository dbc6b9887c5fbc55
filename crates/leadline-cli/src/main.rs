//! Leadline CLI - offline-first field-sales CRM from the terminal
//!
//! Captures leads, notes and calls into a local store and reconciles them
//! with the server on demand or from the background daemon.

mod auth;
mod cli;
mod commands;
mod error;

use clap::Parser;

use cli::{
    AuthCommands, CallCommands, Cli, Commands, LeadCommands, NoteCommands, RecordingCommands,
    SyncCommands,
};
use commands::common::CliContext;
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leadline=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::build(cli.db_path, cli.profile.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Commands::Leads { command } => match command {
            LeadCommands::Add {
                name,
                phone,
                email,
                budget,
                json,
            } => commands::leads::run_add(&ctx, &name, &phone, email, budget, json).await?,
            LeadCommands::List { limit, json } => {
                commands::leads::run_list(&ctx, limit, json).await?;
            }
            LeadCommands::Search { query, limit, json } => {
                commands::leads::run_search(&ctx, &query, limit, json).await?;
            }
            LeadCommands::Show { id, json } => commands::leads::run_show(&ctx, &id, json).await?,
            LeadCommands::Delete { id } => commands::leads::run_delete(&ctx, &id).await?,
        },
        Commands::Notes { command } => match command {
            NoteCommands::Add { lead_id, content } => {
                commands::notes::run_add(&ctx, &lead_id, &content).await?;
            }
            NoteCommands::List { lead_id, json } => {
                commands::notes::run_list(&ctx, &lead_id, json).await?;
            }
        },
        Commands::Calls { command } => match command {
            CallCommands::Log {
                phone,
                call_type,
                duration,
                device_call_id,
                process,
            } => {
                commands::calls::run_log(
                    &ctx,
                    &phone,
                    call_type.into(),
                    duration,
                    device_call_id,
                    process,
                )
                .await?;
            }
            CallCommands::List { limit, json } => {
                commands::calls::run_list(&ctx, limit, json).await?;
            }
        },
        Commands::Recordings { command } => match command {
            RecordingCommands::Process { call_id } => {
                commands::recordings::run_process(&ctx, &call_id).await?;
            }
            RecordingCommands::List { status, json } => {
                commands::recordings::run_list(&ctx, status.as_deref(), json).await?;
            }
            RecordingCommands::Retry { call_id } => {
                commands::recordings::run_retry(&ctx, &call_id).await?;
            }
            RecordingCommands::Url { call_id } => {
                commands::recordings::run_url(&ctx, &call_id).await?;
            }
        },
        Commands::Sync { command } => match command {
            SyncCommands::Now { json } => commands::sync_cmd::run_now(&ctx, json).await?,
            SyncCommands::Daemon => commands::sync_cmd::run_daemon(&ctx).await?,
            SyncCommands::Conflicts { json } => {
                commands::sync_cmd::run_conflicts(&ctx, json).await?;
            }
            SyncCommands::Resolve {
                lead_id,
                keep_local,
                use_server,
            } => {
                commands::sync_cmd::run_resolve(&ctx, &lead_id, keep_local, use_server).await?;
            }
        },
        Commands::Auth { command } => match command {
            AuthCommands::Login { token } => commands::auth_cmd::run_login(&ctx, token)?,
            AuthCommands::Status => commands::auth_cmd::run_status(&ctx)?,
            AuthCommands::Logout => commands::auth_cmd::run_logout(&ctx)?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use leadline_core::config::Profile;
    use leadline_core::db::{CallRepository, Database, LeadRepository, NoteRepository};
    use pretty_assertions::assert_eq;

    use super::commands::common::CliContext;
    use super::commands::{calls, leads, notes, sync_cmd};
    use super::error::CliError;

    fn unique_test_db_path() -> PathBuf {
        static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("leadline-cli-test-{timestamp}-{sequence}.db"))
    }

    fn cleanup_db_files(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
    }

    fn test_context(db_path: PathBuf) -> CliContext {
        CliContext {
            db_path,
            profile: Profile::Dev,
            config: leadline_core::config::AppConfig::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn leads_add_delete_lifecycle() {
        let db_path = unique_test_db_path();
        let ctx = test_context(db_path.clone());

        leads::run_add(&ctx, "Asha Verma", "9876543210", None, None, false)
            .await
            .unwrap();
        leads::run_add(
            &ctx,
            "Ravi Kumar",
            "9123456780",
            Some("ravi@example.com".to_string()),
            Some(50_000.0),
            false,
        )
        .await
        .unwrap();

        let db = Database::open(&db_path).await.unwrap();
        let repo = LeadRepository::new(db.connection(), db.changes());
        let rows = repo.list(10, 0).await.unwrap();
        assert_eq!(rows.len(), 2);

        let ravi = repo.find_by_phone("9123456780").await.unwrap().unwrap();
        assert_eq!(ravi.email.as_deref(), Some("ravi@example.com"));
        drop(db);

        leads::run_delete(&ctx, &ravi.id).await.unwrap();

        let db = Database::open(&db_path).await.unwrap();
        let repo = LeadRepository::new(db.connection(), db.changes());
        let rows = repo.list(10, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Asha Verma");
        drop(db);

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn leads_add_rejects_blank_input() {
        let db_path = unique_test_db_path();
        let ctx = test_context(db_path.clone());

        let result = leads::run_add(&ctx, "  ", "9876543210", None, None, false).await;
        assert!(matches!(result, Err(CliError::InvalidInput(_))));

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn notes_require_an_existing_lead() {
        let db_path = unique_test_db_path();
        let ctx = test_context(db_path.clone());

        let missing = notes::run_add(&ctx, "srv_nope", &["hello".to_string()]).await;
        assert!(matches!(missing, Err(CliError::LeadNotFound(_))));

        leads::run_add(&ctx, "Asha", "9876543210", None, None, false)
            .await
            .unwrap();
        let db = Database::open(&db_path).await.unwrap();
        let lead_id = {
            let repo = LeadRepository::new(db.connection(), db.changes());
            repo.list(1, 0).await.unwrap()[0].id.clone()
        };
        drop(db);

        notes::run_add(&ctx, &lead_id, &["asked for brochure".to_string()])
            .await
            .unwrap();

        let db = Database::open(&db_path).await.unwrap();
        let note_repo = NoteRepository::new(db.connection(), db.changes());
        let lead_notes = note_repo.list_for_lead(&lead_id).await.unwrap();
        assert_eq!(lead_notes.len(), 1);
        assert_eq!(lead_notes[0].content, "asked for brochure");

        let lead_repo = LeadRepository::new(db.connection(), db.changes());
        let lead = lead_repo.get(&lead_id).await.unwrap().unwrap();
        assert_eq!(lead.total_notes, 1);
        drop(db);

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn logged_calls_match_leads_by_phone() {
        let db_path = unique_test_db_path();
        let ctx = test_context(db_path.clone());

        leads::run_add(&ctx, "Asha", "+91 98765 43210", None, None, false)
            .await
            .unwrap();
        calls::run_log(
            &ctx,
            "9876543210",
            leadline_core::models::CallType::Incoming,
            42,
            Some("dev-call-1".to_string()),
            false,
        )
        .await
        .unwrap();

        let db = Database::open(&db_path).await.unwrap();
        let call_repo = CallRepository::new(db.connection(), db.changes());
        let rows = call_repo.list_logs(10, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].lead_id.is_some());
        assert_eq!(rows[0].duration_secs, 42);
        drop(db);

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn conflicts_listing_works_without_a_token() {
        let db_path = unique_test_db_path();
        let ctx = test_context(db_path.clone());

        // no stored token; a purely local read must still succeed
        sync_cmd::run_conflicts(&ctx, false).await.unwrap();

        cleanup_db_files(&db_path);
    }

    #[test]
    fn context_build_honors_profile_override() {
        let db_path = unique_test_db_path();
        let ctx = CliContext::build(Some(db_path.clone()), Some("staging"), None).unwrap();
        assert_eq!(ctx.profile, Profile::Staging);
        assert_eq!(ctx.db_path, db_path);

        assert!(CliContext::build(Some(db_path), Some("qa"), None).is_err());
    }
}
