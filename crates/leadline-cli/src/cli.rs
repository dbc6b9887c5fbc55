use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "leadline")]
#[command(about = "Offline-first field-sales CRM from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Deployment profile (dev, staging, prod)
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Optional path to a configuration JSON file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage leads
    Leads {
        #[command(subcommand)]
        command: LeadCommands,
    },
    /// Manage notes on leads
    Notes {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Capture and inspect call logs
    Calls {
        #[command(subcommand)]
        command: CallCommands,
    },
    /// Inspect and drive call-recording uploads
    Recordings {
        #[command(subcommand)]
        command: RecordingCommands,
    },
    /// Synchronize the local store with the server
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Manage the stored API token
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
pub enum LeadCommands {
    /// Create a new lead
    #[command(alias = "new")]
    Add {
        /// Lead name
        name: String,
        /// Lead phone number
        phone: String,
        /// Optional email address
        #[arg(long)]
        email: Option<String>,
        /// Optional free-form budget
        #[arg(long)]
        budget: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent leads
    List {
        /// Number of leads to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search leads by name, phone or email
    Search {
        /// Search query
        query: String,
        /// Number of leads to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one lead with its notes
    Show {
        /// Lead ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete a lead (removed from the server on the next sync)
    Delete {
        /// Lead ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Attach a note to a lead
    #[command(alias = "new")]
    Add {
        /// Lead ID
        lead_id: String,
        /// Note content (stdin when omitted)
        content: Vec<String>,
    },
    /// List notes on a lead
    List {
        /// Lead ID
        lead_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum CallCommands {
    /// Record a call event (normally fed by the device call log)
    Log {
        /// Phone number
        phone: String,
        /// Call direction
        #[arg(value_enum)]
        call_type: CallDirection,
        /// Duration in seconds
        #[arg(long, default_value = "0")]
        duration: i64,
        /// Device-side call identity; generated when omitted
        #[arg(long, value_name = "ID")]
        device_call_id: Option<String>,
        /// Run the recording pipeline for this call right away
        #[arg(long)]
        process: bool,
    },
    /// List recent calls
    List {
        /// Number of calls to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum RecordingCommands {
    /// Run the find/compress/upload chain for one call
    Process {
        /// Call log ID
        call_id: String,
    },
    /// List recordings, optionally filtered by status
    List {
        /// Filter: pending, finding, compressing, uploading, uploaded, failed
        #[arg(long, value_name = "STATUS")]
        status: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-arm a failed recording and run the chain again
    Retry {
        /// Call log ID
        call_id: String,
    },
    /// Print a short-lived playback URL for an uploaded recording
    Url {
        /// Call log ID
        call_id: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run one push/pull pass now
    Now {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run periodic sync and recording uploads until interrupted
    Daemon,
    /// List leads parked in conflict
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a parked conflict
    Resolve {
        /// Lead ID
        lead_id: String,
        /// Keep the local edit and push it on the next sync
        #[arg(long, conflicts_with = "use_server")]
        keep_local: bool,
        /// Adopt the server version and drop the local edit
        #[arg(long)]
        use_server: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store an API token in the OS keychain
    Login {
        /// API token (stdin when omitted)
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
    },
    /// Show whether a token is stored for the profile
    Status,
    /// Clear the stored token
    Logout,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CallDirection {
    Incoming,
    Outgoing,
    Missed,
}

impl From<CallDirection> for leadline_core::models::CallType {
    fn from(direction: CallDirection) -> Self {
        match direction {
            CallDirection::Incoming => Self::Incoming,
            CallDirection::Outgoing => Self::Outgoing,
            CallDirection::Missed => Self::Missed,
        }
    }
}
