use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use plantlog_core::models::Collection;
use plantlog_core::sync::ConflictResolution;

#[derive(Parser)]
#[command(name = "plantlog")]
#[command(about = "Capture and sync plant-floor records from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Work with captured records
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },
    /// Synchronize with the remote server (full run when no subcommand)
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Show or update sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Show local store diagnostics
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Capture a new record
    Add {
        /// Target collection
        #[arg(value_enum)]
        collection: CollectionArg,
        /// JSON payload (piped stdin when omitted)
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
    /// List records, newest first
    List {
        /// Target collection
        #[arg(value_enum)]
        collection: CollectionArg,
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// Records per page
        #[arg(long, default_value = "20")]
        per_page: u32,
        /// Free-text filter against the payload
        #[arg(long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single record
    Show {
        /// Target collection
        #[arg(value_enum)]
        collection: CollectionArg,
        /// Local record id
        id: i64,
    },
    /// Replace a record's payload
    Edit {
        /// Target collection
        #[arg(value_enum)]
        collection: CollectionArg,
        /// Local record id
        id: i64,
        /// JSON payload (piped stdin when omitted)
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
    /// Delete a record (kept locally as a tombstone until synced)
    Delete {
        /// Target collection
        #[arg(value_enum)]
        collection: CollectionArg,
        /// Local record id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Push pending local changes only
    Push,
    /// Pull remote changes only
    Pull,
    /// Probe the remote endpoint
    Check,
    /// Show pending/conflict counts and the last successful sync
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent sync runs
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List open conflicts
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflict by keeping one side
    Resolve {
        /// Conflict id, e.g. tension-12
        id: String,
        /// Side to keep
        #[arg(long, value_enum)]
        keep: ResolutionArg,
    },
    /// Run full syncs on the configured interval
    Watch,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current sync settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update sync settings (only provided flags change)
    Set {
        /// Remote API base URL
        #[arg(long, value_name = "URL")]
        server_url: Option<String>,
        /// Bearer credential for remote calls
        #[arg(long, value_name = "TOKEN")]
        auth_token: Option<String>,
        /// Enable or disable timed full syncs
        #[arg(long, value_name = "BOOL")]
        auto_sync: Option<bool>,
        /// Sync interval in minutes
        #[arg(long, value_name = "MINUTES")]
        interval: Option<u32>,
        /// Run a full sync when the client starts
        #[arg(long, value_name = "BOOL")]
        sync_on_startup: Option<bool>,
        /// Include tension records in sync runs
        #[arg(long, value_name = "BOOL")]
        tension: Option<bool>,
        /// Include stock-take records in sync runs
        #[arg(long, value_name = "BOOL")]
        stock_take: Option<bool>,
        /// Include finish-earlier records in sync runs
        #[arg(long, value_name = "BOOL")]
        finish_earlier: Option<bool>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CollectionArg {
    Tension,
    StockTake,
    FinishEarlier,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Tension => Self::Tension,
            CollectionArg::StockTake => Self::StockTake,
            CollectionArg::FinishEarlier => Self::FinishEarlier,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolutionArg {
    Local,
    Remote,
}

impl From<ResolutionArg> for ConflictResolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::Local => Self::Local,
            ResolutionArg::Remote => Self::Remote,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
