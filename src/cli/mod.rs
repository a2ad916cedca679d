//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::sync::{SyncPolicy, Trigger};

pub mod commands;

/// ledger-sync - offline-first ledger with background sync
#[derive(Parser, Debug)]
#[command(name = "ledger-sync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.ledger-sync/data/ledger.db)
    #[arg(long, global = true, env = "LEDGER_SYNC_DB")]
    pub db: Option<PathBuf>,

    /// Owner id to act as (overrides the configured session)
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Treat the remote as unreachable; writes stay queued
    #[arg(long, global = true)]
    pub offline: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Options shared by every command handler.
#[derive(Debug, Clone, Copy)]
pub struct GlobalOpts<'a> {
    pub db: Option<&'a PathBuf>,
    pub owner: Option<&'a str>,
    pub offline: bool,
    pub json: bool,
}

impl Cli {
    #[must_use]
    pub fn global_opts(&self, json: bool) -> GlobalOpts<'_> {
        GlobalOpts {
            db: self.db.as_ref(),
            owner: self.owner.as_deref(),
            offline: self.offline,
            json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Show pending rows and the last sync run
    Status,

    /// Record and inspect transactions
    #[command(alias = "transaction")]
    Tx {
        #[command(subcommand)]
        command: TxCommands,
    },

    /// Manage the owner's profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Manage monthly forecasts
    Forecast {
        #[command(subcommand)]
        command: ForecastCommands,
    },

    /// Push pending rows to the remote now
    Sync(SyncArgs),

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Transaction Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum TxCommands {
    /// Record a transaction locally
    Add(TxAddArgs),

    /// List local transactions
    List {
        /// Only rows not yet accepted by the remote
        #[arg(long)]
        pending: bool,

        /// Maximum rows to return
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show one transaction and its history
    Show {
        /// Local id (`tmp_...`) or remote id
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct TxAddArgs {
    /// Amount (positive)
    pub amount: f64,

    /// Category label
    #[arg(short, long)]
    pub category: String,

    /// income or expense (synonyms like spend, salary are accepted)
    #[arg(short, long, default_value = "expense")]
    pub kind: String,

    /// Date, YYYY-MM-DD or "today"
    #[arg(short, long, default_value = "today")]
    pub date: String,

    /// Free-form note
    #[arg(short, long)]
    pub note: Option<String>,

    /// Do not trigger a background sync after the write
    #[arg(long)]
    pub no_sync: bool,
}

// ============================================================================
// Profile Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Create or update the profile
    Set {
        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Three-letter currency code
        #[arg(long)]
        currency: Option<String>,

        /// Expected monthly income
        #[arg(long)]
        income: Option<f64>,

        /// Do not trigger a background sync after the write
        #[arg(long)]
        no_sync: bool,
    },

    /// Show the profile
    Show,
}

// ============================================================================
// Forecast Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ForecastCommands {
    /// Create or replace the forecast for a month
    Set {
        /// Month index (0-11) or name (jan, february, ...)
        month: String,

        /// Projected income
        #[arg(long, default_value_t = 0.0)]
        income: f64,

        /// Projected expenses
        #[arg(long, default_value_t = 0.0)]
        expenses: f64,

        /// Free-form note
        #[arg(short, long)]
        note: Option<String>,

        /// Do not trigger a background sync after the write
        #[arg(long)]
        no_sync: bool,
    },

    /// List forecasts
    List,
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Failure policy (best-effort, fail-fast); defaults to the configured one
    #[arg(long)]
    pub policy: Option<SyncPolicy>,

    /// Trigger to record for this run
    #[arg(long, default_value = "manual")]
    pub trigger: Trigger,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration (secrets masked)
    Show,

    /// Set a config file value; an empty value clears it
    Set {
        /// Dotted key, e.g. remote.endpoint
        key: String,

        /// New value
        value: String,
    },
}
