//! Status command implementation.

use colored::Colorize;
use serde::Serialize;

use crate::cli::GlobalOpts;
use crate::config::load_config;
use crate::error::Result;
use crate::storage::PendingCounts;
use crate::sync::SyncRunSummary;

use super::open_storage;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    pending: PendingBreakdown,
    remote_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    last_sync: Option<SyncRunSummary>,
}

#[derive(Serialize)]
struct PendingBreakdown {
    transactions: usize,
    profiles: usize,
    forecasts: usize,
    total: usize,
    /// Synced transactions awaiting cleanup.
    synced_transactions: usize,
}

impl From<PendingCounts> for PendingBreakdown {
    fn from(counts: PendingCounts) -> Self {
        Self {
            transactions: counts.transactions,
            profiles: counts.profiles,
            forecasts: counts.forecasts,
            total: counts.total(),
            synced_transactions: counts.synced_transactions,
        }
    }
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the database is missing or a query fails.
pub fn execute(opts: &GlobalOpts<'_>) -> Result<()> {
    let storage = open_storage(opts.db)?;
    let pending = PendingBreakdown::from(storage.pending_counts()?);
    let last_sync = storage.last_sync_run()?;
    let config = load_config()?.resolve();

    if opts.json {
        let output = StatusOutput {
            pending,
            remote_configured: config.has_remote(),
            endpoint: config.endpoint,
            last_sync,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("ledger-sync Status");
    println!("==================");
    println!();
    match &config.endpoint {
        Some(endpoint) => println!("Remote: {endpoint}"),
        None => println!("Remote: {}", "not configured".yellow()),
    }
    println!();

    println!("Pending: {}", pending.total);
    println!("  Transactions: {}", pending.transactions);
    println!("  Profiles:     {}", pending.profiles);
    println!("  Forecasts:    {}", pending.forecasts);
    if pending.synced_transactions > 0 {
        println!(
            "  ({} synced transactions awaiting cleanup)",
            pending.synced_transactions
        );
    }
    println!();

    match last_sync {
        Some(run) => {
            let when = run.finished_at.format("%Y-%m-%d %H:%M:%S UTC");
            if let Some(reason) = run.skip_reason {
                println!(
                    "Last sync: {when} ({}) {}",
                    run.trigger,
                    format!("skipped: {}", reason.as_str()).yellow()
                );
            } else {
                let counts = format!(
                    "{}/{} synced, {} failed",
                    run.success_count, run.total_count, run.failure_count
                );
                println!(
                    "Last sync: {when} ({}) {}",
                    run.trigger,
                    if run.has_failures() {
                        counts.red()
                    } else {
                        counts.green()
                    }
                );
            }
        }
        None => println!("Last sync: {}", "never".dimmed()),
    }

    Ok(())
}
