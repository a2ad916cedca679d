//! Sync command and the sync wiring shared by write commands.
//!
//! Every command process builds its own [`SyncService`] around the local
//! database, the configured REST gateway and session source. Write commands
//! fire an `offline-write` trigger and drain it before the process exits;
//! `sync` runs one pass in the foreground.

use std::sync::Arc;

use colored::Colorize;
use tracing::{debug, warn};

use crate::cli::{GlobalOpts, SyncArgs};
use crate::config::{ResolvedConfig, load_config};
use crate::error::{Error, Result};
use crate::network::{ConnectivityMonitor, PROBE_TIMEOUT};
use crate::remote::{HttpGateway, SessionSource};
use crate::storage::{LocalStore, SqliteStorage};
use crate::sync::{
    CategoryStatus, FixedDelay, NetworkStatusMonitor, SyncCoordinator, SyncPolicy,
    SyncRunSummary, SyncService, TracingEventBus, Trigger,
};

use super::{open_storage, runtime};

/// The concrete service the CLI runs.
pub type CliSyncService = SyncService<LocalStore, HttpGateway, SessionSource>;

struct SyncSetup {
    service: CliSyncService,
    monitor: Arc<ConnectivityMonitor>,
}

/// Wire the coordinator from resolved settings.
///
/// The remote is treated as offline when `--offline` is given or no
/// endpoint is configured; otherwise reachability is probed before a run.
fn build(
    storage: SqliteStorage,
    config: &ResolvedConfig,
    opts: &GlobalOpts<'_>,
    policy: Option<SyncPolicy>,
) -> Result<SyncSetup> {
    let monitor = Arc::new(match (&config.endpoint, opts.offline) {
        (Some(endpoint), false) => ConnectivityMonitor::with_probe(endpoint, PROBE_TIMEOUT)?,
        _ => ConnectivityMonitor::new(false),
    });
    let network: Arc<dyn NetworkStatusMonitor> = monitor.clone();

    let coordinator = SyncCoordinator::new(
        LocalStore::new(storage),
        HttpGateway::from_config(config)?,
        SessionSource::from_config(config, opts.owner)?,
        network,
    )
    .with_event_bus(Arc::new(TracingEventBus))
    .with_delay(Arc::new(FixedDelay(config.session_delay)))
    .with_policy(policy.unwrap_or(config.policy))
    .with_session_attempts(config.session_attempts);

    Ok(SyncSetup {
        service: SyncService::new(coordinator),
        monitor,
    })
}

/// Persist run summaries for `status`. Bookkeeping failures are only logged.
fn record_runs(service: &CliSyncService, summaries: &[SyncRunSummary]) {
    for summary in summaries {
        if let Err(e) = service
            .coordinator()
            .store()
            .with(|storage| storage.record_sync_run(summary))
        {
            warn!(error = %e, "Failed to record sync run");
        }
    }
}

/// Trigger a background sync after a local write and wait for it to drain.
///
/// The write has already committed, so nothing here fails the command:
/// problems are logged and the row stays queued for the next run.
pub(crate) fn after_write(
    storage: SqliteStorage,
    opts: &GlobalOpts<'_>,
    no_sync: bool,
) -> Option<SyncRunSummary> {
    if no_sync {
        debug!("--no-sync given, row stays queued");
        return None;
    }

    let config = match load_config() {
        Ok(config) => config.resolve(),
        Err(e) => {
            warn!(error = %e, "Could not load config, skipping sync");
            return None;
        }
    };
    if !config.has_remote() {
        debug!("No remote endpoint configured, row stays queued");
        return None;
    }

    let result = runtime().and_then(|rt| {
        rt.block_on(async {
            let setup = build(storage, &config, opts, None)?;
            setup.monitor.probe().await;
            setup.service.initialize()?;
            setup.service.trigger(Trigger::OfflineWrite);
            let summaries = setup.service.shutdown().await;
            record_runs(&setup.service, &summaries);
            Ok::<_, Error>(summaries.into_iter().last())
        })
    });

    match result {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "Background sync could not start");
            None
        }
    }
}

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the database is missing, the config cannot be read,
/// or no endpoint is configured while online.
pub fn execute(args: &SyncArgs, opts: &GlobalOpts<'_>) -> Result<()> {
    let storage = open_storage(opts.db)?;
    let config = load_config()?.resolve();

    if !config.has_remote() && !opts.offline {
        return Err(Error::Config(
            "No remote endpoint configured (remote.endpoint or LEDGER_SYNC_ENDPOINT)".to_string(),
        ));
    }

    let rt = runtime()?;
    let summary = rt.block_on(async {
        let setup = build(storage, &config, opts, args.policy)?;
        setup.monitor.probe().await;
        let summary = setup.service.sync_now(args.trigger).await;
        record_runs(&setup.service, std::slice::from_ref(&summary));
        Ok::<_, Error>(summary)
    })?;

    if opts.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

/// Human-readable run summary.
pub(crate) fn print_summary(summary: &SyncRunSummary) {
    if let Some(reason) = summary.skip_reason {
        println!(
            "{} {}",
            "Sync skipped:".yellow(),
            reason.as_str().replace('-', " ")
        );
        return;
    }

    let headline = format!(
        "Synced {}/{} ({} failed)",
        summary.success_count, summary.total_count, summary.failure_count
    );
    if summary.has_failures() {
        println!("{}", headline.red().bold());
    } else {
        println!("{}", headline.green().bold());
    }

    for report in &summary.categories {
        let status = match report.status {
            CategoryStatus::Completed => "completed".green(),
            CategoryStatus::Failed => "failed".red(),
            CategoryStatus::Aborted => "aborted".yellow(),
        };
        println!(
            "  {:<13} {status}  {}/{} synced{}",
            report.category.to_string(),
            report.synced,
            report.attempted,
            if report.skipped > 0 {
                format!(", {} skipped", report.skipped)
            } else {
                String::new()
            }
        );
    }

    for failure in &summary.errors {
        let id = failure.local_id.as_deref().unwrap_or("-");
        println!(
            "  {} [{}] {id}: {}",
            "!".red(),
            failure.category,
            failure.message.dimmed()
        );
    }
}
