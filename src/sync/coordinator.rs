//! The sync coordinator.
//!
//! [`SyncCoordinator::sync_all`] is the single entry point. One run:
//!
//! 1. Skips when offline, when another run is active, or when no owner can
//!    be resolved after a bounded number of attempts.
//! 2. Pushes transactions, the profile and forecasts. Under
//!    [`SyncPolicy::BestEffort`] the three routines run concurrently and
//!    each outcome is recorded on its own; under [`SyncPolicy::FailFast`]
//!    they run in order and the first failure stops the rest.
//! 3. Prunes synced transactions if any category completed, then emits
//!    `sync-complete` and, when anything failed, `sync-error`.
//!
//! Row failures never escape their category routine and nothing here is
//! fatal: every failed row stays pending for the next trigger.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::identity::{
    ForecastPush, TransactionPlan, belongs_to, collapse_forecasts, is_canonical_id,
    plan_transaction,
};
use super::ports::{
    DelayStrategy, EventBus, FixedDelay, LocalRecordStore, NetworkStatusMonitor,
    RemoteMutationGateway, SessionProvider,
};
use super::types::{
    Category, CategoryReport, SkipReason, SyncComplete, SyncFailureEvent, SyncPolicy,
    SyncRunSummary, Trigger,
};
use crate::error::{Error, Result};
use crate::model::{PendingProfile, PendingTransaction};

/// Default number of session resolution attempts per run.
pub const DEFAULT_SESSION_ATTEMPTS: u32 = 3;

/// Orchestrates one sync run at a time across all entity categories.
pub struct SyncCoordinator<L, R, S> {
    store: L,
    gateway: R,
    sessions: S,
    network: Arc<dyn NetworkStatusMonitor>,
    events: Option<Arc<dyn EventBus>>,
    delay: Arc<dyn DelayStrategy>,
    policy: SyncPolicy,
    session_attempts: u32,
    running: AtomicBool,
}

/// Clears the single-flight flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<L, R, S> SyncCoordinator<L, R, S>
where
    L: LocalRecordStore,
    R: RemoteMutationGateway,
    S: SessionProvider,
{
    /// Create a coordinator with the default policy, delay and attempts and
    /// no event bus.
    pub fn new(store: L, gateway: R, sessions: S, network: Arc<dyn NetworkStatusMonitor>) -> Self {
        Self {
            store,
            gateway,
            sessions,
            network,
            events: None,
            delay: Arc::new(FixedDelay::default()),
            policy: SyncPolicy::default(),
            session_attempts: DEFAULT_SESSION_ATTEMPTS,
            running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Arc<dyn DelayStrategy>) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attempts to resolve a session per run. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_session_attempts(mut self, attempts: u32) -> Self {
        self.session_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// True while a run holds the single-flight flag.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn store(&self) -> &L {
        &self.store
    }

    /// Run one sync pass.
    ///
    /// Overlapping calls are dropped, not queued: a call made while another
    /// run is active returns immediately with [`SkipReason::InProgress`].
    pub async fn sync_all(&self, trigger: Trigger) -> SyncRunSummary {
        let started_at = Utc::now();

        if !self.network.is_online() {
            debug!(%trigger, "Offline, skipping sync");
            return SyncRunSummary::skipped(trigger, started_at, SkipReason::Offline);
        }

        let Some(_guard) = RunGuard::acquire(&self.running) else {
            debug!(%trigger, "Sync already running, dropping trigger");
            return SyncRunSummary::skipped(trigger, started_at, SkipReason::InProgress);
        };

        let Some(owner) = self.wait_for_session().await else {
            info!(%trigger, attempts = self.session_attempts, "No session, skipping sync");
            return SyncRunSummary::skipped(trigger, started_at, SkipReason::NoSession);
        };

        debug!(%trigger, policy = %self.policy, "Sync started");

        let reports = match self.policy {
            SyncPolicy::BestEffort => self.run_best_effort(&owner).await,
            SyncPolicy::FailFast => self.run_fail_fast(&owner).await,
        };

        let mut summary = SyncRunSummary::from_reports(trigger, started_at, reports);

        if summary.any_completed() {
            match self.store.delete_synced_transactions().await {
                Ok(pruned) => debug!(pruned, "Pruned synced transactions"),
                Err(e) => warn!(error = %e, "Cleanup of synced transactions failed"),
            }
        }

        summary.finished_at = Utc::now();
        self.emit(&summary);

        info!(
            %trigger,
            total = summary.total_count,
            succeeded = summary.success_count,
            failed = summary.failure_count,
            "Sync finished"
        );

        summary
    }

    /// Resolve the owner with a bounded number of attempts.
    ///
    /// A provider error counts as an unresolved attempt. The delay runs
    /// between attempts, never after the last one.
    async fn wait_for_session(&self) -> Option<String> {
        let attempts = self.session_attempts.max(1);

        for attempt in 1..=attempts {
            match self.sessions.get_session().await {
                Ok(Some(session)) if !session.owner_id.is_empty() => {
                    return Some(session.owner_id);
                }
                Ok(_) => debug!(attempt, "Session not available yet"),
                Err(e) => warn!(attempt, error = %e, "Session lookup failed"),
            }

            if attempt < attempts {
                let delay = self.delay.delay(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        None
    }

    async fn run_best_effort(&self, owner: &str) -> Vec<CategoryReport> {
        let (transactions, profile, forecasts) = tokio::join!(
            self.sync_transactions(owner),
            self.sync_profile(owner),
            self.sync_forecasts(owner),
        );
        vec![transactions, profile, forecasts]
    }

    async fn run_fail_fast(&self, owner: &str) -> Vec<CategoryReport> {
        let mut reports = Vec::with_capacity(Category::ALL.len());
        let mut halted = false;

        for category in Category::ALL {
            if halted {
                reports.push(CategoryReport::aborted(category));
                continue;
            }

            let report = match category {
                Category::Transactions => self.sync_transactions(owner).await,
                Category::Profile => self.sync_profile(owner).await,
                Category::Forecasts => self.sync_forecasts(owner).await,
            };

            if report.has_failures() {
                warn!(%category, "Category failed, aborting remaining categories");
                halted = true;
            }
            reports.push(report);
        }

        reports
    }

    // ============
    // Transactions
    // ============

    async fn sync_transactions(&self, owner: &str) -> CategoryReport {
        let rows = match self.store.get_unsynced_transactions().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Could not load unsynced transactions");
                return CategoryReport::failed(Category::Transactions, &e);
            }
        };

        let mut report = CategoryReport::new(Category::Transactions);

        for tx in rows {
            if !belongs_to(tx.owner_id.as_deref(), owner) {
                debug!(local_id = %tx.local_id, "Transaction belongs to another owner, skipping");
                report.record_skip();
                continue;
            }

            let plan = plan_transaction(&tx);
            let path = match plan {
                TransactionPlan::Update { .. } => "update",
                TransactionPlan::Insert => "insert",
            };

            let result = match plan {
                TransactionPlan::Update { remote_id } => self.update_transaction(&remote_id, &tx).await,
                TransactionPlan::Insert => self.insert_transaction(&tx, owner).await,
            };

            match result {
                Ok(()) => report.record_success(),
                Err(e) => {
                    warn!(local_id = %tx.local_id, path, error = %e, "Transaction sync failed");
                    report.record_failure(&tx.local_id, &e);
                }
            }
        }

        report
    }

    async fn insert_transaction(&self, tx: &PendingTransaction, owner: &str) -> Result<()> {
        let record = self.gateway.insert_transaction(&tx.to_insert(owner)).await?;
        if record.id.is_empty() {
            return Err(Error::MissingRecord("transaction insert".to_string()));
        }
        if !is_canonical_id(&record.id) {
            warn!(local_id = %tx.local_id, remote_id = %record.id, "Remote assigned a non-canonical id");
        }
        self.store
            .mark_transaction_synced(&tx.local_id, &record.id)
            .await
    }

    async fn update_transaction(&self, remote_id: &str, tx: &PendingTransaction) -> Result<()> {
        self.gateway
            .update_transaction_by_id(remote_id, &tx.fields)
            .await?;
        self.store.mark_transaction_synced_by_id(remote_id).await
    }

    // =======
    // Profile
    // =======

    async fn sync_profile(&self, owner: &str) -> CategoryReport {
        let profile = match self.store.get_profile(owner).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Could not load profile");
                return CategoryReport::failed(Category::Profile, &e);
            }
        };

        let mut report = CategoryReport::new(Category::Profile);
        let Some(profile) = profile.filter(|p| !p.synced) else {
            return report;
        };

        match self.push_profile(&profile, owner).await {
            Ok(()) => report.record_success(),
            Err(e) => {
                warn!(owner_id = %owner, error = %e, "Profile sync failed");
                report.record_failure(&profile.owner_id, &e);
            }
        }

        report
    }

    async fn push_profile(&self, profile: &PendingProfile, owner: &str) -> Result<()> {
        let record = self
            .gateway
            .upsert_profile(&profile.to_fields(owner))
            .await?;
        let Some(record) = record.filter(|r| !r.id.is_empty()) else {
            return Err(Error::MissingRecord("profile upsert".to_string()));
        };
        self.store.mark_profile_synced(owner, &record.id).await
    }

    // =========
    // Forecasts
    // =========

    async fn sync_forecasts(&self, owner: &str) -> CategoryReport {
        let rows = match self.store.get_unsynced_forecasts().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Could not load unsynced forecasts");
                return CategoryReport::failed(Category::Forecasts, &e);
            }
        };

        let mut report = CategoryReport::new(Category::Forecasts);
        let mut owned = Vec::with_capacity(rows.len());

        for forecast in rows {
            if belongs_to(forecast.owner_id.as_deref(), owner) {
                owned.push(forecast);
            } else {
                debug!(local_id = %forecast.local_id, "Forecast belongs to another owner, skipping");
                report.record_skip();
            }
        }

        for push in collapse_forecasts(owned) {
            let local_id = push.forecast.local_id.clone();
            match self.push_forecast(push, owner).await {
                Ok(()) => report.record_success(),
                Err(e) => {
                    warn!(local_id = %local_id, error = %e, "Forecast sync failed");
                    report.record_failure(&local_id, &e);
                }
            }
        }

        report
    }

    /// Upsert the newest row for a month, then drop the rows it supersedes
    /// and commit it as synced. Superseded rows are only removed once the
    /// remote has accepted the newer value.
    async fn push_forecast(&self, push: ForecastPush, owner: &str) -> Result<()> {
        let ForecastPush {
            forecast,
            superseded,
        } = push;

        let record = self
            .gateway
            .upsert_forecast(&forecast.to_fields(owner))
            .await?;
        if record.id.is_empty() {
            return Err(Error::MissingRecord("forecast upsert".to_string()));
        }

        if !superseded.is_empty() {
            let discarded = self.store.discard_forecasts(&superseded).await?;
            debug!(local_id = %forecast.local_id, discarded, "Discarded superseded forecasts");
        }

        self.store
            .save_forecast(&forecast.into_synced(owner, record.id))
            .await
    }

    fn emit(&self, summary: &SyncRunSummary) {
        let Some(events) = &self.events else {
            return;
        };

        events.emit_sync_complete(SyncComplete {
            success_count: summary.success_count,
            total_count: summary.total_count,
        });

        if summary.has_failures() {
            let failed: Vec<String> = summary
                .categories
                .iter()
                .filter(|c| c.has_failures())
                .map(|c| c.category.to_string())
                .collect();

            events.emit_sync_error(SyncFailureEvent {
                message: format!(
                    "{} sync failure(s) in {}",
                    summary.failure_count,
                    failed.join(", ")
                ),
                cause: summary.errors.first().map(|e| e.message.clone()),
            });
        }
    }
}
