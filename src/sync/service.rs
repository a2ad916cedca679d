//! Explicitly owned sync service.
//!
//! Startup constructs one [`SyncService`] around a coordinator and passes it
//! to whatever needs to request a sync. Triggers are fire-and-forget: the
//! run is spawned and the caller moves on. [`SyncService::shutdown`] stops
//! accepting triggers and waits for runs already spawned.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::coordinator::SyncCoordinator;
use super::ports::{LocalRecordStore, RemoteMutationGateway, SessionProvider};
use super::types::{SyncRunSummary, Trigger};
use crate::error::{Error, Result};

pub struct SyncService<L, R, S> {
    coordinator: Arc<SyncCoordinator<L, R, S>>,
    runs: Mutex<Runs>,
}

/// Background runs and the runtime they are spawned on. The service accepts
/// triggers while `handle` is set; both live under one lock so a shutdown
/// cannot slip between the check and the spawn.
#[derive(Default)]
struct Runs {
    handle: Option<Handle>,
    tasks: JoinSet<SyncRunSummary>,
}

impl Runs {
    /// Collect runs that already finished so the set only holds live ones.
    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            match joined {
                Ok(summary) => debug!(
                    trigger = %summary.trigger,
                    skipped = summary.skipped,
                    succeeded = summary.success_count,
                    failed = summary.failure_count,
                    "Background sync finished"
                ),
                Err(e) => warn!(error = %e, "Background sync task did not finish"),
            }
        }
    }
}

impl<L, R, S> SyncService<L, R, S>
where
    L: LocalRecordStore + 'static,
    R: RemoteMutationGateway + 'static,
    S: SessionProvider + 'static,
{
    #[must_use]
    pub fn new(coordinator: SyncCoordinator<L, R, S>) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            runs: Mutex::new(Runs::default()),
        }
    }

    #[must_use]
    pub fn coordinator(&self) -> &SyncCoordinator<L, R, S> {
        &self.coordinator
    }

    /// Start accepting triggers on the current tokio runtime.
    ///
    /// Idempotent: calling it again while running is a no-op. A service
    /// that was shut down can be initialized again.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn initialize(&self) -> Result<()> {
        let mut runs = self.lock_runs()?;
        if runs.handle.is_some() {
            return Ok(());
        }

        let handle = Handle::try_current()
            .map_err(|e| Error::Other(format!("sync service needs a tokio runtime: {e}")))?;

        runs.handle = Some(handle);
        info!(policy = %self.coordinator.policy(), "Sync service initialized");
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lock_runs().is_ok_and(|runs| runs.handle.is_some())
    }

    /// Request a background run. Returns `false` if the trigger was ignored
    /// because the service is not initialized.
    ///
    /// The run may still be skipped by the coordinator's own guards. Runs
    /// that finished since the last trigger are collected first.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        let Ok(mut runs) = self.lock_runs() else {
            return false;
        };
        if runs.handle.is_none() {
            debug!(%trigger, "Sync service not running, ignoring trigger");
            return false;
        }

        runs.reap();

        let Runs {
            handle: Some(handle),
            tasks,
        } = &mut *runs
        else {
            return false;
        };
        let coordinator = Arc::clone(&self.coordinator);
        tasks.spawn_on(async move { coordinator.sync_all(trigger).await }, handle);
        debug!(%trigger, "Sync triggered");
        true
    }

    /// Run a sync and wait for its summary.
    pub async fn sync_now(&self, trigger: Trigger) -> SyncRunSummary {
        self.coordinator.sync_all(trigger).await
    }

    /// Stop accepting triggers and wait for spawned runs to finish.
    ///
    /// Returns the summaries of runs not already collected by a later
    /// trigger. Idempotent: a second call returns an empty list.
    pub async fn shutdown(&self) -> Vec<SyncRunSummary> {
        let mut pending = match self.lock_runs() {
            Ok(mut runs) => {
                runs.handle = None;
                std::mem::take(&mut runs.tasks)
            }
            Err(_) => return Vec::new(),
        };

        let mut summaries = Vec::with_capacity(pending.len());
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!(error = %e, "Background sync task did not finish"),
            }
        }

        if !summaries.is_empty() {
            debug!(runs = summaries.len(), "Drained background sync runs");
        }
        summaries
    }

    fn lock_runs(&self) -> Result<MutexGuard<'_, Runs>> {
        self.runs
            .lock()
            .map_err(|_| Error::Other("sync service lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ForecastFields, NewTransaction, PendingForecast, PendingProfile, PendingTransaction,
        ProfileFields, RemoteRecord, Session, TransactionFields,
    };
    use crate::sync::ports::{NetworkStatusMonitor, NoDelay};
    use crate::sync::types::SkipReason;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EmptyStore;

    impl LocalRecordStore for EmptyStore {
        async fn get_unsynced_transactions(&self) -> Result<Vec<PendingTransaction>> {
            Ok(Vec::new())
        }
        async fn mark_transaction_synced(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        async fn mark_transaction_synced_by_id(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn delete_synced_transactions(&self) -> Result<usize> {
            Ok(0)
        }
        async fn get_profile(&self, _: &str) -> Result<Option<PendingProfile>> {
            Ok(None)
        }
        async fn mark_profile_synced(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        async fn get_unsynced_forecasts(&self) -> Result<Vec<PendingForecast>> {
            Ok(Vec::new())
        }
        async fn save_forecast(&self, _: &PendingForecast) -> Result<()> {
            Ok(())
        }
        async fn discard_forecasts(&self, _: &[String]) -> Result<usize> {
            Ok(0)
        }
    }

    struct UnusedGateway;

    impl RemoteMutationGateway for UnusedGateway {
        async fn insert_transaction(&self, _: &NewTransaction) -> Result<RemoteRecord> {
            Err(Error::Other("unexpected insert".into()))
        }
        async fn update_transaction_by_id(&self, _: &str, _: &TransactionFields) -> Result<()> {
            Err(Error::Other("unexpected update".into()))
        }
        async fn upsert_profile(&self, _: &ProfileFields) -> Result<Option<RemoteRecord>> {
            Err(Error::Other("unexpected profile".into()))
        }
        async fn upsert_forecast(&self, _: &ForecastFields) -> Result<RemoteRecord> {
            Err(Error::Other("unexpected forecast".into()))
        }
    }

    #[derive(Default)]
    struct CountingSessions(AtomicUsize);

    impl SessionProvider for CountingSessions {
        async fn get_session(&self) -> Result<Option<Session>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Session {
                owner_id: "u1".to_string(),
            }))
        }
    }

    struct Online(bool);

    impl NetworkStatusMonitor for Online {
        fn is_online(&self) -> bool {
            self.0
        }
    }

    fn service(online: bool) -> SyncService<EmptyStore, UnusedGateway, CountingSessions> {
        SyncService::new(
            SyncCoordinator::new(
                EmptyStore,
                UnusedGateway,
                CountingSessions::default(),
                Arc::new(Online(online)),
            )
            .with_delay(Arc::new(NoDelay)),
        )
    }

    #[tokio::test]
    async fn test_trigger_before_initialize_is_ignored() {
        let service = service(true);
        assert!(!service.trigger(Trigger::Manual));
        assert!(service.shutdown().await.is_empty());
    }

    #[tokio::test]
    async fn test_triggers_are_drained_on_shutdown() {
        let service = service(true);
        service.initialize().unwrap();
        service.initialize().unwrap();
        assert!(service.is_initialized());

        assert!(service.trigger(Trigger::OfflineWrite));
        let summaries = service.shutdown().await;

        assert_eq!(summaries.len(), 1);
        assert!(!summaries[0].skipped);
        assert_eq!(summaries[0].trigger, Trigger::OfflineWrite);

        // Shut down: further triggers are ignored, second shutdown is empty
        assert!(!service.trigger(Trigger::Manual));
        assert!(service.shutdown().await.is_empty());
    }

    fn held_tasks<L, R, S>(service: &SyncService<L, R, S>) -> usize {
        service.runs.lock().unwrap().tasks.len()
    }

    #[tokio::test]
    async fn test_finished_runs_are_reaped_on_trigger() {
        let service = service(false);
        service.initialize().unwrap();

        for _ in 0..200 {
            assert!(service.trigger(Trigger::Focus));
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(service.trigger(Trigger::Focus));
        assert_eq!(held_tasks(&service), 1);
        assert_eq!(service.shutdown().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_drains_every_accepted_trigger() {
        for _ in 0..50 {
            let service = Arc::new(service(false));
            service.initialize().unwrap();

            let triggering = Arc::clone(&service);
            let worker = std::thread::spawn(move || while triggering.trigger(Trigger::Visible) {});

            tokio::time::sleep(Duration::from_millis(1)).await;
            service.shutdown().await;
            worker.join().unwrap();

            // A trigger accepted concurrently with shutdown must not be left behind
            assert_eq!(held_tasks(&service), 0);
            assert!(!service.is_initialized());
        }
    }

    #[tokio::test]
    async fn test_sync_now_reports_offline() {
        let service = service(false);
        let summary = service.sync_now(Trigger::Manual).await;
        assert_eq!(summary.skip_reason, Some(SkipReason::Offline));
    }

    #[test]
    fn test_initialize_outside_runtime_fails() {
        let service = service(true);
        assert!(service.initialize().is_err());
        assert!(!service.is_initialized());
    }
}
