//! SQLite storage layer for ledger-sync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Audit events for history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation
//!
//! [`LocalStore`] adapts [`SqliteStorage`] to the sync engine's
//! [`LocalRecordStore`] port. Port calls run on tokio's blocking pool.

pub mod events;
pub mod schema;
pub mod sqlite;

use std::sync::{Arc, Mutex};

pub use sqlite::{MutationContext, PendingCounts, SqliteStorage};

use crate::error::{Error, Result};
use crate::model::{PendingForecast, PendingProfile, PendingTransaction};
use crate::sync::LocalRecordStore;

/// Actor recorded on audit events written by the sync engine.
pub const SYNC_ACTOR: &str = "sync";

/// Shared handle to the local database.
///
/// Cloning is cheap; all clones use the same connection. Writes are
/// serialized by the connection lock and by SQLite's IMMEDIATE transactions.
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<Mutex<SqliteStorage>>,
}

impl LocalStore {
    #[must_use]
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    /// Run `f` with exclusive access to the storage.
    ///
    /// The lock is never held across an await point.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or an error if the lock is poisoned.
    pub fn with<T>(&self, f: impl FnOnce(&mut SqliteStorage) -> Result<T>) -> Result<T> {
        let mut storage = self
            .inner
            .lock()
            .map_err(|_| Error::Other("local store lock poisoned".to_string()))?;
        f(&mut storage)
    }
}

impl LocalStore {
    /// Run `f` on tokio's blocking pool so rusqlite never stalls a runtime
    /// worker.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteStorage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with(f))
            .await
            .map_err(|e| Error::Other(format!("local store task failed: {e}")))?
    }
}

impl LocalRecordStore for LocalStore {
    async fn get_unsynced_transactions(&self) -> Result<Vec<PendingTransaction>> {
        self.blocking(|s| s.get_unsynced_transactions()).await
    }

    async fn mark_transaction_synced(&self, local_id: &str, remote_id: &str) -> Result<()> {
        let (local_id, remote_id) = (local_id.to_owned(), remote_id.to_owned());
        self.blocking(move |s| s.mark_transaction_synced(&local_id, &remote_id, SYNC_ACTOR))
            .await
    }

    async fn mark_transaction_synced_by_id(&self, remote_id: &str) -> Result<()> {
        let remote_id = remote_id.to_owned();
        self.blocking(move |s| s.mark_transaction_synced_by_id(&remote_id, SYNC_ACTOR))
            .await
            .map(|_| ())
    }

    async fn delete_synced_transactions(&self) -> Result<usize> {
        self.blocking(|s| s.delete_synced_transactions(SYNC_ACTOR))
            .await
    }

    async fn get_profile(&self, owner_id: &str) -> Result<Option<PendingProfile>> {
        let owner_id = owner_id.to_owned();
        self.blocking(move |s| s.get_profile(&owner_id)).await
    }

    async fn mark_profile_synced(&self, owner_id: &str, remote_id: &str) -> Result<()> {
        let (owner_id, remote_id) = (owner_id.to_owned(), remote_id.to_owned());
        self.blocking(move |s| s.mark_profile_synced(&owner_id, &remote_id, SYNC_ACTOR))
            .await
    }

    async fn get_unsynced_forecasts(&self) -> Result<Vec<PendingForecast>> {
        self.blocking(|s| s.get_unsynced_forecasts()).await
    }

    async fn save_forecast(&self, forecast: &PendingForecast) -> Result<()> {
        let forecast = forecast.clone();
        self.blocking(move |s| s.save_forecast(&forecast, SYNC_ACTOR))
            .await
    }

    async fn discard_forecasts(&self, local_ids: &[String]) -> Result<usize> {
        let local_ids = local_ids.to_vec();
        self.blocking(move |s| s.discard_forecasts(&local_ids, SYNC_ACTOR))
            .await
    }
}
