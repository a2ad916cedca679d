//! Ports the sync engine consumes.
//!
//! Async ports use `impl Future + Send` return types so a run can be spawned
//! onto the multi-threaded runtime. Implementations write them as `async fn`.
//! Synchronous ports are object-safe and held behind `Arc<dyn _>`.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::model::{
    ForecastFields, NewTransaction, PendingForecast, PendingProfile, PendingTransaction,
    ProfileFields, RemoteRecord, Session, TransactionFields,
};
use crate::sync::types::{SyncComplete, SyncFailureEvent};

/// Durable local persistence of pending mutations.
pub trait LocalRecordStore: Send + Sync {
    /// Unsynced transactions in the store's own order.
    fn get_unsynced_transactions(
        &self,
    ) -> impl Future<Output = Result<Vec<PendingTransaction>>> + Send;

    /// Map a locally created row onto its server-assigned id and mark it synced.
    fn mark_transaction_synced(
        &self,
        local_id: &str,
        remote_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Mark the row already holding `remote_id` as synced.
    fn mark_transaction_synced_by_id(&self, remote_id: &str)
    -> impl Future<Output = Result<()>> + Send;

    /// Delete every synced transaction row, returning how many were removed.
    fn delete_synced_transactions(&self) -> impl Future<Output = Result<usize>> + Send;

    fn get_profile(
        &self,
        owner_id: &str,
    ) -> impl Future<Output = Result<Option<PendingProfile>>> + Send;

    fn mark_profile_synced(
        &self,
        owner_id: &str,
        remote_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get_unsynced_forecasts(&self) -> impl Future<Output = Result<Vec<PendingForecast>>> + Send;

    /// Create or replace a forecast row. Also the forecast sync commit point.
    fn save_forecast(&self, forecast: &PendingForecast) -> impl Future<Output = Result<()>> + Send;

    /// Remove unsynced forecasts superseded by a newer row for the same
    /// `(owner, month)`. Synced rows are never removed.
    fn discard_forecasts(&self, local_ids: &[String]) -> impl Future<Output = Result<usize>> + Send;
}

/// Resolves the currently authenticated owner.
///
/// May return `Ok(None)` for a while after process start.
pub trait SessionProvider: Send + Sync {
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>>> + Send;
}

/// Synchronous connectivity snapshot.
pub trait NetworkStatusMonitor: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Writes against the remote system of record.
pub trait RemoteMutationGateway: Send + Sync {
    /// Insert a transaction; the response carries the canonical id.
    fn insert_transaction(
        &self,
        tx: &NewTransaction,
    ) -> impl Future<Output = Result<RemoteRecord>> + Send;

    fn update_transaction_by_id(
        &self,
        remote_id: &str,
        fields: &TransactionFields,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Upsert by owner. `None` means the remote accepted the write but
    /// returned no record.
    fn upsert_profile(
        &self,
        profile: &ProfileFields,
    ) -> impl Future<Output = Result<Option<RemoteRecord>>> + Send;

    /// Upsert by `(owner_id, month_index)`.
    fn upsert_forecast(
        &self,
        forecast: &ForecastFields,
    ) -> impl Future<Output = Result<RemoteRecord>> + Send;
}

/// Coarse lifecycle notifications for observers.
pub trait EventBus: Send + Sync {
    fn emit_sync_complete(&self, event: SyncComplete);
    fn emit_sync_error(&self, event: SyncFailureEvent);
}

/// Delay between session resolution attempts.
pub trait DelayStrategy: Send + Sync {
    /// Delay after the failed attempt number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// The same delay after every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(Duration::from_secs(2))
    }
}

impl DelayStrategy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// No delay at all. Used by tests and one-shot commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayStrategy for NoDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}
