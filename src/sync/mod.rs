//! Offline-to-online mutation sync.
//!
//! Rows written to the local store while offline are pushed to the remote
//! system of record once the device is online and an owner is known.
//!
//! # Architecture
//!
//! - [`ports`] - traits the engine consumes (local store, session, network,
//!   remote gateway, event bus, retry delay)
//! - [`identity`] - insert-versus-update rules for transactions
//! - [`coordinator`] - `SyncCoordinator::sync_all`, the single entry point
//! - [`service`] - lifecycle wrapper with fire-and-forget triggers
//! - [`events`] - event bus implementations
//! - [`types`] - triggers, policies and run summaries
//!
//! # Example
//!
//! ```ignore
//! use ledger_sync::sync::{SyncCoordinator, SyncService, Trigger};
//!
//! let coordinator = SyncCoordinator::new(store, gateway, sessions, network);
//! let service = SyncService::new(coordinator);
//! service.initialize()?;
//!
//! service.trigger(Trigger::OfflineWrite);
//! let summary = service.sync_now(Trigger::Manual).await;
//!
//! let drained = service.shutdown().await;
//! ```

pub mod coordinator;
pub mod events;
pub mod identity;
pub mod ports;
pub mod service;
pub mod types;

pub use coordinator::{DEFAULT_SESSION_ATTEMPTS, SyncCoordinator};
pub use events::{BroadcastEventBus, SyncEvent, TracingEventBus};
pub use identity::{
    ForecastPush, TransactionPlan, collapse_forecasts, is_canonical_id, plan_transaction,
};
pub use ports::{
    DelayStrategy, EventBus, FixedDelay, LocalRecordStore, NetworkStatusMonitor, NoDelay,
    RemoteMutationGateway, SessionProvider,
};
pub use service::SyncService;
pub use types::{
    Category, CategoryReport, CategoryStatus, SkipReason, SyncComplete, SyncFailure,
    SyncFailureEvent, SyncPolicy, SyncRunSummary, Trigger,
};
