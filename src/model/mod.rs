//! Data models for ledger-sync.
//!
//! This module contains the locally persisted rows and the payloads sent to
//! the remote system of record:
//! - Transaction
//! - Profile
//! - Forecast

pub mod forecast;
pub mod profile;
pub mod transaction;

use serde::{Deserialize, Serialize};

pub use forecast::{ForecastFields, PendingForecast};
pub use profile::{PendingProfile, ProfileFields};
pub use transaction::{NewTransaction, PendingTransaction, TransactionFields, TransactionKind};

/// Canonical record returned by the remote after a write.
///
/// Only the identifier matters to the sync engine; any other columns the
/// server echoes back are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
}

impl RemoteRecord {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Authenticated owner resolved from the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub owner_id: String,
}
