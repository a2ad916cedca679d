//! Monthly forecast model.
//!
//! Forecasts are keyed by `(owner_id, month_index)`. The remote upsert uses
//! the same pair as its idempotency key, so replaying a forecast is safe.

use serde::{Deserialize, Serialize};

/// Forecast payload sent to the remote upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastFields {
    pub owner_id: String,
    /// Calendar month, 0 = January.
    pub month_index: u32,
    pub projected_income: f64,
    pub projected_expenses: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A forecast row in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingForecast {
    pub local_id: String,
    pub remote_id: Option<String>,
    pub owner_id: Option<String>,
    pub synced: bool,
    pub month_index: u32,
    pub projected_income: f64,
    pub projected_expenses: f64,
    pub note: Option<String>,
    pub created_at: i64,
}

impl PendingForecast {
    #[must_use]
    pub fn new(
        owner_id: Option<String>,
        month_index: u32,
        projected_income: f64,
        projected_expenses: f64,
    ) -> Self {
        Self {
            local_id: format!("fc_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
            remote_id: None,
            owner_id,
            synced: false,
            month_index,
            projected_income,
            projected_expenses,
            note: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[must_use]
    pub fn to_fields(&self, owner_id: &str) -> ForecastFields {
        ForecastFields {
            owner_id: owner_id.to_string(),
            month_index: self.month_index,
            projected_income: self.projected_income,
            projected_expenses: self.projected_expenses,
            note: self.note.clone(),
        }
    }

    /// The row as committed after a successful upsert.
    #[must_use]
    pub fn into_synced(self, owner_id: &str, remote_id: String) -> Self {
        Self {
            remote_id: Some(remote_id),
            owner_id: Some(owner_id.to_string()),
            synced: true,
            ..self
        }
    }

    /// Projected net for the month.
    #[must_use]
    pub fn projected_net(&self) -> f64 {
        self.projected_income - self.projected_expenses
    }
}
