//! Profile model. At most one profile exists per owner.

use serde::{Deserialize, Serialize};

/// Profile payload sent to the remote upsert (idempotent by owner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub owner_id: String,
    pub display_name: String,
    /// ISO 4217 code, upper case.
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<f64>,
}

/// A profile row in the local store, keyed by owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingProfile {
    pub owner_id: String,
    pub remote_id: Option<String>,
    pub synced: bool,
    pub display_name: String,
    pub currency: String,
    pub monthly_income: Option<f64>,
    /// Last local write (Unix milliseconds).
    pub updated_at: i64,
}

impl PendingProfile {
    #[must_use]
    pub fn new(owner_id: &str, display_name: &str, currency: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            remote_id: None,
            synced: false,
            display_name: display_name.to_string(),
            currency: currency.to_string(),
            monthly_income: None,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Upsert payload scoped to the resolved owner, not the stored one.
    #[must_use]
    pub fn to_fields(&self, owner_id: &str) -> ProfileFields {
        ProfileFields {
            owner_id: owner_id.to_string(),
            display_name: self.display_name.clone(),
            currency: self.currency.clone(),
            monthly_income: self.monthly_income,
        }
    }
}
