//! Transaction model.
//!
//! A transaction is written locally first and carries two identities: the
//! client-generated `local_id` and, once the remote has accepted it, the
//! server-assigned `remote_id`.

use serde::{Deserialize, Serialize};

/// Direction of money flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    #[default]
    Expense,
}

impl TransactionKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {s}")),
        }
    }
}

/// Entity payload of a transaction, as sent to the remote.
///
/// Deliberately carries no identity or ownership fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFields {
    pub amount: f64,
    pub category: String,
    pub kind: TransactionKind,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Insert payload: the fields plus the resolved owner and creation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    pub owner_id: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    #[serde(flatten)]
    pub fields: TransactionFields,
}

/// A transaction row in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Client-generated identifier; never leaves the device.
    pub local_id: String,
    /// Server-assigned identifier, once confirmed.
    pub remote_id: Option<String>,
    /// Owner at write time, if one was known.
    pub owner_id: Option<String>,
    pub synced: bool,
    #[serde(flatten)]
    pub fields: TransactionFields,
    /// Creation timestamp (Unix milliseconds), if recorded.
    pub created_at: Option<i64>,
}

impl PendingTransaction {
    /// Create an unsynced row with a fresh local identifier.
    #[must_use]
    pub fn new(owner_id: Option<String>, fields: TransactionFields) -> Self {
        Self {
            local_id: new_local_id(),
            remote_id: None,
            owner_id,
            synced: false,
            fields,
            created_at: Some(chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Build the insert payload for `owner_id`.
    ///
    /// The stored creation time is reused when present, otherwise "now".
    #[must_use]
    pub fn to_insert(&self, owner_id: &str) -> NewTransaction {
        let created_at = self
            .created_at
            .and_then(chrono::DateTime::from_timestamp_millis)
            .unwrap_or_else(chrono::Utc::now)
            .to_rfc3339();

        NewTransaction {
            owner_id: owner_id.to_string(),
            created_at,
            fields: self.fields.clone(),
        }
    }
}

/// Generate a local transaction identifier (`tmp_` + 12 hex chars).
#[must_use]
pub fn new_local_id() -> String {
    format!("tmp_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> TransactionFields {
        TransactionFields {
            amount: 120.0,
            category: "Food".to_string(),
            kind: TransactionKind::Expense,
            date: "2026-10-01".to_string(),
            note: None,
        }
    }

    #[test]
    fn test_new_transaction_is_unsynced() {
        let tx = PendingTransaction::new(None, fields());
        assert!(tx.local_id.starts_with("tmp_"));
        assert_eq!(tx.local_id.len(), 16);
        assert!(!tx.synced);
        assert!(tx.remote_id.is_none());
    }

    #[test]
    fn test_insert_payload_has_no_local_id() {
        let mut tx = PendingTransaction::new(Some("stale-owner".into()), fields());
        tx.created_at = Some(1_700_000_000_000);

        let insert = tx.to_insert("u1");
        let json = serde_json::to_value(&insert).unwrap();

        assert_eq!(json["owner_id"], "u1");
        assert_eq!(json["amount"], 120.0);
        assert_eq!(json["category"], "Food");
        assert!(json.get("local_id").is_none());
        assert!(!json.to_string().contains(&tx.local_id));
        assert!(insert.created_at.starts_with("2023-11-14"));
    }

    #[test]
    fn test_insert_payload_defaults_created_at_to_now() {
        let mut tx = PendingTransaction::new(None, fields());
        tx.created_at = None;
        let insert = tx.to_insert("u1");
        assert!(chrono::DateTime::parse_from_rfc3339(&insert.created_at).is_ok());
    }
}
