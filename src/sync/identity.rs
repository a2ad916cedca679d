//! Identity reconciliation between local and server-assigned keys.
//!
//! A transaction row reaches the remote by exactly one of two paths per run:
//! it is *updated* in place when it already carries a canonical server id and
//! is not yet synced, and *inserted* otherwise.
//!
//! Forecasts are keyed by `(owner, month)`. Once unowned rows are adopted by
//! the session owner, several pending rows can share one key; only the
//! newest of them is pushed.

use crate::model::{PendingForecast, PendingTransaction};

/// Length of the hyphenated textual UUID form (8-4-4-4-12).
const CANONICAL_LEN: usize = 36;

/// True if `id` is a canonical identifier: a 128-bit UUID in the standard
/// hyphenated form.
///
/// Braced, URN and simple (unhyphenated) forms are rejected even though they
/// encode a UUID, since the remote only ever hands out the hyphenated form.
#[must_use]
pub fn is_canonical_id(id: &str) -> bool {
    id.len() == CANONICAL_LEN && uuid::Uuid::try_parse(id).is_ok()
}

/// Path a pending transaction takes to the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionPlan {
    /// Update the existing remote row addressed by this id.
    Update { remote_id: String },
    /// Insert a new remote row; the server assigns the id.
    Insert,
}

/// Decide the path for one row.
#[must_use]
pub fn plan_transaction(tx: &PendingTransaction) -> TransactionPlan {
    match tx.remote_id.as_deref() {
        Some(id) if is_canonical_id(id) && !tx.synced => TransactionPlan::Update {
            remote_id: id.to_string(),
        },
        _ => TransactionPlan::Insert,
    }
}

/// True if a row may be sent under `owner`.
///
/// Rows written before any owner was known are adopted by the current one.
#[must_use]
pub fn belongs_to(row_owner: Option<&str>, owner: &str) -> bool {
    row_owner.is_none_or(|o| o == owner)
}

/// One forecast upsert for a month, with the older pending rows it replaces.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPush {
    pub forecast: PendingForecast,
    /// Local ids of pending rows for the same month with older values.
    pub superseded: Vec<String>,
}

/// Group pending forecasts of a single owner by month and keep the newest
/// row of each group. Groups keep the order their month first appears in.
///
/// On equal `created_at` the row later in `rows` wins.
#[must_use]
pub fn collapse_forecasts(rows: Vec<PendingForecast>) -> Vec<ForecastPush> {
    let mut pushes: Vec<ForecastPush> = Vec::new();

    for row in rows {
        let Some(push) = pushes
            .iter_mut()
            .find(|p| p.forecast.month_index == row.month_index)
        else {
            pushes.push(ForecastPush {
                forecast: row,
                superseded: Vec::new(),
            });
            continue;
        };

        if row.created_at >= push.forecast.created_at {
            let older = std::mem::replace(&mut push.forecast, row);
            push.superseded.push(older.local_id);
        } else {
            push.superseded.push(row.local_id);
        }
    }

    pushes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TransactionFields, TransactionKind};

    fn forecast(owner: Option<&str>, month: u32, income: f64, created_at: i64) -> PendingForecast {
        let mut f = PendingForecast::new(owner.map(String::from), month, income, 0.0);
        f.created_at = created_at;
        f
    }

    fn row(remote_id: Option<&str>, synced: bool) -> PendingTransaction {
        let mut tx = PendingTransaction::new(
            None,
            TransactionFields {
                amount: 1.0,
                category: "Misc".to_string(),
                kind: TransactionKind::Expense,
                date: "2026-01-01".to_string(),
                note: None,
            },
        );
        tx.remote_id = remote_id.map(String::from);
        tx.synced = synced;
        tx
    }

    #[test]
    fn test_canonical_id_forms() {
        assert!(is_canonical_id("22222222-2222-2222-2222-222222222222"));
        assert!(is_canonical_id("3F2B8C1E-9A4D-4E6F-8B21-7C5D0E9F1A23"));

        assert!(!is_canonical_id(""));
        assert!(!is_canonical_id("tmp_1a2b3c4d5e6f"));
        assert!(!is_canonical_id("22222222222222222222222222222222"));
        assert!(!is_canonical_id("{22222222-2222-2222-2222-222222222222}"));
        assert!(!is_canonical_id("urn:uuid:22222222-2222-2222-2222-222222222222"));
        assert!(!is_canonical_id("2222222g-2222-2222-2222-222222222222"));
    }

    #[test]
    fn test_plan_update_requires_canonical_id_and_unsynced() {
        let id = "22222222-2222-2222-2222-222222222222";
        assert_eq!(
            plan_transaction(&row(Some(id), false)),
            TransactionPlan::Update {
                remote_id: id.to_string()
            }
        );
        assert_eq!(plan_transaction(&row(None, false)), TransactionPlan::Insert);
        assert_eq!(
            plan_transaction(&row(Some("legacy-42"), false)),
            TransactionPlan::Insert
        );
    }

    #[test]
    fn test_plan_synced_row_is_never_an_update() {
        let id = "22222222-2222-2222-2222-222222222222";
        assert_eq!(plan_transaction(&row(Some(id), true)), TransactionPlan::Insert);
    }

    #[test]
    fn test_belongs_to() {
        assert!(belongs_to(None, "u1"));
        assert!(belongs_to(Some("u1"), "u1"));
        assert!(!belongs_to(Some("u2"), "u1"));
    }

    #[test]
    fn test_collapse_keeps_newest_row_per_month() {
        let unowned = forecast(None, 5, 100.0, 1);
        let edited = forecast(Some("u1"), 5, 200.0, 2);
        let june = forecast(None, 6, 50.0, 3);

        let pushes = collapse_forecasts(vec![unowned.clone(), june.clone(), edited.clone()]);

        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[0].forecast, edited);
        assert_eq!(pushes[0].superseded, vec![unowned.local_id]);
        assert_eq!(pushes[1].forecast, june);
        assert!(pushes[1].superseded.is_empty());
    }

    #[test]
    fn test_collapse_older_row_later_in_input_is_superseded() {
        let newer = forecast(None, 2, 300.0, 10);
        let older = forecast(Some("u1"), 2, 100.0, 4);

        let pushes = collapse_forecasts(vec![newer.clone(), older.clone()]);

        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].forecast, newer);
        assert_eq!(pushes[0].superseded, vec![older.local_id]);
    }
}
