//! SQLite storage implementation.
//!
//! This module provides the local record store for ledger-sync using SQLite.
//! Every write goes through [`SqliteStorage::mutate`] so the row change and
//! its audit events commit together.

use crate::error::{Error, Result};
use crate::model::{PendingForecast, PendingProfile, PendingTransaction, TransactionFields};
use crate::storage::events::{Event, EventType, get_events, insert_event};
use crate::storage::schema::apply_schema;
use crate::sync::identity::is_canonical_id;
use crate::sync::types::SyncRunSummary;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, collecting audit events.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (`cli`, `sync`, ...).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(&self.op_name));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value)
                .with_comment(&self.op_name),
        );
    }
}

/// Counts of rows still waiting for the remote.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PendingCounts {
    /// Unsynced transactions.
    pub transactions: usize,
    /// Synced transactions not yet pruned.
    pub synced_transactions: usize,
    /// Unsynced profiles.
    pub profiles: usize,
    /// Unsynced forecasts.
    pub forecasts: usize,
}

impl PendingCounts {
    /// Total rows waiting to be pushed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.transactions + self.profiles + self.forecasts
    }
}

const TRANSACTION_COLUMNS: &str =
    "local_id, remote_id, owner_id, synced, amount, category, kind, date, note, created_at";

const PROFILE_COLUMNS: &str =
    "owner_id, remote_id, synced, display_name, currency, monthly_income, updated_at";

const FORECAST_COLUMNS: &str = "local_id, remote_id, owner_id, synced, month_index, projected_income, projected_expenses, note, created_at";

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(result)
    }

    // ======================
    // Transaction Operations
    // ======================

    /// Record a new transaction locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (e.g. duplicate local id).
    pub fn record_transaction(&mut self, tx: &PendingTransaction, actor: &str) -> Result<()> {
        self.mutate("record_transaction", actor, |db, ctx| {
            db.execute(
                "INSERT INTO transactions (local_id, remote_id, owner_id, synced, amount, category, kind, date, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    tx.local_id,
                    tx.remote_id,
                    tx.owner_id,
                    tx.synced,
                    tx.fields.amount,
                    tx.fields.category,
                    tx.fields.kind.as_str(),
                    tx.fields.date,
                    tx.fields.note,
                    tx.created_at,
                ],
            )?;
            ctx.record_event("transaction", &tx.local_id, EventType::TransactionRecorded);
            Ok(())
        })
    }

    /// Get a transaction by local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_transaction(&self, local_id: &str) -> Result<Option<PendingTransaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE local_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [local_id], map_transaction_row)
            .optional()?)
    }

    /// Get a transaction by its server-assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_transaction_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<PendingTransaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE remote_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [remote_id], map_transaction_row)
            .optional()?)
    }

    /// List transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_transactions(
        &self,
        pending_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<PendingTransaction>> {
        let filter = if pending_only { "WHERE synced = 0" } else { "" };
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions {filter}
             ORDER BY rowid DESC LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([limit.unwrap_or(50)], map_transaction_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All unsynced transactions in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_unsynced_transactions(&self) -> Result<Vec<PendingTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE synced = 0 ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_transaction_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Stamp a locally created transaction with its server-assigned id.
    ///
    /// A row that already carries a canonical id keeps it: assigning a
    /// different one is an [`Error::IdentityConflict`]. A non-canonical
    /// leftover id may be replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not exist, the mapping conflicts,
    /// or the update fails.
    pub fn mark_transaction_synced(
        &mut self,
        local_id: &str,
        remote_id: &str,
        actor: &str,
    ) -> Result<()> {
        self.mutate("mark_transaction_synced", actor, |db, ctx| {
            let existing: Option<Option<String>> = db
                .query_row(
                    "SELECT remote_id FROM transactions WHERE local_id = ?1",
                    [local_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(existing) = existing else {
                return Err(Error::TransactionNotFound {
                    id: local_id.to_string(),
                });
            };

            if let Some(current) = existing.as_deref() {
                if current != remote_id && is_canonical_id(current) {
                    return Err(Error::IdentityConflict {
                        local_id: local_id.to_string(),
                        existing: current.to_string(),
                        assigned: remote_id.to_string(),
                    });
                }
            }

            let now = chrono::Utc::now().timestamp_millis();
            db.execute(
                "UPDATE transactions SET remote_id = ?1, synced = 1, synced_at = ?2 WHERE local_id = ?3",
                rusqlite::params![remote_id, now, local_id],
            )?;

            ctx.record_change(
                "transaction",
                local_id,
                EventType::TransactionSynced,
                existing,
                Some(remote_id.to_string()),
            );
            Ok(())
        })
    }

    /// Mark the row holding `remote_id` as synced.
    ///
    /// Returns the number of rows updated (zero if no row holds the id).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_transaction_synced_by_id(&mut self, remote_id: &str, actor: &str) -> Result<usize> {
        self.mutate("mark_transaction_synced_by_id", actor, |db, ctx| {
            let local_id: Option<String> = db
                .query_row(
                    "SELECT local_id FROM transactions WHERE remote_id = ?1",
                    [remote_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(local_id) = local_id else {
                return Ok(0);
            };

            let now = chrono::Utc::now().timestamp_millis();
            let updated = db.execute(
                "UPDATE transactions SET synced = 1, synced_at = ?1 WHERE local_id = ?2",
                rusqlite::params![now, local_id],
            )?;
            ctx.record_event("transaction", &local_id, EventType::TransactionSynced);
            Ok(updated)
        })
    }

    /// Delete every synced transaction. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_synced_transactions(&mut self, actor: &str) -> Result<usize> {
        self.mutate("delete_synced_transactions", actor, |db, ctx| {
            let mut stmt = db.prepare("SELECT local_id FROM transactions WHERE synced = 1")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            let deleted = db.execute("DELETE FROM transactions WHERE synced = 1", [])?;
            for id in &ids {
                ctx.record_event("transaction", id, EventType::TransactionPruned);
            }
            Ok(deleted)
        })
    }

    /// Audit history for a transaction, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn transaction_history(&self, local_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, "transaction", local_id, limit)?)
    }

    // ==================
    // Profile Operations
    // ==================

    /// Create or replace the profile for its owner.
    ///
    /// Any local edit clears the synced flag; the remote id is retained.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn save_profile(&mut self, profile: &PendingProfile, actor: &str) -> Result<()> {
        self.mutate("save_profile", actor, |db, ctx| {
            db.execute(
                "INSERT INTO profiles (owner_id, remote_id, synced, display_name, currency, monthly_income, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6)
                 ON CONFLICT(owner_id) DO UPDATE SET
                    synced = 0,
                    display_name = excluded.display_name,
                    currency = excluded.currency,
                    monthly_income = excluded.monthly_income,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    profile.owner_id,
                    profile.remote_id,
                    profile.display_name,
                    profile.currency,
                    profile.monthly_income,
                    profile.updated_at,
                ],
            )?;
            ctx.record_event("profile", &profile.owner_id, EventType::ProfileSaved);
            Ok(())
        })
    }

    /// Get the profile for an owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_profile(&self, owner_id: &str) -> Result<Option<PendingProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE owner_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [owner_id], map_profile_row)
            .optional()?)
    }

    /// Stamp the owner's profile as synced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileNotFound`] if no profile exists for the owner.
    pub fn mark_profile_synced(&mut self, owner_id: &str, remote_id: &str, actor: &str) -> Result<()> {
        self.mutate("mark_profile_synced", actor, |db, ctx| {
            let now = chrono::Utc::now().timestamp_millis();
            let updated = db.execute(
                "UPDATE profiles SET remote_id = ?1, synced = 1, synced_at = ?2 WHERE owner_id = ?3",
                rusqlite::params![remote_id, now, owner_id],
            )?;
            if updated == 0 {
                return Err(Error::ProfileNotFound {
                    owner_id: owner_id.to_string(),
                });
            }
            ctx.record_event("profile", owner_id, EventType::ProfileSynced);
            Ok(())
        })
    }

    // ===================
    // Forecast Operations
    // ===================

    /// Find the forecast stored for `(owner, month)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_forecast(
        &self,
        owner_id: Option<&str>,
        month_index: u32,
    ) -> Result<Option<PendingForecast>> {
        let sql = format!(
            "SELECT {FORECAST_COLUMNS} FROM forecasts
             WHERE owner_id IS ?1 AND month_index = ?2
             ORDER BY created_at DESC LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, rusqlite::params![owner_id, month_index], map_forecast_row)
            .optional()?)
    }

    /// Write a forecast row, keyed by local id.
    ///
    /// A synced row already holding the same `(owner, month)` is replaced.
    /// Unsynced rows are never removed here: if one holds the slot the
    /// unique index rejects the write and both rows stay as they were.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or another unsynced row holds
    /// the same `(owner, month)`.
    pub fn save_forecast(&mut self, forecast: &PendingForecast, actor: &str) -> Result<()> {
        let event_type = if forecast.synced {
            EventType::ForecastSynced
        } else {
            EventType::ForecastSaved
        };

        self.mutate("save_forecast", actor, |db, ctx| {
            db.execute(
                "DELETE FROM forecasts
                 WHERE owner_id IS ?1 AND month_index = ?2 AND local_id != ?3 AND synced = 1",
                rusqlite::params![forecast.owner_id, forecast.month_index, forecast.local_id],
            )?;

            let synced_at = forecast
                .synced
                .then(|| chrono::Utc::now().timestamp_millis());

            db.execute(
                "INSERT INTO forecasts (local_id, remote_id, owner_id, synced, month_index, projected_income, projected_expenses, note, created_at, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(local_id) DO UPDATE SET
                    remote_id = excluded.remote_id,
                    owner_id = excluded.owner_id,
                    synced = excluded.synced,
                    month_index = excluded.month_index,
                    projected_income = excluded.projected_income,
                    projected_expenses = excluded.projected_expenses,
                    note = excluded.note,
                    synced_at = excluded.synced_at",
                rusqlite::params![
                    forecast.local_id,
                    forecast.remote_id,
                    forecast.owner_id,
                    forecast.synced,
                    forecast.month_index,
                    forecast.projected_income,
                    forecast.projected_expenses,
                    forecast.note,
                    forecast.created_at,
                    synced_at,
                ],
            )?;

            ctx.record_event("forecast", &forecast.local_id, event_type);
            Ok(())
        })
    }

    /// Drop unsynced forecasts whose values were superseded by a newer row
    /// for the same month. Synced rows and unknown ids are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn discard_forecasts(&mut self, local_ids: &[String], actor: &str) -> Result<usize> {
        self.mutate("discard_forecasts", actor, |db, ctx| {
            let mut deleted = 0;
            for id in local_ids {
                let n = db.execute(
                    "DELETE FROM forecasts WHERE local_id = ?1 AND synced = 0",
                    [id],
                )?;
                if n > 0 {
                    ctx.record_event("forecast", id, EventType::ForecastSuperseded);
                }
                deleted += n;
            }
            Ok(deleted)
        })
    }

    /// All unsynced forecasts in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_unsynced_forecasts(&self) -> Result<Vec<PendingForecast>> {
        let sql = format!(
            "SELECT {FORECAST_COLUMNS} FROM forecasts WHERE synced = 0 ORDER BY created_at, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_forecast_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Forecasts for an owner (or unowned ones), ordered by month.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_forecasts(&self, owner_id: Option<&str>) -> Result<Vec<PendingForecast>> {
        let sql = format!(
            "SELECT {FORECAST_COLUMNS} FROM forecasts WHERE owner_id IS ?1 ORDER BY month_index"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([owner_id], map_forecast_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ===========
    // Bookkeeping
    // ===========

    /// Persist the summary of a finished sync run.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails.
    pub fn record_sync_run(&mut self, summary: &SyncRunSummary) -> Result<i64> {
        let json = serde_json::to_string(summary)?;
        self.conn.execute(
            "INSERT INTO sync_runs (run_trigger, started_at, finished_at, total_count, success_count, failure_count, skipped, skip_reason, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                summary.trigger.as_str(),
                summary.started_at.timestamp_millis(),
                summary.finished_at.timestamp_millis(),
                summary.total_count,
                summary.success_count,
                summary.failure_count,
                summary.skipped,
                summary.skip_reason.map(|r| r.as_str()),
                json,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The most recently finished sync run, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored summary is corrupt.
    pub fn last_sync_run(&self) -> Result<Option<SyncRunSummary>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT summary FROM sync_runs ORDER BY finished_at DESC, id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|s| serde_json::from_str(&s).map_err(Error::from))
            .transpose()
    }

    /// Count rows still waiting for the remote.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn pending_counts(&self) -> Result<PendingCounts> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };

        Ok(PendingCounts {
            transactions: count("SELECT COUNT(*) FROM transactions WHERE synced = 0")?,
            synced_transactions: count("SELECT COUNT(*) FROM transactions WHERE synced = 1")?,
            profiles: count("SELECT COUNT(*) FROM profiles WHERE synced = 0")?,
            forecasts: count("SELECT COUNT(*) FROM forecasts WHERE synced = 0")?,
        })
    }
}

fn parse_column<T>(value: String, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn map_transaction_row(row: &rusqlite::Row) -> rusqlite::Result<PendingTransaction> {
    Ok(PendingTransaction {
        local_id: row.get(0)?,
        remote_id: row.get(1)?,
        owner_id: row.get(2)?,
        synced: row.get(3)?,
        fields: TransactionFields {
            amount: row.get(4)?,
            category: row.get(5)?,
            kind: parse_column(row.get(6)?, 6)?,
            date: row.get(7)?,
            note: row.get(8)?,
        },
        created_at: row.get(9)?,
    })
}

fn map_profile_row(row: &rusqlite::Row) -> rusqlite::Result<PendingProfile> {
    Ok(PendingProfile {
        owner_id: row.get(0)?,
        remote_id: row.get(1)?,
        synced: row.get(2)?,
        display_name: row.get(3)?,
        currency: row.get(4)?,
        monthly_income: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_forecast_row(row: &rusqlite::Row) -> rusqlite::Result<PendingForecast> {
    Ok(PendingForecast {
        local_id: row.get(0)?,
        remote_id: row.get(1)?,
        owner_id: row.get(2)?,
        synced: row.get(3)?,
        month_index: row.get(4)?,
        projected_income: row.get(5)?,
        projected_expenses: row.get(6)?,
        note: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionKind;
    use crate::sync::types::{SkipReason, Trigger};

    const CANONICAL_A: &str = "3f2b8c1e-9a4d-4e6f-8b21-7c5d0e9f1a23";
    const CANONICAL_B: &str = "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d";

    fn tx(amount: f64) -> PendingTransaction {
        PendingTransaction::new(
            None,
            TransactionFields {
                amount,
                category: "Food".to_string(),
                kind: TransactionKind::Expense,
                date: "2026-10-01".to_string(),
                note: None,
            },
        )
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_transaction_lifecycle() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let first = tx(10.0);
        let second = tx(20.0);
        storage.record_transaction(&first, "cli").unwrap();
        storage.record_transaction(&second, "cli").unwrap();

        let pending = storage.get_unsynced_transactions().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].local_id, first.local_id);

        storage
            .mark_transaction_synced(&first.local_id, CANONICAL_A, "sync")
            .unwrap();

        let stored = storage.get_transaction(&first.local_id).unwrap().unwrap();
        assert!(stored.synced);
        assert_eq!(stored.remote_id.as_deref(), Some(CANONICAL_A));
        assert_eq!(
            storage
                .get_transaction_by_remote_id(CANONICAL_A)
                .unwrap()
                .unwrap()
                .local_id,
            first.local_id
        );

        let pending = storage.get_unsynced_transactions().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].local_id, second.local_id);

        assert_eq!(storage.delete_synced_transactions("sync").unwrap(), 1);
        assert!(storage.get_transaction(&first.local_id).unwrap().is_none());
        assert!(storage.get_transaction(&second.local_id).unwrap().is_some());

        let history = storage.transaction_history(&first.local_id, None).unwrap();
        assert_eq!(history[0].event_type, EventType::TransactionPruned);
    }

    #[test]
    fn test_mark_synced_refuses_canonical_remap() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let row = tx(5.0);
        storage.record_transaction(&row, "cli").unwrap();
        storage
            .mark_transaction_synced(&row.local_id, CANONICAL_A, "sync")
            .unwrap();

        // Same id again is fine
        storage
            .mark_transaction_synced(&row.local_id, CANONICAL_A, "sync")
            .unwrap();

        let err = storage
            .mark_transaction_synced(&row.local_id, CANONICAL_B, "sync")
            .unwrap_err();
        assert!(matches!(err, Error::IdentityConflict { .. }));

        let stored = storage.get_transaction(&row.local_id).unwrap().unwrap();
        assert_eq!(stored.remote_id.as_deref(), Some(CANONICAL_A));
    }

    #[test]
    fn test_mark_synced_replaces_non_canonical_leftover() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut row = tx(5.0);
        row.remote_id = Some("legacy-7".to_string());
        storage.record_transaction(&row, "cli").unwrap();

        storage
            .mark_transaction_synced(&row.local_id, CANONICAL_A, "sync")
            .unwrap();
        let stored = storage.get_transaction(&row.local_id).unwrap().unwrap();
        assert_eq!(stored.remote_id.as_deref(), Some(CANONICAL_A));
    }

    #[test]
    fn test_mark_synced_unknown_row() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = storage
            .mark_transaction_synced("tmp_missing", CANONICAL_A, "sync")
            .unwrap_err();
        assert!(matches!(err, Error::TransactionNotFound { .. }));
    }

    #[test]
    fn test_mark_synced_by_remote_id() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut row = tx(7.5);
        row.remote_id = Some(CANONICAL_A.to_string());
        storage.record_transaction(&row, "cli").unwrap();

        assert_eq!(
            storage
                .mark_transaction_synced_by_id(CANONICAL_A, "sync")
                .unwrap(),
            1
        );
        assert_eq!(
            storage
                .mark_transaction_synced_by_id(CANONICAL_B, "sync")
                .unwrap(),
            0
        );
        assert!(storage.get_unsynced_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_profile_edit_clears_synced_flag() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let profile = PendingProfile::new("u1", "Ada", "EUR");
        storage.save_profile(&profile, "cli").unwrap();
        storage.mark_profile_synced("u1", CANONICAL_A, "sync").unwrap();

        let stored = storage.get_profile("u1").unwrap().unwrap();
        assert!(stored.synced);

        let edited = PendingProfile::new("u1", "Ada L.", "EUR");
        storage.save_profile(&edited, "cli").unwrap();
        let stored = storage.get_profile("u1").unwrap().unwrap();
        assert!(!stored.synced);
        assert_eq!(stored.display_name, "Ada L.");
        assert_eq!(stored.remote_id.as_deref(), Some(CANONICAL_A));

        assert!(matches!(
            storage.mark_profile_synced("u2", CANONICAL_B, "sync"),
            Err(Error::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn test_save_forecast_keeps_natural_key_unique() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        let unowned = PendingForecast::new(None, 3, 1000.0, 800.0);
        storage.save_forecast(&unowned, "cli").unwrap();
        assert_eq!(storage.get_unsynced_forecasts().unwrap().len(), 1);

        // An older row already synced for u1/April
        let old = PendingForecast::new(Some("u1".into()), 3, 900.0, 700.0)
            .into_synced("u1", CANONICAL_B.to_string());
        storage.save_forecast(&old, "sync").unwrap();

        // The unowned row syncs and takes over the slot
        let synced = unowned.into_synced("u1", CANONICAL_A.to_string());
        storage.save_forecast(&synced, "sync").unwrap();

        let rows = storage.list_forecasts(Some("u1")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_id.as_deref(), Some(CANONICAL_A));
        assert!((rows[0].projected_income - 1000.0).abs() < f64::EPSILON);
        assert!(storage.get_unsynced_forecasts().unwrap().is_empty());
        assert!(storage.list_forecasts(None).unwrap().is_empty());
    }

    #[test]
    fn test_save_forecast_never_drops_unsynced_rows() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        let unowned = PendingForecast::new(None, 5, 100.0, 0.0);
        let edited = PendingForecast::new(Some("u1".into()), 5, 200.0, 0.0);
        storage.save_forecast(&unowned, "cli").unwrap();
        storage.save_forecast(&edited, "cli").unwrap();

        // Committing the unowned row under u1 would collide with the pending edit
        let synced = unowned.clone().into_synced("u1", CANONICAL_A.to_string());
        assert!(storage.save_forecast(&synced, "sync").is_err());

        let rows = storage.list_forecasts(Some("u1")).unwrap();
        assert_eq!(rows, vec![edited]);
        assert_eq!(storage.list_forecasts(None).unwrap(), vec![unowned]);
    }

    #[test]
    fn test_discard_forecasts_only_removes_unsynced_rows() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        let pending = PendingForecast::new(None, 1, 10.0, 5.0);
        let confirmed = PendingForecast::new(Some("u1".into()), 2, 10.0, 5.0)
            .into_synced("u1", CANONICAL_A.to_string());
        storage.save_forecast(&pending, "cli").unwrap();
        storage.save_forecast(&confirmed, "sync").unwrap();

        let ids = vec![
            pending.local_id.clone(),
            confirmed.local_id.clone(),
            "fc_missing".to_string(),
        ];
        assert_eq!(storage.discard_forecasts(&ids, "sync").unwrap(), 1);
        assert!(storage.get_unsynced_forecasts().unwrap().is_empty());
        assert_eq!(storage.list_forecasts(Some("u1")).unwrap(), vec![confirmed]);
    }

    #[test]
    fn test_find_forecast_matches_null_owner() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let f = PendingForecast::new(None, 0, 10.0, 5.0);
        storage.save_forecast(&f, "cli").unwrap();

        assert!(storage.find_forecast(None, 0).unwrap().is_some());
        assert!(storage.find_forecast(Some("u1"), 0).unwrap().is_none());
        assert!(storage.find_forecast(None, 1).unwrap().is_none());
    }

    #[test]
    fn test_sync_run_bookkeeping() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.last_sync_run().unwrap().is_none());

        let summary =
            SyncRunSummary::skipped(Trigger::Manual, chrono::Utc::now(), SkipReason::Offline);
        storage.record_sync_run(&summary).unwrap();

        let last = storage.last_sync_run().unwrap().unwrap();
        assert!(last.skipped);
        assert_eq!(last.skip_reason, Some(SkipReason::Offline));
    }

    #[test]
    fn test_pending_counts() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let a = tx(1.0);
        storage.record_transaction(&a, "cli").unwrap();
        storage.record_transaction(&tx(2.0), "cli").unwrap();
        storage
            .mark_transaction_synced(&a.local_id, CANONICAL_A, "sync")
            .unwrap();
        storage
            .save_profile(&PendingProfile::new("u1", "Ada", "USD"), "cli")
            .unwrap();

        let counts = storage.pending_counts().unwrap();
        assert_eq!(counts.transactions, 1);
        assert_eq!(counts.synced_transactions, 1);
        assert_eq!(counts.profiles, 1);
        assert_eq!(counts.forecasts, 0);
        assert_eq!(counts.total(), 2);
    }
}
