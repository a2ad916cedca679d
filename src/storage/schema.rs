//! Database schema definitions.
//!
//! One table per synced entity type, plus the audit log and a record of
//! past sync runs.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the local ledger database.
///
/// Note: Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Pending Mutations
-- ====================

-- Transactions: keyed by the client-generated id so rows are unique
-- before the remote has assigned one.
CREATE TABLE IF NOT EXISTS transactions (
    local_id TEXT PRIMARY KEY,
    remote_id TEXT,
    owner_id TEXT,
    synced INTEGER NOT NULL DEFAULT 0,
    amount REAL NOT NULL,
    category TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'expense',
    date TEXT NOT NULL,
    note TEXT,
    created_at INTEGER,
    synced_at INTEGER,
    CHECK (synced IN (0, 1)),
    CHECK (kind IN ('income', 'expense'))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_remote ON transactions(remote_id);
CREATE INDEX IF NOT EXISTS idx_transactions_synced ON transactions(synced);
CREATE INDEX IF NOT EXISTS idx_transactions_owner ON transactions(owner_id);

-- Profiles: at most one per owner.
CREATE TABLE IF NOT EXISTS profiles (
    owner_id TEXT PRIMARY KEY,
    remote_id TEXT,
    synced INTEGER NOT NULL DEFAULT 0,
    display_name TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    monthly_income REAL,
    updated_at INTEGER NOT NULL,
    synced_at INTEGER,
    CHECK (synced IN (0, 1))
);

-- Forecasts: surrogate key plus the natural (owner, month) key.
CREATE TABLE IF NOT EXISTS forecasts (
    local_id TEXT PRIMARY KEY,
    remote_id TEXT,
    owner_id TEXT,
    synced INTEGER NOT NULL DEFAULT 0,
    month_index INTEGER NOT NULL,
    projected_income REAL NOT NULL DEFAULT 0,
    projected_expenses REAL NOT NULL DEFAULT 0,
    note TEXT,
    created_at INTEGER NOT NULL,
    synced_at INTEGER,
    CHECK (synced IN (0, 1)),
    CHECK (month_index >= 0 AND month_index <= 11)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_forecasts_owner_month ON forecasts(owner_id, month_index);
CREATE INDEX IF NOT EXISTS idx_forecasts_synced ON forecasts(synced);

-- ====================
-- Bookkeeping
-- ====================

-- Audit log of local writes and sync stamps
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);

-- Completed sync runs (summaries of non-skipped and skipped runs alike)
CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_trigger TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    finished_at INTEGER NOT NULL,
    total_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    skip_reason TEXT,
    summary TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_finished ON sync_runs(finished_at DESC);
";

/// Apply the schema to a connection.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if a pragma or DDL statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    // Record schema version
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"transactions".to_string()));
        assert!(tables.contains(&"profiles".to_string()));
        assert!(tables.contains(&"forecasts".to_string()));
        assert!(tables.contains(&"events".to_string()));
        assert!(tables.contains(&"sync_runs".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_remote_id_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = "INSERT INTO transactions (local_id, remote_id, amount, category, date)
                      VALUES (?1, ?2, 1.0, 'Food', '2026-01-01')";
        conn.execute(insert, ["tmp_a", "r1"]).unwrap();
        assert!(conn.execute(insert, ["tmp_b", "r1"]).is_err());

        // Unassigned rows may coexist
        conn.execute(
            "INSERT INTO transactions (local_id, amount, category, date) VALUES ('tmp_c', 1.0, 'Food', '2026-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO transactions (local_id, amount, category, date) VALUES ('tmp_d', 1.0, 'Food', '2026-01-01')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_month_index_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let ok = conn.execute(
            "INSERT INTO forecasts (local_id, owner_id, month_index, created_at) VALUES ('fc_1', 'u1', 11, 0)",
            [],
        );
        assert!(ok.is_ok());

        let bad = conn.execute(
            "INSERT INTO forecasts (local_id, owner_id, month_index, created_at) VALUES ('fc_2', 'u1', 12, 0)",
            [],
        );
        assert!(bad.is_err());
    }
}
