//! Create the local database.
//!
//! The database lives at `~/.ledger-sync/data/ledger.db` unless `--db`,
//! `LEDGER_SYNC_DB` or test mode (`LEDGER_SYNC_TEST_DB`) say otherwise. The
//! schema is applied when the file is first opened.

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    reinitialized: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the database already exists (without `force`) or
/// cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path())).ok_or_else(|| {
        Error::Config("Could not determine the ledger-sync directory".to_string())
    })?;

    let reinitialized = create_database(&db_path, force)?;

    if json {
        let output = InitOutput {
            database: db_path,
            reinitialized,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized ledger-sync database");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: ledger-sync config set remote.endpoint <url>");
    }

    Ok(())
}

/// Create (or with `force`, recreate) the database file and apply the schema.
///
/// Returns whether an existing database was replaced.
fn create_database(db_path: &Path, force: bool) -> Result<bool> {
    let existed = db_path.exists();
    if existed && !force {
        return Err(Error::AlreadyInitialized {
            path: db_path.to_path_buf(),
        });
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if existed {
        fs::remove_file(db_path)?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = PathBuf::from(format!("{}{suffix}", db_path.display()));
            if sidecar.exists() {
                fs::remove_file(sidecar)?;
            }
        }
    }

    SqliteStorage::open(db_path)?;
    Ok(existed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_database_with_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.db");

        assert!(!create_database(&path, false).unwrap());
        assert!(path.exists());

        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(storage.pending_counts().unwrap().total(), 0);
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        create_database(&path, false).unwrap();
        let result = create_database(&path, false);
        assert!(matches!(result, Err(Error::AlreadyInitialized { .. })));
    }

    #[test]
    fn test_init_force_recreates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        create_database(&path, false).unwrap();
        assert!(create_database(&path, true).unwrap());
        assert!(path.exists());
    }
}
