//! Configuration management.
//!
//! This module provides functions for locating the ledger-sync directory,
//! resolving the database path, and loading configuration.
//!
//! # Layout
//!
//! - **Database**: `~/.ledger-sync/data/ledger.db`
//! - **Config**: `~/.ledger-sync/config.json`

mod settings;

pub use settings::{
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SESSION_DELAY_MS, ENV_API_KEY, ENV_CONFIG, ENV_ENDPOINT,
    ENV_OWNER, ENV_TOKEN, LedgerConfig, RemoteSettings, ResolvedConfig, SETTABLE_KEYS,
    SessionSettings, SyncSettings, config_path, env_value, load_config, load_config_from,
    save_config, save_config_to,
};

use std::path::{Path, PathBuf};

/// Get the global ledger-sync directory (`~/.ledger-sync/`).
#[must_use]
pub fn global_ledger_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".ledger-sync"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `LEDGER_SYNC_TEST_DB=1` (or any non-empty
/// value other than `0`/`false`).
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("LEDGER_SYNC_TEST_DB")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

/// Get the test database path (`~/.ledger-sync/test/ledger.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_ledger_dir().map(|dir| dir.join("test").join("ledger.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `LEDGER_SYNC_TEST_DB` environment variable → uses test database
/// 3. `LEDGER_SYNC_DB` environment variable
/// 4. Global location: `~/.ledger-sync/data/ledger.db`
///
/// Returns `None` if no location can be determined.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Some(db_path) = env_value("LEDGER_SYNC_DB") {
        return Some(PathBuf::from(db_path));
    }

    global_ledger_dir().map(|dir| dir.join("data").join("ledger.db"))
}
