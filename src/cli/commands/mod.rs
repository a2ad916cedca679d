//! Command implementations.

pub mod completions;
pub mod config;
pub mod forecast;
pub mod init;
pub mod profile;
pub mod status;
pub mod sync;
pub mod tx;
pub mod version;

use crate::config::{load_config, resolve_db_path};
use crate::error::{Error, Result};
use crate::remote::SessionSource;
use crate::storage::SqliteStorage;
use std::path::PathBuf;
use tracing::warn;

/// Actor recorded on audit events for writes made from the command line.
pub const CLI_ACTOR: &str = "cli";

/// Open the database, failing with `NotInitialized` if it does not exist yet.
pub(crate) fn open_storage(db_path: Option<&PathBuf>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path())).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    SqliteStorage::open(&db_path)
}

/// Owner to stamp on a local write, if one is known without a network call.
///
/// With a bearer token configured the owner is unknown until sync time and
/// rows are written ownerless.
pub(crate) fn write_owner(owner: Option<&str>) -> Option<String> {
    let config = match load_config() {
        Ok(config) => config.resolve(),
        Err(e) => {
            warn!(error = %e, "Could not load config");
            return owner.map(str::trim).filter(|o| !o.is_empty()).map(String::from);
        }
    };
    SessionSource::from_config(&config, owner)
        .ok()
        .and_then(|source| source.known_owner().map(String::from))
}

/// Build the tokio runtime used by commands that talk to the remote.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}
