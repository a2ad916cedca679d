//! Config file management.
//!
//! Loads and saves settings from `~/.ledger-sync/config.json`. Environment
//! variables override the file; the file overrides built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::{DEFAULT_SESSION_ATTEMPTS, SyncPolicy};
use crate::validate::levenshtein_distance;

use super::global_ledger_dir;

/// Default per-request timeout for remote calls.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Default delay between session resolution attempts.
pub const DEFAULT_SESSION_DELAY_MS: u64 = 2_000;

pub const ENV_CONFIG: &str = "LEDGER_SYNC_CONFIG";
pub const ENV_ENDPOINT: &str = "LEDGER_SYNC_ENDPOINT";
pub const ENV_API_KEY: &str = "LEDGER_SYNC_API_KEY";
pub const ENV_TOKEN: &str = "LEDGER_SYNC_TOKEN";
pub const ENV_OWNER: &str = "LEDGER_SYNC_OWNER";

/// Keys accepted by `config set`.
pub const SETTABLE_KEYS: [&str; 8] = [
    "remote.endpoint",
    "remote.api_key",
    "remote.request_timeout_ms",
    "session.access_token",
    "session.owner_id",
    "sync.policy",
    "sync.session_attempts",
    "sync.session_delay_ms",
];

/// Contents of the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the remote REST API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Bearer token; the owner is looked up from it at sync time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Fixed owner, used when no token is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<SyncPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_delay_ms: Option<u64>,
}

/// Effective settings after applying environment and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub access_token: Option<String>,
    pub owner_id: Option<String>,
    pub policy: SyncPolicy,
    pub session_attempts: u32,
    pub session_delay: Duration,
}

impl ResolvedConfig {
    /// True when an endpoint is configured, so remote calls are possible.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.endpoint.is_some()
    }

    /// JSON view with secrets masked, for `config show`.
    #[must_use]
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "remote": {
                "endpoint": self.endpoint,
                "api_key": self.api_key.as_deref().map(mask),
                "request_timeout_ms": u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
            },
            "session": {
                "access_token": self.access_token.as_deref().map(mask),
                "owner_id": self.owner_id,
            },
            "sync": {
                "policy": self.policy,
                "session_attempts": self.session_attempts,
                "session_delay_ms": u64::try_from(self.session_delay.as_millis()).unwrap_or(u64::MAX),
            }
        })
    }
}

fn mask(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("****{tail}")
    }
}

impl LedgerConfig {
    /// Resolve against the process environment.
    #[must_use]
    pub fn resolve(&self) -> ResolvedConfig {
        self.resolve_with(env_value)
    }

    /// Resolve with a custom environment lookup.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> ResolvedConfig {
        ResolvedConfig {
            endpoint: env(ENV_ENDPOINT)
                .or_else(|| self.remote.endpoint.clone())
                .map(|e| e.trim_end_matches('/').to_string()),
            api_key: env(ENV_API_KEY).or_else(|| self.remote.api_key.clone()),
            request_timeout: Duration::from_millis(
                self.remote
                    .request_timeout_ms
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
            access_token: env(ENV_TOKEN).or_else(|| self.session.access_token.clone()),
            owner_id: env(ENV_OWNER).or_else(|| self.session.owner_id.clone()),
            policy: self.sync.policy.unwrap_or_default(),
            session_attempts: self
                .sync
                .session_attempts
                .unwrap_or(DEFAULT_SESSION_ATTEMPTS)
                .max(1),
            session_delay: Duration::from_millis(
                self.sync.session_delay_ms.unwrap_or(DEFAULT_SESSION_DELAY_MS),
            ),
        }
    }

    /// Set one dotted key. An empty value clears it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown keys or unparsable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());

        match key {
            "remote.endpoint" => self.remote.endpoint = text,
            "remote.api_key" => self.remote.api_key = text,
            "remote.request_timeout_ms" => self.remote.request_timeout_ms = parse_opt(key, value)?,
            "session.access_token" => self.session.access_token = text,
            "session.owner_id" => self.session.owner_id = text,
            "sync.policy" => {
                self.sync.policy = text
                    .map(|v| v.parse::<SyncPolicy>().map_err(Error::Config))
                    .transpose()?;
            }
            "sync.session_attempts" => self.sync.session_attempts = parse_opt(key, value)?,
            "sync.session_delay_ms" => self.sync.session_delay_ms = parse_opt(key, value)?,
            _ => {
                let closest = SETTABLE_KEYS
                    .iter()
                    .map(|k| (k, levenshtein_distance(key, k)))
                    .filter(|(_, d)| *d <= 4)
                    .min_by_key(|(_, d)| *d);
                return Err(Error::Config(match closest {
                    Some((k, _)) => format!("Unknown key '{key}'. Did you mean '{k}'?"),
                    None => format!(
                        "Unknown key '{key}'. Valid keys: {}",
                        SETTABLE_KEYS.join(", ")
                    ),
                }));
            }
        }
        Ok(())
    }
}

fn parse_opt<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::Config(format!("Invalid value for {key}: '{value}'")))
}

/// Read a non-empty environment variable.
#[must_use]
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get the config file path.
///
/// `LEDGER_SYNC_CONFIG` overrides the default `~/.ledger-sync/config.json`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = env_value(ENV_CONFIG) {
        return Ok(PathBuf::from(path));
    }
    global_ledger_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load the config file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<LedgerConfig> {
    load_config_from(&config_path()?)
}

/// Load a config file from an explicit path.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<LedgerConfig> {
    if !path.exists() {
        return Ok(LedgerConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save the config file, creating its directory if needed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_config(config: &LedgerConfig) -> Result<PathBuf> {
    let path = config_path()?;
    save_config_to(&path, config)?;
    Ok(path)
}

/// Save a config file to an explicit path.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_config_to(path: &Path, config: &LedgerConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}
