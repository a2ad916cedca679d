//! Error types for ledger-sync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags (a retryable error leaves the row eligible for the next run)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ledger-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    TransactionNotFound,
    ProfileNotFound,
    NoSession,

    // Validation (exit 4)
    InvalidArgument,
    InvalidKind,
    RequiredField,

    // Identity (exit 5)
    IdentityConflict,

    // Remote (exit 6)
    RemoteRejected,
    TransportError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            Self::ProfileNotFound => "PROFILE_NOT_FOUND",
            Self::NoSession => "NO_SESSION",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidKind => "INVALID_KIND",
            Self::RequiredField => "REQUIRED_FIELD",
            Self::IdentityConflict => "IDENTITY_CONFLICT",
            Self::RemoteRejected => "REMOTE_REJECTED",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::TransactionNotFound | Self::ProfileNotFound | Self::NoSession => 3,
            Self::InvalidArgument | Self::InvalidKind | Self::RequiredField => 4,
            Self::IdentityConflict => 5,
            Self::RemoteRejected | Self::TransportError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the same operation may succeed if attempted again later.
    ///
    /// True for transport failures, server-side errors and a missing
    /// session. False for validation and identity errors, which need the
    /// local row or the input to change first.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportError | Self::NoSession | Self::DatabaseError | Self::RemoteRejected
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in ledger-sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `ledger-sync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Transaction not found: {id}")]
    TransactionNotFound { id: String },

    #[error("Profile not found for owner: {owner_id}")]
    ProfileNotFound { owner_id: String },

    #[error("No authenticated session")]
    NoSession,

    #[error(
        "Identity conflict for {local_id}: already mapped to {existing}, refusing {assigned}"
    )]
    IdentityConflict {
        local_id: String,
        existing: String,
        assigned: String,
    },

    #[error("Remote rejected request ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Remote returned no canonical record: {0}")]
    MissingRecord(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid transaction kind: {value}")]
    InvalidKind {
        value: String,
        suggestion: Option<String>,
    },

    #[error("Missing required field: {0}")]
    RequiredField(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            Self::ProfileNotFound { .. } => ErrorCode::ProfileNotFound,
            Self::NoSession => ErrorCode::NoSession,
            Self::IdentityConflict { .. } => ErrorCode::IdentityConflict,
            Self::Remote { .. } | Self::MissingRecord(_) => ErrorCode::RemoteRejected,
            Self::Http(_) => ErrorCode::TransportError,
            Self::InvalidKind { .. } => ErrorCode::InvalidKind,
            Self::RequiredField(_) => ErrorCode::RequiredField,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `ledger-sync init` to create the local database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::NoSession => Some(
                "No owner could be resolved.\n  \
                 Pass --owner <id>, set LEDGER_SYNC_OWNER, or configure an access token:\n  \
                 ledger-sync config set session.access_token <token>"
                    .to_string(),
            ),

            Self::ProfileNotFound { .. } => {
                Some("Create one with: ledger-sync profile set --name \"Your Name\"".to_string())
            }

            Self::TransactionNotFound { id } => Some(format!(
                "No transaction with ID '{id}'. Use `ledger-sync tx list` to see local rows."
            )),

            Self::InvalidKind { suggestion, .. } => Some(match suggestion {
                Some(s) => format!("Did you mean: {s}? Valid kinds: income, expense"),
                None => "Valid kinds: income, expense. Synonyms: spend→expense, salary→income"
                    .to_string(),
            }),

            Self::IdentityConflict { local_id, .. } => Some(format!(
                "Row {local_id} already carries a canonical remote id; it cannot be remapped."
            )),

            Self::Http(_) => {
                Some("The remote could not be reached. Pending rows stay queued.".to_string())
            }

            Self::Config(_) => Some(
                "Check ~/.ledger-sync/config.json or the LEDGER_SYNC_* environment variables"
                    .to_string(),
            ),

            Self::Remote { .. }
            | Self::MissingRecord(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::RequiredField(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
