//! Sync types: triggers, policies and the run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What caused a sync run to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    /// Connectivity came back after being lost.
    ConnectivityRestored,
    /// The app became visible again.
    Visible,
    /// The app regained focus.
    Focus,
    /// Explicit user request.
    Manual,
    /// A write was just recorded locally.
    OfflineWrite,
}

impl Trigger {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectivityRestored => "connectivity-restored",
            Self::Visible => "visible",
            Self::Focus => "focus",
            Self::Manual => "manual",
            Self::OfflineWrite => "offline-write",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connectivity-restored" | "online" => Ok(Self::ConnectivityRestored),
            "visible" => Ok(Self::Visible),
            "focus" => Ok(Self::Focus),
            "manual" => Ok(Self::Manual),
            "offline-write" | "write" => Ok(Self::OfflineWrite),
            _ => Err(format!("Unknown trigger: {s}")),
        }
    }
}

/// How category failures affect the rest of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPolicy {
    /// Run every category concurrently and record each outcome.
    #[default]
    BestEffort,
    /// Run categories in order and stop at the first failure.
    FailFast,
}

impl std::fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BestEffort => write!(f, "best-effort"),
            Self::FailFast => write!(f, "fail-fast"),
        }
    }
}

impl std::str::FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(Self::BestEffort),
            "fail-fast" | "fail_fast" => Ok(Self::FailFast),
            _ => Err(format!("Unknown sync policy: {s}")),
        }
    }
}

/// Why a run did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Offline,
    InProgress,
    NoSession,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::InProgress => "in-progress",
            Self::NoSession => "no-session",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity category synced by its own routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Transactions,
    Profile,
    Forecasts,
}

impl Category {
    /// Fail-fast execution order.
    pub const ALL: [Self; 3] = [Self::Transactions, Self::Profile, Self::Forecasts];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transactions => write!(f, "transactions"),
            Self::Profile => write!(f, "profile"),
            Self::Forecasts => write!(f, "forecasts"),
        }
    }
}

/// How a category routine ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// The routine walked every row. Individual rows may still have failed.
    Completed,
    /// The routine itself could not run (e.g. the store query failed).
    Failed,
    /// Not started because an earlier category failed under fail-fast.
    Aborted,
}

/// A single failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub category: Category,
    /// Row the failure belongs to; `None` for category-level failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    pub message: String,
    pub retryable: bool,
}

/// Per-category outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: Category,
    pub status: CategoryStatus,
    /// Rows sent to the remote.
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    /// Rows left alone because they belong to another owner.
    pub skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<SyncFailure>,
}

impl CategoryReport {
    #[must_use]
    pub fn new(category: Category) -> Self {
        Self {
            category,
            status: CategoryStatus::Completed,
            attempted: 0,
            synced: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    /// A category whose routine could not run at all.
    #[must_use]
    pub fn failed(category: Category, error: &crate::Error) -> Self {
        let mut report = Self::new(category);
        report.status = CategoryStatus::Failed;
        report.errors.push(SyncFailure {
            category,
            local_id: None,
            message: error.to_string(),
            retryable: error.error_code().is_retryable(),
        });
        report
    }

    #[must_use]
    pub fn aborted(category: Category) -> Self {
        let mut report = Self::new(category);
        report.status = CategoryStatus::Aborted;
        report
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.synced += 1;
    }

    pub fn record_failure(&mut self, local_id: &str, error: &crate::Error) {
        self.attempted += 1;
        self.failed += 1;
        self.errors.push(SyncFailure {
            category: self.category,
            local_id: Some(local_id.to_string()),
            message: error.to_string(),
            retryable: error.error_code().is_retryable(),
        });
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// True when the routine failed or any of its rows did.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.status == CategoryStatus::Failed || self.failed > 0
    }
}

/// Outcome of one `sync_all` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRunSummary {
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<SyncFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub categories: Vec<CategoryReport>,
}

impl SyncRunSummary {
    /// A run that did nothing.
    #[must_use]
    pub fn skipped(trigger: Trigger, started_at: DateTime<Utc>, reason: SkipReason) -> Self {
        Self {
            trigger,
            started_at,
            finished_at: Utc::now(),
            total_count: 0,
            success_count: 0,
            failure_count: 0,
            skipped: true,
            skip_reason: Some(reason),
            errors: Vec::new(),
            categories: Vec::new(),
        }
    }

    /// Aggregate per-category reports into a run summary.
    #[must_use]
    pub fn from_reports(
        trigger: Trigger,
        started_at: DateTime<Utc>,
        categories: Vec<CategoryReport>,
    ) -> Self {
        let total_count = categories.iter().map(|c| c.attempted).sum();
        let success_count = categories.iter().map(|c| c.synced).sum();
        let errors: Vec<SyncFailure> = categories
            .iter()
            .flat_map(|c| c.errors.iter().cloned())
            .collect();

        Self {
            trigger,
            started_at,
            finished_at: Utc::now(),
            total_count,
            success_count,
            failure_count: errors.len(),
            skipped: false,
            skip_reason: None,
            errors,
            categories,
        }
    }

    /// True if at least one category routine ran to completion.
    #[must_use]
    pub fn any_completed(&self) -> bool {
        self.categories
            .iter()
            .any(|c| c.status == CategoryStatus::Completed)
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    /// Report for one category, if it was part of the run.
    #[must_use]
    pub fn category(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Payload of the `sync-complete` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncComplete {
    pub success_count: usize,
    pub total_count: usize,
}

/// Payload of the `sync-error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailureEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}
