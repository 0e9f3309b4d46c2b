//! Persistent record types for sync runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a sync run. A run is created `running` and moves to
/// exactly one terminal state; it is never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Error,
    Partial,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
            Self::Partial => "partial",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::str::FromStr for RunStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "partial" => Ok(Self::Partial),
            _ => Err(()),
        }
    }
}

/// Metadata key marking a run retired by stuck-run detection, so alerting
/// can distinguish it from a genuine failure.
pub const META_RETIRED_STUCK: &str = "retired_stuck";
/// Metadata key recording dry-run mode.
pub const META_DRY_RUN: &str = "dry_run";
/// Metadata key recording what triggered the run (cli, schedule, ...).
pub const META_TRIGGER: &str = "trigger";
/// Metadata key recording the optional last-modified-year filter.
pub const META_FILTER_YEAR: &str = "filter_year";

/// One sync run, as persisted in the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    /// Sync domain, e.g. "inventory". Single-flight is enforced per domain.
    pub domain: String,
    pub strategy: String,
    pub status: RunStatus,
    pub started_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
    pub items_processed: i64,
    pub items_updated: i64,
    /// Ordered error log (one entry per failed batch or fatal condition).
    pub errors: Vec<String>,
    /// Free-form run metadata (dry-run flag, trigger, filter year, ...).
    pub metadata: Value,
    /// Last progress marker ("fetching", "upserting batch 3/12", ...).
    pub progress: Option<String>,
}

impl SyncRun {
    /// Age relative to `now`, saturating at zero.
    pub fn age(&self, now: OffsetDateTime) -> time::Duration {
        (now - self.started_at).max(time::Duration::ZERO)
    }

    /// Wall-clock duration, defined once the run is terminal.
    pub fn duration(&self) -> Option<time::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }

    pub fn was_retired_stuck(&self) -> bool {
        self.metadata
            .get(META_RETIRED_STUCK)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_dry_run(&self) -> bool {
        self.metadata
            .get(META_DRY_RUN)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Terminal result a caller hands to `RunRegistry::complete`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub items_processed: i64,
    pub items_updated: i64,
    pub errors: Vec<String>,
}

impl RunOutcome {
    pub fn success(items_processed: i64, items_updated: i64) -> Self {
        Self {
            status: RunStatus::Success,
            items_processed,
            items_updated,
            errors: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            items_processed: 0,
            items_updated: 0,
            errors: vec![message.into()],
        }
    }
}

/// Result of one batch upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchResult {
    pub written: usize,
    pub failed: usize,
}
