//! Run registry: single-flight enforcement and stuck-run recovery.
//!
//! `try_start` is an atomic check-and-insert against the `sync_runs` table;
//! the partial unique index (`domain` where status = 'running') is what
//! actually holds the invariant, so two processes racing on the same store
//! cannot both start. A crashed run that never completed is retired lazily
//! here once it crosses the stuck threshold, and eagerly by the maintenance
//! sweep (`find_stuck_runs` / `retire_stuck`).

use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{RunOutcome, RunStatus, SyncRun, META_RETIRED_STUCK};
use crate::store::Store;

/// Default age after which a `running` record is presumed orphaned.
pub const DEFAULT_STUCK_THRESHOLD: Duration = Duration::minutes(30);

/// Snapshot of the active run returned when `try_start` is refused.
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub run_id: Uuid,
    pub age: Duration,
    pub progress: Option<String>,
}

/// Outcome of a start attempt. `AlreadyRunning` is normal control flow,
/// not an error: the caller gets the active run's age and last progress.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    Started(SyncRun),
    AlreadyRunning(ActiveRun),
}

#[derive(Debug, Clone)]
pub struct RunRegistry {
    pool: SqlitePool,
    stuck_threshold: Duration,
}

impl RunRegistry {
    pub fn new(store: &Store) -> Self {
        Self {
            pool: store.pool().clone(),
            stuck_threshold: DEFAULT_STUCK_THRESHOLD,
        }
    }

    pub fn with_stuck_threshold(mut self, threshold: Duration) -> Self {
        self.stuck_threshold = threshold;
        self
    }

    /// Atomically claim the domain, creating a `running` run record.
    ///
    /// An existing `running` record younger than the stuck threshold makes
    /// this return [`StartOutcome::AlreadyRunning`]. An older one is
    /// retired first (self-healing) and the new run proceeds.
    pub async fn try_start(
        &self,
        domain: &str,
        strategy: &str,
        metadata: Value,
    ) -> Result<StartOutcome, StoreError> {
        let now = OffsetDateTime::now_utc();

        if let Some(active) = self.running_run(domain).await? {
            if active.age(now) >= self.stuck_threshold {
                self.retire_stuck(&active).await?;
            } else {
                return Ok(StartOutcome::AlreadyRunning(ActiveRun {
                    run_id: active.id,
                    age: active.age(now),
                    progress: active.progress,
                }));
            }
        }

        let run = SyncRun {
            id: Uuid::new_v4(),
            domain: domain.to_string(),
            strategy: strategy.to_string(),
            status: RunStatus::Running,
            started_at: now,
            completed_at: None,
            items_processed: 0,
            items_updated: 0,
            errors: Vec::new(),
            metadata,
            progress: None,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO sync_runs
                (id, domain, strategy, status, started_at, items_processed,
                 items_updated, errors, metadata)
            VALUES (?, ?, ?, 'running', ?, 0, 0, '[]', ?)
            "#,
        )
        .bind(run.id.to_string())
        .bind(&run.domain)
        .bind(&run.strategy)
        .bind(run.started_at)
        .bind(run.metadata.to_string())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                info!(run_id = %run.id, domain, strategy, "sync run started");
                Ok(StartOutcome::Started(run))
            }
            // Lost the race against a concurrent try_start: the partial
            // unique index rejected our insert.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let active = self.running_run(domain).await?.map_or(
                    ActiveRun {
                        run_id: run.id,
                        age: Duration::ZERO,
                        progress: None,
                    },
                    |r| ActiveRun {
                        run_id: r.id,
                        age: r.age(OffsetDateTime::now_utc()),
                        progress: r.progress,
                    },
                );
                Ok(StartOutcome::AlreadyRunning(active))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Record the terminal outcome. A run transitions exactly once; a
    /// second complete on the same id is a no-op on an already-terminal row.
    pub async fn complete(&self, run_id: Uuid, outcome: &RunOutcome) -> Result<(), StoreError> {
        debug_assert!(outcome.status.is_terminal());
        let errors =
            serde_json::to_string(&outcome.errors).unwrap_or_else(|_| String::from("[]"));

        let result = sqlx::query(
            r#"
            UPDATE sync_runs
            SET status = ?, completed_at = ?, items_processed = ?,
                items_updated = ?, errors = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(outcome.status.as_str())
        .bind(OffsetDateTime::now_utc())
        .bind(outcome.items_processed)
        .bind(outcome.items_updated)
        .bind(errors)
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        info!(run_id = %run_id, status = outcome.status.as_str(), "sync run completed");
        Ok(())
    }

    /// Update the run's progress marker while it executes.
    pub async fn record_progress(
        &self,
        run_id: Uuid,
        progress: &str,
        items_processed: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sync_runs SET progress = ?, items_processed = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(progress)
        .bind(items_processed)
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Runs still marked `running` whose age exceeds `max_age`.
    pub async fn find_stuck_runs(
        &self,
        domain: &str,
        max_age: Duration,
    ) -> Result<Vec<SyncRun>, StoreError> {
        let cutoff = OffsetDateTime::now_utc() - max_age;
        let rows = sqlx::query(
            "SELECT * FROM sync_runs
             WHERE domain = ? AND status = 'running' AND started_at < ?
             ORDER BY started_at",
        )
        .bind(domain)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(run_from_row).collect()
    }

    /// Retire a stuck run: terminal `error` status, duration = now minus
    /// start, and a metadata flag so alerting can tell it apart from a
    /// genuine failure.
    pub async fn retire_stuck(&self, run: &SyncRun) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let age = run.age(now);

        let mut metadata = run.metadata.clone();
        if let Some(map) = metadata.as_object_mut() {
            map.insert(META_RETIRED_STUCK.to_string(), Value::Bool(true));
        }
        let mut errors = run.errors.clone();
        errors.push(format!(
            "retired stale run after {} minutes without completion",
            age.whole_minutes()
        ));
        let errors = serde_json::to_string(&errors).unwrap_or_else(|_| String::from("[]"));

        let result = sqlx::query(
            r#"
            UPDATE sync_runs
            SET status = 'error', completed_at = ?, errors = ?, metadata = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(now)
        .bind(errors)
        .bind(metadata.to_string())
        .bind(run.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            warn!(
                run_id = %run.id,
                domain = %run.domain,
                age_minutes = age.whole_minutes(),
                "retired stuck sync run"
            );
        }
        Ok(())
    }

    /// The currently `running` run for a domain, if any.
    pub async fn running_run(&self, domain: &str) -> Result<Option<SyncRun>, StoreError> {
        let row = sqlx::query("SELECT * FROM sync_runs WHERE domain = ? AND status = 'running'")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    /// Most recent run (any status) for a domain.
    pub async fn latest_run(&self, domain: &str) -> Result<Option<SyncRun>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM sync_runs WHERE domain = ?
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    /// Most recent successful, non-dry-run `full` sync; feeds the smart
    /// strategy's freshness heuristic.
    pub async fn latest_successful_full(
        &self,
        domain: &str,
    ) -> Result<Option<SyncRun>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM sync_runs
            WHERE domain = ? AND strategy = 'full' AND status = 'success'
              AND COALESCE(json_extract(metadata, '$.dry_run'), 0) = 0
            ORDER BY started_at DESC LIMIT 1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    /// Bounded run history, newest first.
    pub async fn recent_runs(&self, domain: &str, limit: i64) -> Result<Vec<SyncRun>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM sync_runs WHERE domain = ?
             ORDER BY started_at DESC LIMIT ?",
        )
        .bind(domain)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(run_from_row).collect()
    }
}

fn run_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SyncRun, StoreError> {
    let id_raw: String = row.get("id");
    let id = Uuid::parse_str(&id_raw)
        .map_err(|e| StoreError::Query(format!("invalid run id '{id_raw}': {e}")))?;
    let status_raw: String = row.get("status");
    let status = status_raw
        .parse()
        .map_err(|()| StoreError::Query(format!("unknown run status '{status_raw}'")))?;
    let errors_raw: String = row.get("errors");
    let errors = serde_json::from_str(&errors_raw).unwrap_or_default();
    let metadata_raw: String = row.get("metadata");
    let metadata =
        serde_json::from_str(&metadata_raw).unwrap_or(Value::Object(Default::default()));

    Ok(SyncRun {
        id,
        domain: row.get("domain"),
        strategy: row.get("strategy"),
        status,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        items_processed: row.get("items_processed"),
        items_updated: row.get("items_updated"),
        errors,
        metadata,
        progress: row.get("progress"),
    })
}
