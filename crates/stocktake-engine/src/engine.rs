//! Reconciliation engine: orchestrates one sync run end to end.
//!
//! A run moves through fetch, transform, and upsert phases under a
//! registry-held single-flight claim. Source and persistence failures are
//! folded into the run outcome (error or partial status); only registry
//! and claim failures surface as [`EngineError`].

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use stocktake_core::adapter::{normalize_product, normalize_vendor, InventorySource};
use stocktake_core::cache::CacheStore;
use stocktake_core::domain::{Product, Vendor};
use stocktake_store::{
    ActiveRun, RunOutcome, RunRegistry, RunStatus, StartOutcome, Store, StoreError,
    META_DRY_RUN, META_FILTER_YEAR, META_TRIGGER,
};

use crate::strategy::{resolve_smart, SyncStrategy};

/// Cache key for the inventory summary read model.
pub const CACHE_SUMMARY_KEY: &str = "inventory:summary";
/// Invalidation pattern covering every inventory-derived cache entry.
pub const CACHE_INVALIDATION_PATTERN: &str = "inventory:*";

/// Sync domain name used in the run log.
pub const INVENTORY_DOMAIN: &str = "inventory";

#[derive(Debug, Error)]
pub enum EngineError {
    /// Another run holds the domain; carries its age and last progress.
    #[error("a sync run is already in progress (run {run_id}, {age_minutes}m old)",
        run_id = .0.run_id, age_minutes = .0.age.whole_minutes())]
    AlreadyRunning(ActiveRun),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-run options orthogonal to the strategy.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Fetch and transform for real, but write nothing.
    pub dry_run: bool,
    /// Restrict the fetch to records last modified in this calendar year.
    pub filter_year: Option<i32>,
    /// What initiated the run ("cli", "schedule", ...).
    pub trigger: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            filter_year: None,
            trigger: String::from("cli"),
        }
    }
}

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Products per upsert transaction.
    pub batch_size: usize,
    /// Soft wall-clock budget; checked between batches, never mid-batch.
    pub time_budget: Option<std::time::Duration>,
    /// Staleness bound for the smart strategy's full-sync heuristic.
    pub full_refresh_interval: time::Duration,
    /// How many normalized products a dry run reports back.
    pub dry_run_sample_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            time_budget: None,
            full_refresh_interval: time::Duration::hours(24),
            dry_run_sample_size: 5,
        }
    }
}

/// What one run did, as reported to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: uuid::Uuid,
    pub requested_strategy: SyncStrategy,
    pub strategy: SyncStrategy,
    /// Why the smart heuristic chose this strategy.
    pub strategy_reason: String,
    pub status: RunStatus,
    pub dry_run: bool,
    pub items_processed: i64,
    pub items_updated: i64,
    pub skipped_invalid: i64,
    pub vendors_updated: i64,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    /// First few normalized products; populated on dry runs only.
    pub sample: Vec<Product>,
}

/// Accumulated state of the run body, folded into the report.
#[derive(Debug, Default)]
struct RunTally {
    items_processed: i64,
    items_updated: i64,
    skipped_invalid: i64,
    vendors_updated: i64,
    errors: Vec<String>,
    fatal: bool,
    sample: Vec<Product>,
}

impl RunTally {
    fn fatal(message: String) -> Self {
        Self {
            errors: vec![message],
            fatal: true,
            ..Self::default()
        }
    }

    fn status(&self) -> RunStatus {
        if self.fatal {
            RunStatus::Error
        } else if self.errors.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        }
    }
}

pub struct ReconciliationEngine {
    source: Arc<dyn InventorySource>,
    store: Store,
    registry: RunRegistry,
    cache: CacheStore,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        source: Arc<dyn InventorySource>,
        store: Store,
        cache: CacheStore,
        config: EngineConfig,
    ) -> Self {
        let registry = RunRegistry::new(&store);
        Self {
            source,
            store,
            registry,
            cache,
            config,
        }
    }

    pub fn with_registry(mut self, registry: RunRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Execute one sync run.
    ///
    /// Source and batch failures become the run's terminal status, and
    /// progress-marker writes are best effort; the `Err` path is reserved
    /// for losing the single-flight claim and for failures writing the
    /// terminal run record.
    #[instrument(skip(self, options), fields(dry_run = options.dry_run))]
    pub async fn run(
        &self,
        strategy: SyncStrategy,
        options: SyncOptions,
    ) -> Result<SyncReport, EngineError> {
        let started = Instant::now();
        let now = OffsetDateTime::now_utc();

        let last_full = self.registry.latest_successful_full(INVENTORY_DOMAIN).await?;
        let (resolved, reason) = resolve_smart(
            strategy,
            last_full.as_ref(),
            now,
            self.config.full_refresh_interval,
        );
        if resolved != strategy {
            info!(requested = %strategy, resolved = %resolved, reason, "smart strategy resolved");
        }

        let metadata = json!({
            (META_DRY_RUN): options.dry_run,
            (META_TRIGGER): options.trigger,
            (META_FILTER_YEAR): options.filter_year,
            "requested_strategy": strategy.as_str(),
        });

        let run = match self
            .registry
            .try_start(INVENTORY_DOMAIN, resolved.as_str(), metadata)
            .await?
        {
            StartOutcome::Started(run) => run,
            StartOutcome::AlreadyRunning(active) => {
                return Err(EngineError::AlreadyRunning(active))
            }
        };

        let tally = self.execute(run.id, resolved, &options, started).await;
        let status = tally.status();

        self.registry
            .complete(
                run.id,
                &RunOutcome {
                    status,
                    items_processed: tally.items_processed,
                    items_updated: tally.items_updated,
                    errors: tally.errors.clone(),
                },
            )
            .await?;

        if !options.dry_run && status != RunStatus::Error {
            self.refresh_cache(status).await?;
        }

        info!(
            run_id = %run.id,
            status = status.as_str(),
            processed = tally.items_processed,
            updated = tally.items_updated,
            skipped = tally.skipped_invalid,
            "sync run finished"
        );

        Ok(SyncReport {
            run_id: run.id,
            requested_strategy: strategy,
            strategy: resolved,
            strategy_reason: reason.to_string(),
            status,
            dry_run: options.dry_run,
            items_processed: tally.items_processed,
            items_updated: tally.items_updated,
            skipped_invalid: tally.skipped_invalid,
            vendors_updated: tally.vendors_updated,
            errors: tally.errors,
            duration_ms: started.elapsed().as_millis() as u64,
            sample: tally.sample,
        })
    }

    /// The run body: probe, fetch, transform, upsert. Never fails the run
    /// record itself; everything is folded into the tally.
    async fn execute(
        &self,
        run_id: uuid::Uuid,
        strategy: SyncStrategy,
        options: &SyncOptions,
        started: Instant,
    ) -> RunTally {
        if let Err(e) = self.source.ping().await {
            return RunTally::fatal(format!("source unreachable: {e}"));
        }

        self.note_progress(run_id, "fetching products", 0).await;
        let query = strategy.product_query().with_year(options.filter_year);
        let raw_products = match self.source.fetch_products(query).await {
            Ok(records) => records,
            Err(e) => return RunTally::fatal(format!("product fetch failed: {e}")),
        };

        let mut tally = RunTally {
            items_processed: raw_products.len() as i64,
            ..RunTally::default()
        };

        let fetched_at = OffsetDateTime::now_utc();
        let mut products: Vec<Product> = Vec::with_capacity(raw_products.len());
        for raw in &raw_products {
            match normalize_product(raw, fetched_at) {
                Ok(product) => products.push(product),
                Err(e) => {
                    tally.skipped_invalid += 1;
                    warn!(error = %e, "skipping invalid product record");
                }
            }
        }

        if options.dry_run {
            tally.sample = products
                .iter()
                .take(self.config.dry_run_sample_size)
                .cloned()
                .collect();
            return tally;
        }

        self.upsert_products(run_id, &products, started, &mut tally)
            .await;

        if strategy.includes_vendors() && !self.budget_exceeded(started) {
            self.sync_vendors(run_id, &mut tally).await;
        }

        tally
    }

    async fn upsert_products(
        &self,
        run_id: uuid::Uuid,
        products: &[Product],
        started: Instant,
        tally: &mut RunTally,
    ) {
        let batch_size = self.config.batch_size.max(1);
        let total_batches = products.len().div_ceil(batch_size);

        for (index, batch) in products.chunks(batch_size).enumerate() {
            // Budget is soft: a batch in flight always completes, the
            // check happens only at batch boundaries.
            if index > 0 && self.budget_exceeded(started) {
                tally.errors.push(format!(
                    "time budget exhausted after batch {index} of {total_batches}; stopping early"
                ));
                return;
            }

            self.note_progress(
                run_id,
                &format!("upserting batch {}/{total_batches}", index + 1),
                tally.items_processed,
            )
            .await;

            match self.store.upsert_products(batch).await {
                Ok(result) => tally.items_updated += result.written as i64,
                Err(e) => {
                    warn!(batch = index + 1, error = %e, "product batch failed");
                    tally.errors.push(format!(
                        "persisting batch {}/{total_batches}: {e}",
                        index + 1
                    ));
                }
            }
        }
    }

    async fn sync_vendors(&self, run_id: uuid::Uuid, tally: &mut RunTally) {
        self.note_progress(run_id, "syncing vendors", tally.items_processed)
            .await;

        let raw_vendors = match self.source.fetch_vendors().await {
            Ok(records) => records,
            Err(e) => {
                tally.errors.push(format!("vendor fetch failed: {e}"));
                return;
            }
        };

        let mut vendors: Vec<Vendor> = Vec::with_capacity(raw_vendors.len());
        for raw in &raw_vendors {
            match normalize_vendor(raw) {
                Ok(vendor) => vendors.push(vendor),
                Err(e) => {
                    tally.skipped_invalid += 1;
                    warn!(error = %e, "skipping invalid vendor record");
                }
            }
        }

        match self.store.upsert_vendors(&vendors).await {
            Ok(result) => tally.vendors_updated = result.written as i64,
            Err(e) => tally.errors.push(format!("persisting vendors: {e}")),
        }
    }

    /// Best-effort progress marker. A run must never abort (or stay
    /// `running`) because a progress write failed; the marker is purely
    /// observational.
    async fn note_progress(&self, run_id: uuid::Uuid, phase: &str, items_processed: i64) {
        if let Err(e) = self
            .registry
            .record_progress(run_id, phase, items_processed)
            .await
        {
            warn!(run_id = %run_id, phase, error = %e, "failed to record run progress");
        }
    }

    /// Drop stale derived entries, then warm the summary after a clean run.
    async fn refresh_cache(&self, status: RunStatus) -> Result<(), EngineError> {
        let dropped = self.cache.delete_pattern(CACHE_INVALIDATION_PATTERN).await;
        if dropped > 0 {
            info!(dropped, "invalidated inventory cache entries");
        }
        if status == RunStatus::Success {
            let summary = self.store.inventory_summary().await?;
            self.cache.set(CACHE_SUMMARY_KEY, &summary, None).await;
        }
        Ok(())
    }

    fn budget_exceeded(&self, started: Instant) -> bool {
        self.config
            .time_budget
            .is_some_and(|budget| started.elapsed() >= budget)
    }
}
