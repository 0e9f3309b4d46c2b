//! Sync strategies and the smart-selection heuristic.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use stocktake_core::adapter::{FetchScope, ProductQuery};
use stocktake_store::SyncRun;
use time::{Duration, OffsetDateTime};

/// How much of the catalog a sync covers.
///
/// `Smart` is not executable itself; it resolves to `Full` or `Inventory`
/// based on how stale the last full reconciliation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Everything: all products plus the vendor directory.
    Full,
    /// Stock-level refresh over the whole catalog; the cheap default.
    Inventory,
    /// Only items the source flags as critical.
    Critical,
    /// Only actively selling items.
    Active,
    /// Pick `Full` or `Inventory` from the run history.
    Smart,
}

impl SyncStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Inventory => "inventory",
            Self::Critical => "critical",
            Self::Active => "active",
            Self::Smart => "smart",
        }
    }

    /// The product fetch this strategy performs. Callers resolve `Smart`
    /// first; an unresolved `Smart` falls back to the full fetch.
    pub const fn product_query(self) -> ProductQuery {
        match self {
            Self::Full | Self::Smart => ProductQuery::full(),
            Self::Inventory => ProductQuery::scoped(FetchScope::StockLevels),
            Self::Critical => ProductQuery::scoped(FetchScope::Critical),
            Self::Active => ProductQuery::scoped(FetchScope::Active),
        }
    }

    /// Only a full sync refreshes the vendor directory.
    pub const fn includes_vendors(self) -> bool {
        matches!(self, Self::Full)
    }
}

impl std::fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve `Smart` against the most recent successful full run: a missing
/// or stale full sync forces `Full`, otherwise the cheap stock-level
/// refresh suffices. Non-smart strategies resolve to themselves.
pub fn resolve_smart(
    requested: SyncStrategy,
    last_full: Option<&SyncRun>,
    now: OffsetDateTime,
    full_refresh_interval: Duration,
) -> (SyncStrategy, &'static str) {
    if requested != SyncStrategy::Smart {
        return (requested, "requested explicitly");
    }
    match last_full {
        None => (SyncStrategy::Full, "no successful full sync on record"),
        Some(run) if run.age(now) >= full_refresh_interval => {
            (SyncStrategy::Full, "last full sync is stale")
        }
        Some(_) => (SyncStrategy::Inventory, "recent full sync found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stocktake_store::RunStatus;
    use uuid::Uuid;

    fn full_run(age: Duration) -> SyncRun {
        let started = OffsetDateTime::now_utc() - age;
        SyncRun {
            id: Uuid::new_v4(),
            domain: "inventory".into(),
            strategy: "full".into(),
            status: RunStatus::Success,
            started_at: started,
            completed_at: Some(started + Duration::minutes(3)),
            items_processed: 100,
            items_updated: 100,
            errors: Vec::new(),
            metadata: json!({}),
            progress: None,
        }
    }

    #[test]
    fn smart_falls_back_to_full_without_history() {
        let (resolved, _) = resolve_smart(
            SyncStrategy::Smart,
            None,
            OffsetDateTime::now_utc(),
            Duration::hours(24),
        );
        assert_eq!(resolved, SyncStrategy::Full);
    }

    #[test]
    fn smart_prefers_cheap_refresh_after_a_recent_full_sync() {
        let run = full_run(Duration::hours(2));
        let (resolved, _) = resolve_smart(
            SyncStrategy::Smart,
            Some(&run),
            OffsetDateTime::now_utc(),
            Duration::hours(24),
        );
        assert_eq!(resolved, SyncStrategy::Inventory);
    }

    #[test]
    fn smart_forces_full_when_the_last_full_sync_is_stale() {
        let run = full_run(Duration::hours(30));
        let (resolved, _) = resolve_smart(
            SyncStrategy::Smart,
            Some(&run),
            OffsetDateTime::now_utc(),
            Duration::hours(24),
        );
        assert_eq!(resolved, SyncStrategy::Full);
    }

    #[test]
    fn explicit_strategies_resolve_to_themselves() {
        for strategy in [
            SyncStrategy::Full,
            SyncStrategy::Inventory,
            SyncStrategy::Critical,
            SyncStrategy::Active,
        ] {
            let (resolved, reason) = resolve_smart(
                strategy,
                None,
                OffsetDateTime::now_utc(),
                Duration::hours(24),
            );
            assert_eq!(resolved, strategy);
            assert_eq!(reason, "requested explicitly");
        }
    }

    #[test]
    fn only_full_touches_vendors() {
        assert!(SyncStrategy::Full.includes_vendors());
        assert!(!SyncStrategy::Inventory.includes_vendors());
        assert!(!SyncStrategy::Critical.includes_vendors());
        assert!(!SyncStrategy::Active.includes_vendors());
    }
}
