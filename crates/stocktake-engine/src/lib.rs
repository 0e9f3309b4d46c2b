//! Reconciliation engine for stocktake: strategy selection and the
//! fetch/transform/upsert pipeline, run under the store's single-flight
//! run registry.

pub mod engine;
pub mod strategy;

pub use engine::{
    EngineConfig, EngineError, ReconciliationEngine, SyncOptions, SyncReport,
    CACHE_INVALIDATION_PATTERN, CACHE_SUMMARY_KEY, INVENTORY_DOMAIN,
};
pub use strategy::{resolve_smart, SyncStrategy};
