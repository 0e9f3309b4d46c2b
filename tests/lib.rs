// Shared helpers for stocktake behavior tests.
pub use std::sync::Arc;

use stocktake_core::adapter::{HttpInventorySource, InventorySource};
use stocktake_core::cache::CacheStore;
use stocktake_core::config::SourceConfig;
use stocktake_core::http_client::{HttpResponse, MockHttpClient};
use stocktake_engine::{EngineConfig, ReconciliationEngine};
use stocktake_store::Store;

/// Adapter wired to a scripted transport, with the fast-retry profile so
/// backoff tests finish in milliseconds.
pub fn scripted_source(mock: Arc<MockHttpClient>) -> Arc<dyn InventorySource> {
    let config = SourceConfig::new("https://source.test/api", "api", "key")
        .expect("valid source config")
        .with_fast_retry();
    Arc::new(HttpInventorySource::new(&config, mock))
}

/// Engine over an in-memory store and a live cache.
pub async fn scripted_engine(
    mock: Arc<MockHttpClient>,
    config: EngineConfig,
) -> (ReconciliationEngine, Store, CacheStore) {
    let store = Store::open_in_memory().await.expect("open in-memory store");
    let cache = CacheStore::with_default_ttl();
    let engine = ReconciliationEngine::new(
        scripted_source(mock),
        store.clone(),
        cache.clone(),
        config,
    );
    (engine, store, cache)
}

/// A successful connectivity probe.
pub fn ping_ok() -> HttpResponse {
    HttpResponse::ok_json("{}")
}
