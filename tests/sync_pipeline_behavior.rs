//! Behavior-driven tests for the reconciliation pipeline.
//!
//! These tests verify user-visible outcomes of a sync: what lands in the
//! store, how the run log reads afterwards, and how the pipeline behaves
//! under throttling and partial failure.

use serde_json::json;
use stocktake_core::domain::StockStatus;
use stocktake_core::http_client::{HttpResponse, MockHttpClient};
use stocktake_engine::{
    EngineConfig, SyncOptions, SyncStrategy, CACHE_SUMMARY_KEY, INVENTORY_DOMAIN,
};
use stocktake_store::{RunRegistry, RunStatus, Store, StoreConfig};
use stocktake_tests::{ping_ok, scripted_engine, scripted_source, Arc};
use tempfile::tempdir;

// =============================================================================
// Full sync: happy path
// =============================================================================

#[tokio::test]
async fn when_user_runs_a_full_sync_products_and_vendors_become_queryable() {
    // Given: a source with three products and two vendors
    let mock = Arc::new(MockHttpClient::new());
    mock.push_response(Ok(ping_ok()));
    mock.push_response(Ok(HttpResponse::ok_json(
        json!([
            {"sku": "W-100", "name": "Widget", "quantityOnHand": 0,
             "reorderPoint": 5, "vendorName": "Acme Supply"},
            {"sku": "W-200", "name": "Gadget", "quantityOnHand": 80,
             "reorderPoint": 10, "salesLast30Days": 30},
            {"sku": "W-300", "name": "Gizmo", "quantityOnHand": 8,
             "reorderPoint": 10}
        ])
        .to_string(),
    )));
    mock.push_response(Ok(HttpResponse::ok_json(
        json!([
            {"vendorId": "V-1", "vendorName": "Acme Supply"},
            {"name": "Globex", "email": "sales@globex.test"}
        ])
        .to_string(),
    )));
    let (engine, store, cache) = scripted_engine(mock, EngineConfig::default()).await;

    // When: the user runs a full sync
    let report = engine
        .run(SyncStrategy::Full, SyncOptions::default())
        .await
        .expect("sync completes");

    // Then: the run succeeds and everything is stored with derived status
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.items_updated, 3);
    assert_eq!(report.vendors_updated, 2);

    let critical = store
        .list_products(Some(StockStatus::Critical), 10)
        .await
        .expect("query critical products");
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].sku, "W-100");

    let low = store
        .get_product("W-300")
        .await
        .expect("query")
        .expect("stored");
    assert_eq!(low.stock_status, StockStatus::Low);

    let vendors = store.list_vendors(10).await.expect("query vendors");
    assert_eq!(vendors.len(), 2);

    // And: the summary read model is warmed in the cache
    let summary: stocktake_core::domain::InventorySummary = cache
        .get(CACHE_SUMMARY_KEY)
        .await
        .expect("summary cached after success");
    assert_eq!(summary.total_products, 3);
    assert_eq!(summary.critical, 1);
}

// =============================================================================
// Parallel-array payloads
// =============================================================================

#[tokio::test]
async fn when_the_source_sends_sparse_parallel_arrays_rows_are_reassembled() {
    // Given: a column-major payload where one column is short and one is
    // a scalar applying to every row
    let mock = Arc::new(MockHttpClient::new());
    mock.push_response(Ok(ping_ok()));
    mock.push_response(Ok(HttpResponse::ok_json(
        json!({
            "sku": ["P-1", "P-2", "P-3"],
            "name": ["Bolt", "Nut", "Washer"],
            "quantityOnHand": [12, 7],
            "binLocation": "aisle-4"
        })
        .to_string(),
    )));
    let (engine, store, _cache) = scripted_engine(mock, EngineConfig::default()).await;

    // When: the user syncs
    let report = engine
        .run(SyncStrategy::Inventory, SyncOptions::default())
        .await
        .expect("sync completes");

    // Then: all three rows exist; the hole defaults, the scalar repeats
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.items_updated, 3);

    let p3 = store
        .get_product("P-3")
        .await
        .expect("query")
        .expect("stored");
    assert_eq!(p3.on_hand, 0);
    assert_eq!(p3.location.as_deref(), Some("aisle-4"));

    let p2 = store
        .get_product("P-2")
        .await
        .expect("query")
        .expect("stored");
    assert_eq!(p2.on_hand, 7);
}

// =============================================================================
// Throttling and retries
// =============================================================================

#[tokio::test]
async fn when_the_source_throttles_the_sync_backs_off_and_still_succeeds() {
    // Given: the product fetch is rate limited once before succeeding
    let mock = Arc::new(MockHttpClient::new());
    mock.push_response(Ok(ping_ok()));
    mock.push_response(Ok(HttpResponse::with_status(429, "slow down")));
    mock.push_response(Ok(HttpResponse::ok_json(
        json!([{"sku": "R-1", "name": "Rivet"}]).to_string(),
    )));
    let (engine, _store, _cache) = scripted_engine(mock.clone(), EngineConfig::default()).await;

    // When: the user syncs
    let report = engine
        .run(SyncStrategy::Inventory, SyncOptions::default())
        .await
        .expect("sync completes");

    // Then: the retry absorbed the 429 and the run is clean
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.items_updated, 1);
    assert!(report.errors.is_empty());
    // ping + throttled fetch + retried fetch
    assert_eq!(mock.request_count(), 3);
}

// =============================================================================
// Partial failure
// =============================================================================

#[tokio::test]
async fn when_the_vendor_fetch_fails_products_still_land_and_the_run_is_partial() {
    // Given: products fetch cleanly but the vendor endpoint is down
    let mock = Arc::new(MockHttpClient::new());
    mock.push_response(Ok(ping_ok()));
    mock.push_response(Ok(HttpResponse::ok_json(
        json!([{"sku": "K-1", "name": "Cog"}]).to_string(),
    )));
    mock.push_response(Ok(HttpResponse::with_status(500, "boom")));
    mock.push_response(Ok(HttpResponse::with_status(500, "boom")));
    let (engine, store, _cache) = scripted_engine(mock, EngineConfig::default()).await;

    // When: the user runs a full sync
    let report = engine
        .run(SyncStrategy::Full, SyncOptions::default())
        .await
        .expect("sync completes");

    // Then: exactly one error entry, products persisted, status partial
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.items_updated, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("vendor fetch failed"));

    assert!(store
        .get_product("K-1")
        .await
        .expect("query")
        .is_some());

    // And: the run log carries the same accounting
    let registry = RunRegistry::new(&store);
    let latest = registry
        .latest_run(INVENTORY_DOMAIN)
        .await
        .expect("query")
        .expect("run recorded");
    assert_eq!(latest.status, RunStatus::Partial);
    assert_eq!(latest.errors.len(), 1);
}

#[tokio::test]
async fn when_one_batch_fails_the_others_still_land_and_are_accounted() {
    // Given: three products synced one per batch, where the middle row is
    // poisoned at the database level
    let mock = Arc::new(MockHttpClient::new());
    mock.push_response(Ok(ping_ok()));
    mock.push_response(Ok(HttpResponse::ok_json(
        json!([
            {"sku": "X-1", "name": "Axle"},
            {"sku": "X-2", "name": "Bearing"},
            {"sku": "X-3", "name": "Camshaft"}
        ])
        .to_string(),
    )));
    let (engine, store, _cache) = scripted_engine(
        mock,
        EngineConfig {
            batch_size: 1,
            ..EngineConfig::default()
        },
    )
    .await;
    sqlx::query(
        "CREATE TRIGGER poison_x2 BEFORE INSERT ON products
         WHEN NEW.sku = 'X-2'
         BEGIN SELECT RAISE(ABORT, 'simulated write failure'); END",
    )
    .execute(store.pool())
    .await
    .expect("install poison trigger");

    // When: the user syncs
    let report = engine
        .run(SyncStrategy::Inventory, SyncOptions::default())
        .await
        .expect("sync completes");

    // Then: the run is partial, updates count only the good batches, and
    // exactly one error entry names the failed batch
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.items_processed, 3);
    assert_eq!(report.items_updated, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("batch 2/3"));

    assert!(store.get_product("X-1").await.expect("query").is_some());
    assert!(store.get_product("X-2").await.expect("query").is_none());
    assert!(store.get_product("X-3").await.expect("query").is_some());
}

#[tokio::test]
async fn when_progress_writes_fail_the_run_still_completes() {
    // Given: a healthy source, but every progress-marker update on the run
    // log errors at the database level
    let mock = Arc::new(MockHttpClient::new());
    mock.push_response(Ok(ping_ok()));
    mock.push_response(Ok(HttpResponse::ok_json(
        json!([
            {"sku": "F-1", "name": "Flange", "quantityOnHand": 9},
            {"sku": "F-2", "name": "Fitting", "quantityOnHand": 14}
        ])
        .to_string(),
    )));
    let (engine, store, _cache) = scripted_engine(mock, EngineConfig::default()).await;
    sqlx::query(
        "CREATE TRIGGER progress_outage BEFORE UPDATE OF progress ON sync_runs
         BEGIN SELECT RAISE(ABORT, 'simulated run-log outage'); END",
    )
    .execute(store.pool())
    .await
    .expect("install progress trigger");

    // When: the user syncs
    let report = engine
        .run(SyncStrategy::Inventory, SyncOptions::default())
        .await
        .expect("sync completes despite progress failures");

    // Then: the run lands cleanly and nothing is left marked running
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.items_updated, 2);
    assert!(report.errors.is_empty());
    assert!(store.get_product("F-1").await.expect("query").is_some());

    let registry = RunRegistry::new(&store);
    assert!(registry
        .running_run(INVENTORY_DOMAIN)
        .await
        .expect("query")
        .is_none());
    let latest = registry
        .latest_run(INVENTORY_DOMAIN)
        .await
        .expect("query")
        .expect("run recorded");
    assert_eq!(latest.status, RunStatus::Success);
}

// =============================================================================
// Durability across processes
// =============================================================================

#[tokio::test]
async fn when_syncs_run_against_a_file_backed_store_state_survives_reopen() {
    // Given: a sync against an on-disk database
    let temp = tempdir().expect("tempdir");
    let db_path = temp
        .path()
        .join("stocktake.db")
        .to_string_lossy()
        .into_owned();

    let mock = Arc::new(MockHttpClient::new());
    mock.push_response(Ok(ping_ok()));
    mock.push_response(Ok(HttpResponse::ok_json(
        json!([{"sku": "D-1", "name": "Dowel", "quantityOnHand": 4}]).to_string(),
    )));

    {
        let store = Store::open(StoreConfig {
            db_path: db_path.clone(),
        })
        .await
        .expect("open store");
        let engine = stocktake_engine::ReconciliationEngine::new(
            scripted_source(mock),
            store,
            stocktake_core::cache::CacheStore::disabled(),
            EngineConfig::default(),
        );
        let report = engine
            .run(SyncStrategy::Inventory, SyncOptions::default())
            .await
            .expect("sync completes");
        assert_eq!(report.status, RunStatus::Success);
    }

    // When: a new process opens the same database
    let reopened = Store::open(StoreConfig { db_path }).await.expect("reopen");

    // Then: products and run history are still there
    assert!(reopened
        .get_product("D-1")
        .await
        .expect("query")
        .is_some());
    let registry = RunRegistry::new(&reopened);
    let latest = registry
        .latest_run(INVENTORY_DOMAIN)
        .await
        .expect("query")
        .expect("run survives reopen");
    assert_eq!(latest.status, RunStatus::Success);
}
