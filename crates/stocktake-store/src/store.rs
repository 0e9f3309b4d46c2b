//! SQLite-backed store for normalized products and vendors.
//!
//! The store is the source of truth; the cache layer in `stocktake-core` is
//! a disposable projection over it. Each batch upsert runs in its own
//! transaction so a failed batch never leaves half-written rows.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use stocktake_core::domain::{InventorySummary, Product, StockStatus, Vendor};
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::models::BatchResult;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite database path, e.g. `stocktake.db`.
    pub db_path: String,
}

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let url = format!("sqlite://{}?mode=rwc", config.db_path);
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::initialize_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory store for tests. A single connection keeps every query on
    /// the same ephemeral database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::initialize_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                sku TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                vendor_name TEXT,
                on_hand INTEGER NOT NULL DEFAULT 0,
                unit_cost REAL NOT NULL DEFAULT 0,
                location TEXT,
                reorder_point INTEGER NOT NULL DEFAULT 0,
                reorder_quantity INTEGER NOT NULL DEFAULT 0,
                sales_velocity REAL NOT NULL DEFAULT 0,
                stock_status TEXT NOT NULL,
                last_updated TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vendors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT,
                name TEXT NOT NULL,
                contact TEXT,
                email TEXT,
                phone TEXT,
                address TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Conflict keys for vendor upserts: source_id when present,
        // otherwise name (best effort). Name uniqueness only applies to
        // rows without a source key; distinct source vendors may share a
        // display name.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS vendors_source_id
             ON vendors(source_id) WHERE source_id IS NOT NULL",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS vendors_name
             ON vendors(name) WHERE source_id IS NULL",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_runs (
                id TEXT PRIMARY KEY,
                domain TEXT NOT NULL,
                strategy TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                items_processed INTEGER NOT NULL DEFAULT 0,
                items_updated INTEGER NOT NULL DEFAULT 0,
                errors TEXT NOT NULL DEFAULT '[]',
                metadata TEXT NOT NULL DEFAULT '{}',
                progress TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        // The single-flight invariant: at most one running row per domain,
        // enforced by the database so it survives restarts and holds across
        // processes sharing the store.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS sync_runs_single_flight
             ON sync_runs(domain) WHERE status = 'running'",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Upsert one batch of products keyed on `sku`, transactionally.
    ///
    /// The batch either lands fully or not at all; the caller records a
    /// failed batch and moves on to the next.
    pub async fn upsert_products(&self, batch: &[Product]) -> Result<BatchResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        for product in batch {
            sqlx::query(
                r#"
                INSERT INTO products (
                    sku, name, vendor_name, on_hand, unit_cost, location,
                    reorder_point, reorder_quantity, sales_velocity,
                    stock_status, last_updated
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(sku) DO UPDATE SET
                    name = excluded.name,
                    vendor_name = excluded.vendor_name,
                    on_hand = excluded.on_hand,
                    unit_cost = excluded.unit_cost,
                    location = excluded.location,
                    reorder_point = excluded.reorder_point,
                    reorder_quantity = excluded.reorder_quantity,
                    sales_velocity = excluded.sales_velocity,
                    stock_status = excluded.stock_status,
                    last_updated = excluded.last_updated
                "#,
            )
            .bind(&product.sku)
            .bind(&product.name)
            .bind(&product.vendor_name)
            .bind(product.on_hand)
            .bind(product.unit_cost)
            .bind(&product.location)
            .bind(product.reorder_point)
            .bind(product.reorder_quantity)
            .bind(product.sales_velocity)
            .bind(product.stock_status.as_str())
            .bind(product.last_updated)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(BatchResult {
            written: batch.len(),
            failed: 0,
        })
    }

    /// Upsert one batch of vendors, transactionally. Records with a
    /// `source_id` conflict on it; the rest conflict on `name` among
    /// rows that also lack a source key.
    pub async fn upsert_vendors(&self, batch: &[Vendor]) -> Result<BatchResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        for vendor in batch {
            let query = if vendor.source_id.is_some() {
                r#"
                INSERT INTO vendors (source_id, name, contact, email, phone, address)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(source_id) WHERE source_id IS NOT NULL DO UPDATE SET
                    name = excluded.name,
                    contact = excluded.contact,
                    email = excluded.email,
                    phone = excluded.phone,
                    address = excluded.address
                "#
            } else {
                r#"
                INSERT INTO vendors (source_id, name, contact, email, phone, address)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(name) WHERE source_id IS NULL DO UPDATE SET
                    contact = excluded.contact,
                    email = excluded.email,
                    phone = excluded.phone,
                    address = excluded.address
                "#
            };
            sqlx::query(query)
                .bind(&vendor.source_id)
                .bind(&vendor.name)
                .bind(&vendor.contact)
                .bind(&vendor.email)
                .bind(&vendor.phone)
                .bind(&vendor.address)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(BatchResult {
            written: batch.len(),
            failed: 0,
        })
    }

    pub async fn get_product(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT * FROM products WHERE sku = ?")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| product_from_row(&r)).transpose()
    }

    pub async fn list_products(
        &self,
        status: Option<StockStatus>,
        limit: i64,
    ) -> Result<Vec<Product>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM products WHERE stock_status = ? ORDER BY sku LIMIT ?",
                )
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM products ORDER BY sku LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(product_from_row).collect()
    }

    pub async fn list_vendors(&self, limit: i64) -> Result<Vec<Vendor>, StoreError> {
        let rows = sqlx::query(
            "SELECT source_id, name, contact, email, phone, address
             FROM vendors ORDER BY name LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Vendor {
                source_id: r.get("source_id"),
                name: r.get("name"),
                contact: r.get("contact"),
                email: r.get("email"),
                phone: r.get("phone"),
                address: r.get("address"),
            })
            .collect())
    }

    /// Aggregate stock-status counts, the backing query for the cached
    /// inventory summary.
    pub async fn inventory_summary(&self) -> Result<InventorySummary, StoreError> {
        let rows =
            sqlx::query("SELECT stock_status, COUNT(*) AS n FROM products GROUP BY stock_status")
                .fetch_all(&self.pool)
                .await?;

        let mut summary = InventorySummary::default();
        for row in rows {
            let count: i64 = row.get("n");
            summary.total_products += count;
            match row.get::<String, _>("stock_status").parse() {
                Ok(StockStatus::Critical) => summary.critical = count,
                Ok(StockStatus::Low) => summary.low = count,
                Ok(StockStatus::Adequate) => summary.adequate = count,
                Ok(StockStatus::Overstocked) => summary.overstocked = count,
                Err(()) => {}
            }
        }
        Ok(summary)
    }
}

fn product_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Product, StoreError> {
    let status_raw: String = row.get("stock_status");
    let stock_status = status_raw
        .parse()
        .map_err(|()| StoreError::Query(format!("unknown stock_status '{status_raw}'")))?;
    let last_updated: OffsetDateTime = row.get("last_updated");

    Ok(Product {
        sku: row.get("sku"),
        name: row.get("name"),
        vendor_name: row.get("vendor_name"),
        on_hand: row.get("on_hand"),
        unit_cost: row.get("unit_cost"),
        location: row.get("location"),
        reorder_point: row.get("reorder_point"),
        reorder_quantity: row.get("reorder_quantity"),
        sales_velocity: row.get("sales_velocity"),
        stock_status,
        last_updated,
    })
}
