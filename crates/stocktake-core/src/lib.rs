//! # Stocktake Core
//!
//! Domain contracts and source-facing plumbing for the stocktake
//! inventory reconciliation toolkit:
//!
//! - **Normalized domain models** for products and vendors, including the
//!   derived stock-status classification
//! - **Source adapter** handling both row-major and parallel-array wire
//!   shapes and synonym field names
//! - **Rate-limited HTTP client** sharing one token bucket process-wide,
//!   with capped exponential backoff on 429/5xx
//! - **TTL cache** with pattern invalidation and a read-through wrapper
//!
//! The persistent store and the reconciliation engine live in
//! `stocktake-store` and `stocktake-engine`; this crate has no database
//! dependency.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod decode;
pub mod domain;
pub mod error;
pub mod fields;
pub mod http_client;
pub mod retry;
pub mod throttle;

pub use adapter::{
    normalize_product, normalize_vendor, FetchScope, HttpInventorySource, InventorySource,
    ProductQuery, RawRecord,
};
pub use cache::CacheStore;
pub use config::SourceConfig;
pub use domain::{
    days_until_stockout, sales_velocity, InventorySummary, Product, StockStatus, Vendor,
};
pub use error::{SourceError, SourceErrorKind, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpMethod, HttpRequest, HttpResponse, MockHttpClient,
    ReqwestHttpClient,
};
pub use retry::{Backoff, RetryConfig};
pub use throttle::{RateLimitConfig, RateLimitedClient};
