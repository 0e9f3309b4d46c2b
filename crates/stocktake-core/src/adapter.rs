//! Source adapter: fetches raw records from the external inventory system
//! and normalizes them into domain types.
//!
//! The adapter is the only component that sees wire shapes. Payloads pass
//! through [`crate::decode`] (parallel-array transposition) and
//! [`crate::fields`] (synonym resolution) before becoming [`Product`] /
//! [`Vendor`] values; everything downstream is row-major and validated.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::SourceConfig;
use crate::decode;
use crate::domain::{Product, Vendor};
use crate::error::{SourceError, ValidationError};
use crate::fields;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::throttle::RateLimitedClient;

/// Raw row-major record as decoded from the wire, prior to normalization.
pub type RawRecord = Map<String, Value>;

/// Which slice of the catalog a product fetch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    /// Every product, optionally year-filtered.
    Full,
    /// Stock-level fields only; the cheap fetch.
    StockLevels,
    /// Source-side pre-filtered subset: items flagged critical.
    Critical,
    /// Source-side pre-filtered subset: actively selling items.
    Active,
}

impl FetchScope {
    const fn path(self) -> &'static str {
        match self {
            Self::Full => "/items",
            Self::StockLevels => "/items/stock-levels",
            Self::Critical => "/items/critical",
            Self::Active => "/items/active",
        }
    }
}

/// Product fetch parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductQuery {
    pub scope: FetchScope,
    /// Restrict to records last modified in this calendar year.
    pub modified_year: Option<i32>,
}

impl ProductQuery {
    pub const fn full() -> Self {
        Self {
            scope: FetchScope::Full,
            modified_year: None,
        }
    }

    pub const fn scoped(scope: FetchScope) -> Self {
        Self {
            scope,
            modified_year: None,
        }
    }

    pub const fn with_year(mut self, year: Option<i32>) -> Self {
        self.modified_year = year;
        self
    }
}

/// Source adapter contract consumed by the reconciliation engine.
///
/// Implementations must be `Send + Sync`; the engine shares one adapter
/// across a run and the cache warm-up path.
pub trait InventorySource: Send + Sync {
    /// Cheap connectivity/auth probe, called before any fetch.
    fn ping<'a>(&'a self)
        -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>>;

    fn fetch_products<'a>(
        &'a self,
        query: ProductQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, SourceError>> + Send + 'a>>;

    fn fetch_vendors<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, SourceError>> + Send + 'a>>;
}

/// Normalize a raw product record.
///
/// `fetched_at` stamps `last_updated` when the source omits a usable
/// modification timestamp.
pub fn normalize_product(
    raw: &RawRecord,
    fetched_at: OffsetDateTime,
) -> Result<Product, ValidationError> {
    let sku = fields::resolve_string(raw, fields::PRODUCT_SKU)
        .ok_or(ValidationError::MissingField("sku"))?;
    let name = fields::resolve_string(raw, fields::PRODUCT_NAME)
        .ok_or(ValidationError::MissingField("name"))?;

    let last_updated = fields::resolve_string(raw, fields::PRODUCT_LAST_MODIFIED)
        .and_then(|s| OffsetDateTime::parse(&s, &Rfc3339).ok())
        .unwrap_or(fetched_at);

    Product::new(
        sku,
        name,
        fields::resolve_string(raw, fields::PRODUCT_VENDOR),
        fields::resolve_i64(raw, fields::PRODUCT_ON_HAND).unwrap_or(0),
        fields::resolve_f64(raw, fields::PRODUCT_UNIT_COST).unwrap_or(0.0),
        fields::resolve_string(raw, fields::PRODUCT_LOCATION),
        fields::resolve_i64(raw, fields::PRODUCT_REORDER_POINT).unwrap_or(0),
        fields::resolve_i64(raw, fields::PRODUCT_REORDER_QUANTITY).unwrap_or(0),
        fields::resolve_i64(raw, fields::PRODUCT_SALES_30D).unwrap_or(0),
        last_updated,
    )
}

/// Normalize a raw vendor record.
pub fn normalize_vendor(raw: &RawRecord) -> Result<Vendor, ValidationError> {
    let name = fields::resolve_string(raw, fields::VENDOR_NAME)
        .ok_or(ValidationError::MissingField("name"))?;

    Vendor::new(
        fields::resolve_string(raw, fields::VENDOR_ID),
        name,
        fields::resolve_string(raw, fields::VENDOR_CONTACT),
        fields::resolve_string(raw, fields::VENDOR_EMAIL),
        fields::resolve_string(raw, fields::VENDOR_PHONE),
        fields::resolve_string(raw, fields::VENDOR_ADDRESS),
    )
}

/// HTTP-backed adapter for the real source system.
#[derive(Clone)]
pub struct HttpInventorySource {
    client: RateLimitedClient,
    auth: HttpAuth,
    base_url: String,
    timeout_ms: u64,
}

impl HttpInventorySource {
    /// Build from configuration, sharing the process-wide transport.
    pub fn new(config: &SourceConfig, transport: Arc<dyn HttpClient>) -> Self {
        Self {
            client: RateLimitedClient::new(
                transport,
                config.rate_limit,
                config.retry.clone(),
            ),
            auth: HttpAuth::Basic {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            base_url: config.base_url.clone(),
            timeout_ms: config.timeout_ms,
        }
    }

    fn request(&self, path_and_query: &str) -> HttpRequest {
        HttpRequest::get(format!("{}{}", self.base_url, path_and_query))
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout_ms)
    }

    async fn fetch_records(&self, path_and_query: &str) -> Result<Vec<RawRecord>, SourceError> {
        let response = self.client.fetch(self.request(path_and_query)).await?;

        if response.status == 401 || response.status == 403 {
            return Err(SourceError::connectivity(format!(
                "source rejected credentials (HTTP {})",
                response.status
            )));
        }
        if !response.is_success() {
            return Err(SourceError::connectivity(format!(
                "source returned HTTP {} for {path_and_query}",
                response.status
            )));
        }

        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|e| SourceError::malformed_payload(format!("invalid JSON: {e}")))?;
        let records = decode::decode_records(&payload)?;
        debug!(path = path_and_query, count = records.len(), "fetched source records");
        Ok(records)
    }
}

impl InventorySource for HttpInventorySource {
    fn ping<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self.client.fetch(self.request("/ping")).await?;
            if response.status == 401 || response.status == 403 {
                return Err(SourceError::connectivity(format!(
                    "source rejected credentials (HTTP {})",
                    response.status
                )));
            }
            if !response.is_success() {
                return Err(SourceError::connectivity(format!(
                    "connectivity probe failed (HTTP {})",
                    response.status
                )));
            }
            Ok(())
        })
    }

    fn fetch_products<'a>(
        &'a self,
        query: ProductQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let mut path = String::from(query.scope.path());
            if let Some(year) = query.modified_year {
                path.push_str(&format!(
                    "?modifiedAfter={}&modifiedBefore={}",
                    urlencoding::encode(&format!("{year}-01-01T00:00:00Z")),
                    urlencoding::encode(&format!("{}-01-01T00:00:00Z", year + 1)),
                ));
            }
            self.fetch_records(&path).await
        })
    }

    fn fetch_vendors<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, SourceError>> + Send + 'a>> {
        Box::pin(async move { self.fetch_records("/vendors").await })
    }
}
