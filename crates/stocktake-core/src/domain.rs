//! Normalized domain records produced by the source adapter.
//!
//! The rest of the system only ever sees these row-major, validated types;
//! wire-shape quirks (parallel arrays, synonym field names) are handled in
//! [`crate::decode`] and [`crate::fields`] before records get here.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ValidationError;

/// Replenishment urgency classification.
///
/// Derived from on-hand stock, the reorder point, and projected days until
/// stockout. The check order is fixed business logic: critical before low
/// before overstocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Critical,
    Low,
    Adequate,
    Overstocked,
}

impl StockStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Low => "low",
            Self::Adequate => "adequate",
            Self::Overstocked => "overstocked",
        }
    }

    /// Classify a product.
    ///
    /// `days_until_stockout` is `None` when sales velocity is zero (the
    /// product never runs out on current trend). Zero stock is always
    /// critical regardless of any other signal.
    pub fn classify(on_hand: i64, reorder_point: i64, days_until_stockout: Option<i64>) -> Self {
        if on_hand == 0 || days_until_stockout.is_some_and(|d| d <= 7) {
            return Self::Critical;
        }
        if on_hand <= reorder_point || days_until_stockout.is_some_and(|d| d <= 30) {
            return Self::Low;
        }
        if days_until_stockout.is_some_and(|d| d > 90) {
            return Self::Overstocked;
        }
        Self::Adequate
    }
}

impl std::str::FromStr for StockStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "low" => Ok(Self::Low),
            "adequate" => Ok(Self::Adequate),
            "overstocked" => Ok(Self::Overstocked),
            _ => Err(()),
        }
    }
}

/// Average units sold per day over the trailing 30 days.
pub fn sales_velocity(sales_last_30_days: i64) -> f64 {
    if sales_last_30_days <= 0 {
        0.0
    } else {
        sales_last_30_days as f64 / 30.0
    }
}

/// Projected whole days until stock runs out; `None` when velocity is zero.
pub fn days_until_stockout(on_hand: i64, velocity: f64) -> Option<i64> {
    if velocity <= 0.0 {
        None
    } else {
        Some((on_hand as f64 / velocity).floor() as i64)
    }
}

/// Normalized product record, upsert-keyed on `sku`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub vendor_name: Option<String>,
    pub on_hand: i64,
    pub unit_cost: f64,
    pub location: Option<String>,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub sales_velocity: f64,
    pub stock_status: StockStatus,
    pub last_updated: OffsetDateTime,
}

impl Product {
    /// Build a validated product and derive velocity and stock status.
    ///
    /// Quantities are clamped to zero rather than rejected; a record is
    /// only invalid when its identity (`sku`) or `name` is missing.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        vendor_name: Option<String>,
        on_hand: i64,
        unit_cost: f64,
        location: Option<String>,
        reorder_point: i64,
        reorder_quantity: i64,
        sales_last_30_days: i64,
        last_updated: OffsetDateTime,
    ) -> Result<Self, ValidationError> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err(ValidationError::MissingField("sku"));
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }

        let on_hand = on_hand.max(0);
        let velocity = sales_velocity(sales_last_30_days);
        let days = days_until_stockout(on_hand, velocity);

        Ok(Self {
            sku,
            name,
            vendor_name,
            on_hand,
            unit_cost: unit_cost.max(0.0),
            location,
            reorder_point: reorder_point.max(0),
            reorder_quantity: reorder_quantity.max(0),
            sales_velocity: velocity,
            stock_status: StockStatus::classify(on_hand, reorder_point.max(0), days),
            last_updated,
        })
    }

    pub fn days_until_stockout(&self) -> Option<i64> {
        days_until_stockout(self.on_hand, self.sales_velocity)
    }
}

/// Normalized vendor record.
///
/// `source_id` is the external system's key; when absent the vendor name is
/// the best-effort upsert key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub source_id: Option<String>,
    pub name: String,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl Vendor {
    pub fn new(
        source_id: Option<String>,
        name: impl Into<String>,
        contact: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        address: Option<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        Ok(Self {
            source_id,
            name,
            contact,
            email,
            phone,
            address,
        })
    }
}

/// Aggregate counts over the local product table, cached as the
/// "inventory summary" read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InventorySummary {
    pub total_products: i64,
    pub critical: i64,
    pub low: i64,
    pub adequate: i64,
    pub overstocked: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn product(on_hand: i64, reorder_point: i64, sales_30d: i64) -> Product {
        Product::new(
            "SKU-1",
            "Widget",
            None,
            on_hand,
            1.25,
            None,
            reorder_point,
            10,
            sales_30d,
            OffsetDateTime::UNIX_EPOCH,
        )
        .expect("valid product")
    }

    #[test]
    fn zero_stock_is_critical_regardless_of_reorder_point() {
        assert_eq!(product(0, 10, 0).stock_status, StockStatus::Critical);
        assert_eq!(product(0, 0, 300).stock_status, StockStatus::Critical);
    }

    #[test]
    fn below_reorder_point_with_zero_velocity_is_low() {
        // Infinite days-until-stockout must not mask the reorder-point rule.
        let p = product(5, 10, 0);
        assert_eq!(p.sales_velocity, 0.0);
        assert_eq!(p.days_until_stockout(), None);
        assert_eq!(p.stock_status, StockStatus::Low);
    }

    #[test]
    fn imminent_stockout_is_critical_even_above_reorder_point() {
        // 30 sold/30 days = 1/day; 7 on hand => 7 days.
        assert_eq!(product(7, 0, 30).stock_status, StockStatus::Critical);
    }

    #[test]
    fn overstocked_requires_more_than_90_days_of_cover() {
        // 1000 on hand at 1/day => 1000 days.
        assert_eq!(product(1000, 10, 30).stock_status, StockStatus::Overstocked);
        // Exactly 90 days is not overstocked.
        assert_eq!(product(90, 10, 30).stock_status, StockStatus::Adequate);
    }

    #[test]
    fn healthy_mid_range_stock_is_adequate() {
        assert_eq!(product(60, 10, 30).stock_status, StockStatus::Adequate);
    }

    #[test]
    fn zero_velocity_above_reorder_point_is_adequate_not_overstocked() {
        assert_eq!(product(1000, 10, 0).stock_status, StockStatus::Adequate);
    }

    #[test]
    fn missing_sku_fails_validation() {
        let err = Product::new(
            "  ",
            "Widget",
            None,
            1,
            1.0,
            None,
            0,
            0,
            0,
            OffsetDateTime::UNIX_EPOCH,
        )
        .expect_err("blank sku must be rejected");
        assert_eq!(err, ValidationError::MissingField("sku"));
    }

    #[test]
    fn negative_quantities_are_clamped() {
        let p = product(-5, -3, -30);
        assert_eq!(p.on_hand, 0);
        assert_eq!(p.reorder_point, 0);
        assert_eq!(p.sales_velocity, 0.0);
    }

    #[test]
    fn vendor_requires_name() {
        assert!(Vendor::new(None, "", None, None, None, None).is_err());
        let v = Vendor::new(Some("42".into()), "Acme", None, None, None, None)
            .expect("valid vendor");
        assert_eq!(v.source_id.as_deref(), Some("42"));
    }
}
