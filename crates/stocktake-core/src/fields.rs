//! Synonym-based field resolution for source payloads.
//!
//! The source system is inconsistent about field names: a vendor's name may
//! arrive as `vendorName`, `name`, or `primarySupplierName` depending on the
//! endpoint and record age. Each logical field carries an ordered candidate
//! list; the first present, non-empty candidate wins and a total miss yields
//! `None` rather than an error.

use serde_json::{Map, Value};

/// One logical field and its wire-name candidates, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub logical: &'static str,
    pub candidates: &'static [&'static str],
}

pub const PRODUCT_SKU: FieldSpec = FieldSpec {
    logical: "sku",
    candidates: &["sku", "itemCode", "productCode", "code"],
};

pub const PRODUCT_NAME: FieldSpec = FieldSpec {
    logical: "name",
    candidates: &["name", "itemName", "description"],
};

pub const PRODUCT_VENDOR: FieldSpec = FieldSpec {
    logical: "vendor_name",
    candidates: &["vendorName", "primarySupplierName", "supplierName", "vendor"],
};

pub const PRODUCT_ON_HAND: FieldSpec = FieldSpec {
    logical: "on_hand",
    candidates: &["onHand", "quantityOnHand", "qtyOnHand", "stockLevel"],
};

pub const PRODUCT_UNIT_COST: FieldSpec = FieldSpec {
    logical: "unit_cost",
    candidates: &["unitCost", "cost", "averageCost", "purchasePrice"],
};

pub const PRODUCT_LOCATION: FieldSpec = FieldSpec {
    logical: "location",
    candidates: &["location", "binLocation", "warehouse"],
};

pub const PRODUCT_REORDER_POINT: FieldSpec = FieldSpec {
    logical: "reorder_point",
    candidates: &["reorderPoint", "minStock", "minimumStock"],
};

pub const PRODUCT_REORDER_QUANTITY: FieldSpec = FieldSpec {
    logical: "reorder_quantity",
    candidates: &["reorderQuantity", "reorderQty", "orderQuantity"],
};

pub const PRODUCT_SALES_30D: FieldSpec = FieldSpec {
    logical: "sales_last_30_days",
    candidates: &["salesLast30Days", "sales30d", "unitsSold30Days"],
};

pub const PRODUCT_LAST_MODIFIED: FieldSpec = FieldSpec {
    logical: "last_modified",
    candidates: &["lastModified", "modifiedAt", "updatedAt"],
};

pub const VENDOR_ID: FieldSpec = FieldSpec {
    logical: "source_id",
    candidates: &["id", "vendorId", "supplierId"],
};

pub const VENDOR_NAME: FieldSpec = FieldSpec {
    logical: "name",
    candidates: &["vendorName", "name", "primarySupplierName"],
};

pub const VENDOR_CONTACT: FieldSpec = FieldSpec {
    logical: "contact",
    candidates: &["contact", "contactName", "attention"],
};

pub const VENDOR_EMAIL: FieldSpec = FieldSpec {
    logical: "email",
    candidates: &["email", "emailAddress", "contactEmail"],
};

pub const VENDOR_PHONE: FieldSpec = FieldSpec {
    logical: "phone",
    candidates: &["phone", "phoneNumber", "telephone"],
};

pub const VENDOR_ADDRESS: FieldSpec = FieldSpec {
    logical: "address",
    candidates: &["address", "streetAddress", "postalAddress"],
};

/// First present, non-null, non-empty candidate value.
pub fn resolve<'a>(record: &'a Map<String, Value>, spec: FieldSpec) -> Option<&'a Value> {
    for candidate in spec.candidates {
        match record.get(*candidate) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s.trim().is_empty() => continue,
            Some(value) => return Some(value),
        }
    }
    None
}

/// Resolve to an owned trimmed string; numbers are stringified.
pub fn resolve_string(record: &Map<String, Value>, spec: FieldSpec) -> Option<String> {
    match resolve(record, spec)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolve to an integer, accepting numeric strings and truncating floats.
pub fn resolve_i64(record: &Map<String, Value>, spec: FieldSpec) -> Option<i64> {
    match resolve(record, spec)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Resolve to a float, accepting numeric strings.
pub fn resolve_f64(record: &Map<String, Value>, spec: FieldSpec) -> Option<f64> {
    match resolve(record, spec)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
