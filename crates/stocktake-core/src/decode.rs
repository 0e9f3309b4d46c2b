//! Wire-shape decoding for source payloads.
//!
//! The source system returns record sets in one of two shapes:
//!
//! - row-major: `[{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]`
//! - column-major ("parallel arrays"): `{"id": [1, 2], "name": ["A", "B"]}`
//!
//! Everything downstream works on row-major records, so the column-major
//! shape is transposed here, before any domain logic runs. Sparse columns
//! (null holes, short arrays) simply leave the field absent for that row.

use serde_json::{Map, Value};

use crate::error::SourceError;

/// Column names whose array-valued presence marks a payload as column-major.
const ID_LIKE_COLUMNS: &[&str] = &["id", "sku", "itemCode", "vendorId", "productCode"];

/// True when the object carries same-length-array columns keyed by an
/// id-like name, i.e. the parallel-array encoding.
pub fn is_column_major(payload: &Map<String, Value>) -> bool {
    ID_LIKE_COLUMNS
        .iter()
        .any(|col| matches!(payload.get(*col), Some(Value::Array(_))))
}

/// Transpose a column-major object into row-major records.
///
/// Row count is the longest array column; non-array values are treated as
/// scalar columns repeated for every row (the source does this for
/// request-level metadata like `warehouseId`).
pub fn transpose(payload: &Map<String, Value>) -> Vec<Map<String, Value>> {
    let rows = payload
        .values()
        .filter_map(|v| v.as_array().map(Vec::len))
        .max()
        .unwrap_or(0);

    let mut records = Vec::with_capacity(rows);
    for index in 0..rows {
        let mut record = Map::new();
        for (column, value) in payload {
            match value {
                Value::Array(items) => match items.get(index) {
                    None | Some(Value::Null) => {}
                    Some(item) => {
                        record.insert(column.clone(), item.clone());
                    }
                },
                Value::Null => {}
                scalar => {
                    record.insert(column.clone(), scalar.clone());
                }
            }
        }
        records.push(record);
    }
    records
}

/// Decode a record-set payload into row-major records, accepting either
/// wire shape. The payload may also nest the record set under a `data` or
/// `items` envelope key.
pub fn decode_records(payload: &Value) -> Result<Vec<Map<String, Value>>, SourceError> {
    match payload {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object().cloned().ok_or_else(|| {
                    SourceError::malformed_payload("record array contains a non-object element")
                })
            })
            .collect(),
        Value::Object(map) => {
            if is_column_major(map) {
                return Ok(transpose(map));
            }
            for envelope in ["data", "items", "records"] {
                if let Some(inner) = map.get(envelope) {
                    return decode_records(inner);
                }
            }
            // A single bare record.
            Ok(vec![map.clone()])
        }
        Value::Null => Ok(Vec::new()),
        _ => Err(SourceError::malformed_payload(
            "record set is neither an array nor an object",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().expect("object literal").clone()
    }

    #[test]
    fn column_major_payload_is_detected() {
        assert!(is_column_major(&obj(json!({"id": [1, 2], "name": ["A", "B"]}))));
        assert!(!is_column_major(&obj(json!({"id": 1, "name": "A"}))));
        assert!(!is_column_major(&obj(json!({"name": ["A", "B"]}))));
    }

    #[test]
    fn transpose_preserves_order() {
        let rows = transpose(&obj(json!({"id": [1, 2], "name": ["A", "B"]})));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&json!(1)));
        assert_eq!(rows[0].get("name"), Some(&json!("A")));
        assert_eq!(rows[1].get("id"), Some(&json!(2)));
        assert_eq!(rows[1].get("name"), Some(&json!("B")));
    }

    #[test]
    fn sparse_column_leaves_field_absent() {
        let rows = transpose(&obj(json!({"id": [1, 2], "name": ["A", null]})));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("id"), Some(&json!(2)));
        assert_eq!(rows[1].get("name"), None);
    }

    #[test]
    fn short_column_does_not_panic() {
        let rows = transpose(&obj(json!({"id": [1, 2, 3], "name": ["A"]})));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("name"), Some(&json!("A")));
        assert_eq!(rows[2].get("name"), None);
        assert_eq!(rows[2].get("id"), Some(&json!(3)));
    }

    #[test]
    fn scalar_columns_repeat_per_row() {
        let rows = transpose(&obj(json!({"id": [1, 2], "warehouseId": "W1"})));
        assert_eq!(rows[0].get("warehouseId"), Some(&json!("W1")));
        assert_eq!(rows[1].get("warehouseId"), Some(&json!("W1")));
    }

    #[test]
    fn decode_accepts_row_major_arrays() {
        let rows =
            decode_records(&json!([{"id": 1}, {"id": 2}])).expect("row-major decodes");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn decode_unwraps_data_envelope() {
        let rows = decode_records(&json!({"data": {"id": [1, 2], "name": ["A", "B"]}}))
            .expect("enveloped column-major decodes");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), Some(&json!("B")));
    }

    #[test]
    fn decode_rejects_non_object_rows() {
        assert!(decode_records(&json!([1, 2, 3])).is_err());
        assert!(decode_records(&json!("nope")).is_err());
    }

    #[test]
    fn decode_null_is_empty() {
        assert!(decode_records(&Value::Null).expect("null decodes").is_empty());
    }
}
