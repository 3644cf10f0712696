//! Promotion of column values shared by every visible row into a common
//! header.

use serde_json::Value;

use crate::model::{same_value, CommonKeyEntry, Mode, Row, ValueType};
use crate::table::columns::ResolvedColumn;

/// The single defined value `key` takes across all rows, if any.
/// Empty arrays and objects never count as a common value.
fn common_value(rows: &[Row], key: &str) -> Option<Value> {
    let first = rows.first()?.get(key).filter(|v| !v.is_null())?;
    match first {
        Value::Array(a) if a.is_empty() => return None,
        Value::Object(o) if o.is_empty() => return None,
        _ => {}
    }
    if rows.iter().all(|r| r.get(key).is_some_and(|v| same_value(v, first))) {
        Some(first.clone())
    } else {
        None
    }
}

/// Promote visible columns whose value is identical across every visible
/// row. Edit mode never promotes: a pending edit can make one row differ.
pub fn extract(rows: &[Row], columns: &[ResolvedColumn], mode: Mode) -> Vec<CommonKeyEntry> {
    if mode == Mode::Edit {
        return Vec::new();
    }
    let mut entries: Vec<CommonKeyEntry> = columns
        .iter()
        .filter(|c| c.visible && c.value_type != ValueType::Button)
        .filter_map(|c| {
            common_value(rows, &c.key).map(|value| CommonKeyEntry {
                column_key: c.key.clone(),
                title: c.title.clone(),
                value,
                sequence_number: c.sequence_number,
            })
        })
        .collect();
    entries.sort_by_key(|e| e.sequence_number);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnMetadata, OverrideSet, ViewMode};
    use crate::table::columns::resolve;
    use serde_json::json;

    fn rows(values: &[Value]) -> Vec<Row> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Row::new(i as i64, 0, v.as_object().cloned().unwrap()))
            .collect()
    }

    fn cols(spec: &[(&str, ValueType, i64)]) -> Vec<ResolvedColumn> {
        let meta: Vec<ColumnMetadata> = spec
            .iter()
            .map(|(k, t, seq)| {
                let mut c = ColumnMetadata::new(k, *t);
                c.sequence_number = *seq;
                c
            })
            .collect();
        resolve(&meta, &OverrideSet::default(), &ViewMode::default())
    }

    #[test]
    fn test_promotes_shared_value() {
        let r = rows(&[
            json!({"id": 1, "status": "OK"}),
            json!({"id": 2, "status": "OK"}),
            json!({"id": 3, "status": "OK"}),
        ]);
        let c = cols(&[("id", ValueType::Number, 0), ("status", ValueType::String, 1)]);
        let entries = extract(&r, &c, Mode::Read);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].column_key, "status");
        assert_eq!(entries[0].value, json!("OK"));
    }

    #[test]
    fn test_missing_value_disqualifies() {
        let r = rows(&[
            json!({"status": "OK"}),
            json!({"status": null}),
            json!({"status": "OK"}),
        ]);
        let c = cols(&[("status", ValueType::String, 0)]);
        assert!(extract(&r, &c, Mode::Read).is_empty());

        let r = rows(&[json!({"status": "OK"}), json!({})]);
        assert!(extract(&r, &c, Mode::Read).is_empty());
    }

    #[test]
    fn test_buttons_and_empty_collections_excluded() {
        let r = rows(&[
            json!({"act": "go", "tags": [], "meta": {}, "legs": [1]}),
            json!({"act": "go", "tags": [], "meta": {}, "legs": [1]}),
        ]);
        let c = cols(&[
            ("act", ValueType::Button, 0),
            ("tags", ValueType::Array, 1),
            ("meta", ValueType::Object, 2),
            ("legs", ValueType::Array, 3),
        ]);
        let entries = extract(&r, &c, Mode::Read);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].column_key, "legs");
    }

    #[test]
    fn test_integral_float_matches_integer() {
        let r = rows(&[json!({"px": 20}), json!({"px": 20.0}), json!({"px": 20})]);
        let c = cols(&[("px", ValueType::Number, 0)]);
        let entries = extract(&r, &c, Mode::Read);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, json!(20));

        let r = rows(&[json!({"px": 20}), json!({"px": 20.5})]);
        assert!(extract(&r, &c, Mode::Read).is_empty());
    }

    #[test]
    fn test_edit_mode_never_promotes() {
        let r = rows(&[json!({"status": "OK"}), json!({"status": "OK"})]);
        let c = cols(&[("status", ValueType::String, 0)]);
        assert!(extract(&r, &c, Mode::Edit).is_empty());
    }

    #[test]
    fn test_hidden_columns_not_promoted() {
        let r = rows(&[json!({"status": "OK"}), json!({"status": "OK"})]);
        let mut c = cols(&[("status", ValueType::String, 0)]);
        c[0].visible = false;
        assert!(extract(&r, &c, Mode::Read).is_empty());
    }

    #[test]
    fn test_ordered_by_sequence_number() {
        let r = rows(&[json!({"a": 1, "b": 2, "c": 3}), json!({"a": 1, "b": 2, "c": 3})]);
        let c = cols(&[
            ("a", ValueType::Number, 5),
            ("b", ValueType::Number, 1),
            ("c", ValueType::Number, 5),
        ]);
        let keys: Vec<String> = extract(&r, &c, Mode::Read)
            .into_iter()
            .map(|e| e.column_key)
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_no_rows_no_entries() {
        let c = cols(&[("status", ValueType::String, 0)]);
        assert!(extract(&[], &c, Mode::Read).is_empty());
    }
}
