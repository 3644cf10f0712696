//! Abbreviated (composite) key codec.
//!
//! A composite key packs several field values into one display string,
//! e.g. `AAPL-BUY-1042`, where one segment position is the record id.
//! `encode` is only a left-inverse of `decode` when no packed value contains
//! the separator; callers own that constraint.

use serde_json::{Map, Value};

use crate::model::{coerce_str, lookup, ColumnMetadata};

/// Returned by [`KeyLayout::decode`] when no id segment can be read.
pub const NO_ID: i64 = -1;

pub const DEFAULT_SEPARATOR: char = '-';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    pub fields: Vec<String>,
    pub id_position: Option<usize>,
    pub separator: char,
}

impl KeyLayout {
    pub fn new(fields: Vec<String>, id_position: Option<usize>) -> Self {
        Self { fields, id_position, separator: DEFAULT_SEPARATOR }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Derive a layout from the abbreviated column's metadata. The column's
    /// `source_fields` are the packed fields in order; `abbreviated` names
    /// the id field among them.
    pub fn from_metadata(column: &ColumnMetadata, separator: char) -> Self {
        let id_position = column
            .abbreviated
            .as_deref()
            .and_then(|id| column.source_fields.iter().position(|f| f == id));
        Self {
            fields: column.source_fields.clone(),
            id_position,
            separator,
        }
    }

    pub fn encode(&self, record: &Map<String, Value>) -> String {
        let sep = self.separator.to_string();
        self.fields
            .iter()
            .map(|f| coerce_str(lookup(record, f)))
            .collect::<Vec<_>>()
            .join(&sep)
    }

    /// Record id packed in `key`, or `NO_ID`. A real id of `-1` is
    /// indistinguishable from the sentinel here; use `try_decode` when that
    /// matters.
    pub fn decode(&self, key: &str) -> i64 {
        self.try_decode(key).unwrap_or(NO_ID)
    }

    pub fn try_decode(&self, key: &str) -> Option<i64> {
        let pos = self.id_position?;
        key.split(self.separator).nth(pos)?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;
    use serde_json::json;

    fn layout() -> KeyLayout {
        KeyLayout::new(
            vec!["symbol".to_string(), "side".to_string(), "id".to_string()],
            Some(2),
        )
    }

    #[test]
    fn test_encode_then_decode() {
        let rec = json!({"symbol": "AAPL", "side": "BUY", "id": 1042})
            .as_object()
            .cloned()
            .unwrap();
        let key = layout().encode(&rec);
        assert_eq!(key, "AAPL-BUY-1042");
        assert_eq!(layout().decode(&key), 1042);
    }

    #[test]
    fn test_no_id_segment_is_sentinel() {
        let l = KeyLayout::new(vec!["symbol".to_string()], None);
        assert_eq!(l.decode("AAPL"), NO_ID);
        assert_eq!(l.try_decode("AAPL"), None);
    }

    #[test]
    fn test_unparseable_segment_is_sentinel() {
        assert_eq!(layout().decode("AAPL-BUY-x"), NO_ID);
        assert_eq!(layout().decode("AAPL-BUY"), NO_ID);
    }

    #[test]
    fn test_separator_in_value_shifts_segments() {
        let rec = json!({"symbol": "BRK-B", "side": "SELL", "id": 7})
            .as_object()
            .cloned()
            .unwrap();
        let key = layout().encode(&rec);
        assert_ne!(layout().decode(&key), 7);
    }

    #[test]
    fn test_layout_from_metadata() {
        let mut col = ColumnMetadata::new("key", ValueType::String);
        col.source_fields = vec!["account".to_string(), "_id".to_string()];
        col.abbreviated = Some("_id".to_string());
        let l = KeyLayout::from_metadata(&col, '~');
        assert_eq!(l.id_position, Some(1));
        assert_eq!(l.decode("ACC1~55"), 55);
    }
}
