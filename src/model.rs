//! Shared data model for the reconciliation engine.
//!
//! Everything here is plain data: rows decoded from push payloads, the
//! slice of schema metadata that drives merge/join/visibility decisions,
//! and the view options a widget sends with every recomputation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeSet;

// =============================================================================
// Rows
// =============================================================================

/// A decoded record. `row_id` is the merge/selection identity; `source` is
/// the index of the collection the row came from (used by joined layouts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub row_id: i64,
    #[serde(default)]
    pub source: usize,
    pub fields: Map<String, Value>,
}

impl Row {
    pub fn new(row_id: i64, source: usize, fields: Map<String, Value>) -> Self {
        Self { row_id, source, fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.fields, key)
    }
}

/// Resolve a column key against a record: exact key first, then a dotted
/// path into nested objects (`security.sec_id`).
pub fn lookup<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(v) = fields.get(key) {
        return Some(v);
    }
    if !key.contains('.') {
        return None;
    }
    let mut parts = key.split('.');
    let mut cur = fields.get(parts.next()?)?;
    for part in parts {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

/// String coercion used by filters, join keys and key encoding.
/// Missing and null both coerce to the empty string. Integral floats print
/// without a fraction, so `20.0` and `20` coerce alike.
pub fn coerce_str(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match (exact_int(n), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.is_finite() && f.fract() == 0.0 => format!("{:.0}", f),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn exact_int(n: &Number) -> Option<i128> {
    n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from))
}

/// Numeric order: exact when both sides are integers, f64 otherwise.
pub fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (exact_int(a), exact_int(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

/// Value equality with numbers compared by magnitude, so `20 == 20.0`.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Ordering::Equal,
        _ => a == b,
    }
}

pub fn is_defined(v: Option<&Value>) -> bool {
    !matches!(v, None | Some(Value::Null))
}

// =============================================================================
// Column metadata
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Date,
    Enum,
    Object,
    Array,
    Button,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub key: String,
    #[serde(default)]
    pub source_fields: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub number_format: Option<String>,
    #[serde(default)]
    pub color_rule: Option<String>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub show_less: bool,
    #[serde(default)]
    pub sequence_number: i64,
    /// For abbreviated-key columns: the id field the key packs.
    #[serde(default)]
    pub abbreviated: Option<String>,
}

impl ColumnMetadata {
    pub fn new(key: &str, value_type: ValueType) -> Self {
        Self {
            key: key.to_string(),
            source_fields: Vec::new(),
            title: String::new(),
            value_type,
            number_format: None,
            color_rule: None,
            hide: false,
            show_less: false,
            sequence_number: 0,
            abbreviated: None,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.key
        } else {
            &self.title
        }
    }
}

// =============================================================================
// View options
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOrder {
    pub order_by: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortOrder {
    pub fn asc(order_by: &str) -> Self {
        Self { order_by: order_by.to_string(), direction: Direction::Asc }
    }

    pub fn desc(order_by: &str) -> Self {
        Self { order_by: order_by.to_string(), direction: Direction::Desc }
    }
}

/// Filter clause in wire form: `fld_value` is a comma-separated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub fld_name: String,
    pub fld_value: String,
}

impl FilterClause {
    pub fn new(fld_name: &str, fld_value: &str) -> Self {
        Self { fld_name: fld_name.to_string(), fld_value: fld_value.to_string() }
    }

    pub fn allowed_values(&self) -> BTreeSet<String> {
        self.fld_value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    #[serde(default)]
    pub join_fields: Vec<String>,
    #[serde(default)]
    pub centered: bool,
    #[serde(default)]
    pub flipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideSet {
    #[serde(default)]
    pub force_show: BTreeSet<String>,
    #[serde(default)]
    pub force_hide: BTreeSet<String>,
    #[serde(default)]
    pub show_less: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMode {
    #[serde(default)]
    pub show_more: bool,
    #[serde(default)]
    pub more_all: bool,
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default)]
    pub show_all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Read,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonKeyEntry {
    pub column_key: String,
    pub title: String,
    pub value: Value,
    pub sequence_number: i64,
}

// =============================================================================
// Severity
// =============================================================================

/// Alert severity, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Accepts bare names and enum-style prefixes (`Severity_CRITICAL`).
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.rsplit('_').next().unwrap_or(raw).to_ascii_lowercase();
        match name.as_str() {
            "critical" => Some(Severity::Critical),
            "error" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            "debug" => Some(Severity::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}
