//! Request/response messages exchanged with the render layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logging::digest;
use crate::model::{
    ColumnMetadata, CommonKeyEntry, FilterClause, JoinSpec, Mode, OverrideSet, Row, SortOrder, ViewMode,
};
use crate::table::columns::ResolvedColumn;
use crate::table::key_codec::DEFAULT_SEPARATOR;

fn default_id_field() -> String {
    "_id".to_string()
}

fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

fn default_page_size() -> usize {
    25
}

/// One source collection as an owned snapshot of raw records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSnapshot {
    pub name: String,
    pub rows: Vec<Value>,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Abbreviated-key column the row id is decoded from, if any.
    #[serde(default)]
    pub key_field: Option<String>,
}

impl SourceSnapshot {
    pub fn new(name: &str, rows: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            rows,
            id_field: default_id_field(),
            key_field: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    pub sources: Vec<SourceSnapshot>,
    #[serde(default)]
    pub metadata: Vec<ColumnMetadata>,
    #[serde(default)]
    pub join_spec: JoinSpec,
    #[serde(default)]
    pub group_sort_orders: Vec<SortOrder>,
    #[serde(default)]
    pub sort_orders: Vec<SortOrder>,
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default)]
    pub overrides: OverrideSet,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_separator")]
    pub key_separator: char,
}

impl ComputeRequest {
    pub fn new(sources: Vec<SourceSnapshot>, metadata: Vec<ColumnMetadata>) -> Self {
        Self {
            sources,
            metadata,
            join_spec: JoinSpec::default(),
            group_sort_orders: Vec::new(),
            sort_orders: Vec::new(),
            filters: Vec::new(),
            page: 0,
            page_size: default_page_size(),
            view_mode: ViewMode::default(),
            overrides: OverrideSet::default(),
            mode: Mode::Read,
            key_separator: DEFAULT_SEPARATOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResponse {
    pub rows: Vec<Row>,
    pub grouped_rows: Vec<Vec<Row>>,
    pub active_page_rows: Vec<Vec<Row>>,
    pub max_group_size: usize,
    pub page_count: usize,
    pub columns: Vec<ResolvedColumn>,
    pub common_key_entries: Vec<CommonKeyEntry>,
    /// Visible layout columns left after common keys are lifted out.
    pub filtered_cells: Vec<ResolvedColumn>,
}

impl ComputeResponse {
    /// SHA-256 of the serialized bundle. Equal requests yield equal digests.
    pub fn digest(&self) -> String {
        digest(&serde_json::to_string(self).unwrap_or_default())
    }
}
