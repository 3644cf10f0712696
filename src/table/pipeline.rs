//! Full recomputation: request snapshot in, render bundle out.
//!
//! Pure over its input. Nothing downstream of the buffers is patched
//! incrementally; every call rebuilds rows, groups, page, columns and
//! common keys from scratch, so the same request always yields the same
//! response.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::ComputeError;
use crate::logging::{v_str, ProfileScope};
use crate::message::{ComputeRequest, ComputeResponse};
use crate::model::Row;
use crate::table::key_codec::KeyLayout;
use crate::table::merge::BufferSpec;
use crate::table::{columns, common_keys, filter, join, paginate};

pub fn validate(req: &ComputeRequest) -> Result<(), ComputeError> {
    if req.page_size == 0 {
        return Err(ComputeError::InvalidPageSize);
    }
    let mut keys = HashSet::new();
    for col in &req.metadata {
        if !keys.insert(col.key.as_str()) {
            return Err(ComputeError::DuplicateColumn(col.key.clone()));
        }
    }
    if req.metadata.is_empty() {
        return Ok(());
    }
    for field in &req.join_spec.join_fields {
        if !keys.contains(field.as_str()) {
            return Err(ComputeError::UnknownJoinField(field.clone()));
        }
    }
    for order in req.sort_orders.iter().chain(&req.group_sort_orders) {
        if !keys.contains(order.order_by.as_str()) {
            return Err(ComputeError::UnknownSortColumn(order.order_by.clone()));
        }
    }
    Ok(())
}

/// Decode every source's raw records into rows, in source order.
pub fn decode_sources(req: &ComputeRequest) -> Result<Vec<Row>, ComputeError> {
    let mut rows = Vec::new();
    for (source_idx, source) in req.sources.iter().enumerate() {
        let mut spec = BufferSpec::new(None).with_id_field(&source.id_field);
        if let Some(field) = &source.key_field {
            if let Some(col) = req.metadata.iter().find(|c| &c.key == field) {
                spec = spec.with_key(field, KeyLayout::from_metadata(col, req.key_separator));
            }
        }
        for (index, raw) in source.rows.iter().enumerate() {
            let Value::Object(fields) = raw else {
                return Err(ComputeError::InvalidRow { source_name: source.name.clone(), index });
            };
            rows.push(Row::new(spec.record_id(fields), source_idx, fields.clone()));
        }
    }
    Ok(rows)
}

pub fn compute(req: &ComputeRequest) -> Result<ComputeResponse, ComputeError> {
    let _scope = ProfileScope::with_context(
        "pipeline.compute",
        &[("sources", v_str(&req.sources.len().to_string()))],
    );
    validate(req)?;

    let rows = decode_sources(req)?;
    let rows = filter::apply(rows, &req.filters);
    let grouped_rows = join::group_and_sort(rows, &req.join_spec, &req.group_sort_orders, &req.sort_orders);
    let max_group_size = join::max_group_size(&grouped_rows);
    let rows: Vec<Row> = grouped_rows.iter().flatten().cloned().collect();

    let active_page_rows = paginate::slice(&grouped_rows, req.page, req.page_size);
    let page_count = paginate::page_count(grouped_rows.len(), req.page_size);

    let base = columns::resolve(&req.metadata, &req.overrides, &req.view_mode);
    let common_key_entries = common_keys::extract(&rows, &base, req.mode);
    let columns = columns::joined_layout(base, &req.join_spec, max_group_size);
    let filtered_cells = columns
        .iter()
        .filter(|c| c.visible && !common_key_entries.iter().any(|e| e.column_key == c.key))
        .cloned()
        .collect();

    Ok(ComputeResponse {
        rows,
        grouped_rows,
        active_page_rows,
        max_group_size,
        page_count,
        columns,
        common_key_entries,
        filtered_cells,
    })
}
