//! Column visibility and joined-layout resolution.
//!
//! Precedence, highest first: view-mode blanket flags, per-column
//! overrides (force-show beats force-hide), base metadata. The
//! "show less" flag is orthogonal: it only marks a visible column as
//! collapsible in compact view.

use serde::{Deserialize, Serialize};

use crate::model::{ColumnMetadata, JoinSpec, OverrideSet, ValueType, ViewMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedColumn {
    pub key: String,
    pub title: String,
    pub value_type: ValueType,
    pub visible: bool,
    pub collapsible: bool,
    pub collapsed: bool,
    /// Group member this column instance renders in a joined layout.
    pub source_index: Option<usize>,
    pub sequence_number: i64,
}

pub fn resolve_one(col: &ColumnMetadata, overrides: &OverrideSet, mode: &ViewMode) -> ResolvedColumn {
    let per_column = if overrides.force_show.contains(&col.key) {
        true
    } else if overrides.force_hide.contains(&col.key) {
        false
    } else {
        !col.hide
    };
    let visible = mode.show_hidden || mode.show_all || per_column;
    let collapsible = col.show_less || overrides.show_less.contains(&col.key);
    let expanded = mode.show_all || mode.more_all || mode.show_more;
    ResolvedColumn {
        key: col.key.clone(),
        title: col.display_title().to_string(),
        value_type: col.value_type,
        visible,
        collapsible,
        collapsed: collapsible && !expanded,
        source_index: None,
        sequence_number: col.sequence_number,
    }
}

pub fn resolve(metadata: &[ColumnMetadata], overrides: &OverrideSet, mode: &ViewMode) -> Vec<ResolvedColumn> {
    metadata
        .iter()
        .map(|c| resolve_one(c, overrides, mode))
        .collect()
}

/// Repeat non-join columns once per group member. Join columns lead
/// unless `centered`, which places them between the left and right
/// member blocks; `flipped` mirrors the blocks (or, when centered, the
/// left side) so the two halves read outward from the join key.
pub fn joined_layout(columns: Vec<ResolvedColumn>, spec: &JoinSpec, group_size: usize) -> Vec<ResolvedColumn> {
    if group_size <= 1 || spec.join_fields.is_empty() {
        return columns;
    }
    let (join_cols, member_cols): (Vec<_>, Vec<_>) = columns
        .into_iter()
        .partition(|c| spec.join_fields.contains(&c.key));

    let blocks: Vec<Vec<ResolvedColumn>> = (0..group_size)
        .map(|i| {
            member_cols
                .iter()
                .cloned()
                .map(|mut c| {
                    c.source_index = Some(i);
                    c
                })
                .collect()
        })
        .collect();

    let mut out = Vec::new();
    if spec.centered {
        let split = (group_size + 1) / 2;
        let mut left: Vec<ResolvedColumn> = blocks[..split].concat();
        if spec.flipped {
            left.reverse();
        }
        out.extend(left);
        out.extend(join_cols);
        out.extend(blocks[split..].concat());
    } else {
        out.extend(join_cols);
        if spec.flipped {
            out.extend(blocks.into_iter().rev().flatten());
        } else {
            out.extend(blocks.into_iter().flatten());
        }
    }
    out
}
