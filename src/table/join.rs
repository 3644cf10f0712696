//! Grouping of rows that agree on the join fields, one group per rendered
//! line.

use std::collections::HashMap;

use crate::model::{coerce_str, JoinSpec, Row, SortOrder};
use crate::table::sort;

/// Group rows by equality on the join fields, keeping first-seen group
/// order and source order inside each group. No join fields means every
/// row is its own group.
pub fn group(rows: Vec<Row>, spec: &JoinSpec) -> Vec<Vec<Row>> {
    if spec.join_fields.is_empty() {
        return rows.into_iter().map(|r| vec![r]).collect();
    }
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<Vec<Row>> = Vec::new();
    for row in rows {
        let key: Vec<String> = spec
            .join_fields
            .iter()
            .map(|f| coerce_str(row.get(f)))
            .collect();
        match index.get(&key) {
            Some(&slot) => groups[slot].push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }
    groups
}

/// Group, sort inside each group, then sort the groups.
pub fn group_and_sort(
    rows: Vec<Row>,
    spec: &JoinSpec,
    group_orders: &[SortOrder],
    orders: &[SortOrder],
) -> Vec<Vec<Row>> {
    let mut groups = group(rows, spec);
    if !group_orders.is_empty() {
        for g in groups.iter_mut() {
            sort::sort_rows(g, group_orders);
        }
    }
    sort::sort_groups(&mut groups, orders);
    groups
}

pub fn max_group_size(groups: &[Vec<Row>]) -> usize {
    groups.iter().map(Vec::len).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn row(id: i64, source: usize, v: Value) -> Row {
        Row::new(id, source, v.as_object().cloned().unwrap())
    }

    fn spec(fields: &[&str]) -> JoinSpec {
        JoinSpec {
            join_fields: fields.iter().map(|f| f.to_string()).collect(),
            centered: false,
            flipped: false,
        }
    }

    fn group_ids(groups: &[Vec<Row>]) -> Vec<Vec<i64>> {
        groups
            .iter()
            .map(|g| g.iter().map(|r| r.row_id).collect())
            .collect()
    }

    #[test]
    fn test_no_join_fields_gives_singletons() {
        let rows = vec![row(1, 0, json!({"a": 1})), row(2, 0, json!({"a": 1}))];
        let groups = group(rows, &JoinSpec::default());
        assert_eq!(group_ids(&groups), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_rows_from_two_sources_join() {
        let rows = vec![
            row(1, 0, json!({"sym": "AAPL", "side": "BID"})),
            row(2, 0, json!({"sym": "MSFT", "side": "BID"})),
            row(3, 1, json!({"sym": "AAPL", "side": "ASK"})),
            row(4, 1, json!({"sym": "MSFT", "side": "ASK"})),
        ];
        let groups = group(rows, &spec(&["sym"]));
        assert_eq!(group_ids(&groups), vec![vec![1, 3], vec![2, 4]]);
        assert_eq!(max_group_size(&groups), 2);
    }

    #[test]
    fn test_multi_field_join() {
        let rows = vec![
            row(1, 0, json!({"a": 1, "b": "x"})),
            row(2, 0, json!({"a": 1, "b": "y"})),
            row(3, 0, json!({"a": 1, "b": "x"})),
        ];
        let groups = group(rows, &spec(&["a", "b"]));
        assert_eq!(group_ids(&groups), vec![vec![1, 3], vec![2]]);
    }

    #[test]
    fn test_group_internal_then_cross_group_sort() {
        let rows = vec![
            row(1, 0, json!({"sym": "MSFT", "px": 2})),
            row(2, 0, json!({"sym": "AAPL", "px": 9})),
            row(3, 0, json!({"sym": "MSFT", "px": 1})),
            row(4, 0, json!({"sym": "AAPL", "px": 3})),
        ];
        let groups = group_and_sort(
            rows,
            &spec(&["sym"]),
            &[SortOrder::asc("px")],
            &[SortOrder::asc("sym")],
        );
        assert_eq!(group_ids(&groups), vec![vec![4, 2], vec![3, 1]]);
    }

    #[test]
    fn test_integral_float_joins_integer() {
        let rows = vec![
            row(1, 0, json!({"px": 20})),
            row(2, 1, json!({"px": 20.0})),
            row(3, 1, json!({"px": 20.5})),
        ];
        let groups = group(rows, &spec(&["px"]));
        assert_eq!(group_ids(&groups), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_empty_input() {
        let groups = group(Vec::new(), &spec(&["sym"]));
        assert!(groups.is_empty());
        assert_eq!(max_group_size(&groups), 0);
    }
}
