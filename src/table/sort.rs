//! Stable multi-key sorting.
//!
//! Orders are evaluated left to right; an equal key defers to the next
//! order. Null and missing values sort first regardless of direction.

use std::cmp::Ordering;

use serde_json::Value;

use crate::model::{compare_numbers, Direction, Row, SortOrder};

pub fn compare(a: &Row, b: &Row, orders: &[SortOrder], index: usize) -> Ordering {
    let Some(order) = orders.get(index) else {
        return Ordering::Equal;
    };
    let av = a.get(&order.order_by).filter(|v| !v.is_null());
    let bv = b.get(&order.order_by).filter(|v| !v.is_null());
    let ord = match (av, bv) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => {
            let natural = compare_values(x, y);
            match order.direction {
                Direction::Asc => natural,
                Direction::Desc => natural.reverse(),
            }
        }
    };
    match ord {
        Ordering::Equal => compare(a, b, orders, index + 1),
        other => other,
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Stable in-place sort of rows.
pub fn sort_rows(rows: &mut [Row], orders: &[SortOrder]) {
    if orders.is_empty() {
        return;
    }
    rows.sort_by(|a, b| compare(a, b, orders, 0));
}

/// Stable sort of groups, keyed on each group's first row.
pub fn sort_groups(groups: &mut [Vec<Row>], orders: &[SortOrder]) {
    if orders.is_empty() {
        return;
    }
    groups.sort_by(|a, b| match (a.first(), b.first()) {
        (Some(x), Some(y)) => compare(x, y, orders, 0),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: i64, v: Value) -> Row {
        Row::new(id, 0, v.as_object().cloned().unwrap())
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|r| r.row_id).collect()
    }

    #[test]
    fn test_single_key_directions() {
        let mut rows = vec![
            row(1, json!({"px": 3.0})),
            row(2, json!({"px": 1.0})),
            row(3, json!({"px": 2.0})),
        ];
        sort_rows(&mut rows, &[SortOrder::asc("px")]);
        assert_eq!(ids(&rows), vec![2, 3, 1]);
        sort_rows(&mut rows, &[SortOrder::desc("px")]);
        assert_eq!(ids(&rows), vec![1, 3, 2]);
    }

    #[test]
    fn test_tie_break_chain() {
        let mut rows = vec![
            row(1, json!({"sym": "B", "qty": 1})),
            row(2, json!({"sym": "A", "qty": 5})),
            row(3, json!({"sym": "A", "qty": 9})),
        ];
        sort_rows(&mut rows, &[SortOrder::asc("sym"), SortOrder::desc("qty")]);
        assert_eq!(ids(&rows), vec![3, 2, 1]);
    }

    #[test]
    fn test_null_first_in_both_directions() {
        let mut rows = vec![
            row(1, json!({"px": 2.0})),
            row(2, json!({"px": null})),
            row(3, json!({})),
            row(4, json!({"px": 1.0})),
        ];
        sort_rows(&mut rows, &[SortOrder::asc("px")]);
        assert_eq!(ids(&rows), vec![2, 3, 4, 1]);
        sort_rows(&mut rows, &[SortOrder::desc("px")]);
        assert_eq!(ids(&rows), vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_equal_keys_keep_original_order() {
        let mut rows: Vec<Row> = (0..20)
            .map(|i| row(i, json!({"bucket": i % 3})))
            .collect();
        sort_rows(&mut rows, &[SortOrder::asc("bucket")]);
        for window in rows.windows(2) {
            let (a, b) = (&window[0], &window[1]);
            if a.get("bucket") == b.get("bucket") {
                assert!(a.row_id < b.row_id);
            }
        }
    }

    #[test]
    fn test_large_integers_keep_exact_order() {
        let mut rows = vec![
            row(1, json!({"ts": 9_007_199_254_740_993u64})),
            row(2, json!({"ts": 9_007_199_254_740_992u64})),
            row(3, json!({"ts": 9_007_199_254_740_994i64})),
        ];
        sort_rows(&mut rows, &[SortOrder::asc("ts")]);
        assert_eq!(ids(&rows), vec![2, 1, 3]);
        sort_rows(&mut rows, &[SortOrder::desc("ts")]);
        assert_eq!(ids(&rows), vec![3, 1, 2]);
    }

    #[test]
    fn test_index_past_end_is_equal() {
        let a = row(1, json!({"x": 1}));
        let b = row(2, json!({"x": 2}));
        assert_eq!(compare(&a, &b, &[SortOrder::asc("x")], 1), Ordering::Equal);
    }

    #[test]
    fn test_groups_sort_by_first_row() {
        let mut groups = vec![
            vec![row(1, json!({"px": 5}))],
            vec![row(2, json!({"px": 1})), row(3, json!({"px": 9}))],
        ];
        sort_groups(&mut groups, &[SortOrder::asc("px")]);
        assert_eq!(groups[0][0].row_id, 2);
    }
}
