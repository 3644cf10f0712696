//! Membership filters: each clause lists the values its field may take.

use std::collections::BTreeSet;

use crate::model::{coerce_str, FilterClause, Row};

/// Parsed clauses with empty allowed sets already dropped.
pub fn compile(filters: &[FilterClause]) -> Vec<(String, BTreeSet<String>)> {
    filters
        .iter()
        .map(|f| (f.fld_name.clone(), f.allowed_values()))
        .filter(|(_, allowed)| !allowed.is_empty())
        .collect()
}

pub fn matches(row: &Row, compiled: &[(String, BTreeSet<String>)]) -> bool {
    compiled
        .iter()
        .all(|(field, allowed)| allowed.contains(&coerce_str(row.get(field))))
}

/// Keep rows that pass every clause. A clause with nothing left after
/// parsing imposes no constraint.
pub fn apply(rows: Vec<Row>, filters: &[FilterClause]) -> Vec<Row> {
    let compiled = compile(filters);
    if compiled.is_empty() {
        return rows;
    }
    rows.into_iter().filter(|r| matches(r, &compiled)).collect()
}
