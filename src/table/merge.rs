//! Incremental merge of push updates into a bounded ordered buffer.
//!
//! Every apply first removes the existing row with the same identifier, so
//! the buffer never holds two rows for one id and an upsert replaces in
//! place without any secondary index. Cost is O(n) per event.
//!
//! Eviction depends on the signed `uiLimit`:
//!
//! | uiLimit   | insert at | evict from | notes                              |
//! |-----------|-----------|------------|------------------------------------|
//! | absent    | back      | never      |                                    |
//! | `>= 0`    | back      | front      | oldest first                       |
//! | `< 0`     | front     | back       | most recent first                  |
//! | `< 0`+sev | front     | lowest     | severity desc, then timestamp desc |

use std::collections::VecDeque;

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::model::{is_defined, lookup, Row, Severity};
use crate::table::key_codec::{KeyLayout, NO_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Unbounded,
    Append(usize),
    Prepend(usize),
}

impl Capacity {
    pub fn from_ui_limit(limit: Option<i64>) -> Self {
        match limit {
            None => Capacity::Unbounded,
            Some(n) if n >= 0 => Capacity::Append(n as usize),
            Some(n) => Capacity::Prepend(n.unsigned_abs() as usize),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Capacity::Unbounded => None,
            Capacity::Append(n) | Capacity::Prepend(n) => Some(*n),
        }
    }
}

/// How a collection's records are identified, bounded and ranked.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSpec {
    pub capacity: Capacity,
    pub severity_ranked: bool,
    pub id_field: String,
    pub severity_field: String,
    pub timestamp_field: String,
    /// When set, ids are decoded from this abbreviated-key field.
    pub key: Option<(String, KeyLayout)>,
}

impl BufferSpec {
    pub fn new(ui_limit: Option<i64>) -> Self {
        Self {
            capacity: Capacity::from_ui_limit(ui_limit),
            severity_ranked: false,
            id_field: "_id".to_string(),
            severity_field: "severity".to_string(),
            timestamp_field: "last_update_date_time".to_string(),
            key: None,
        }
    }

    /// Alert-like collection. Severity retention only applies when the
    /// limit is negative.
    pub fn alerts(ui_limit: Option<i64>) -> Self {
        Self { severity_ranked: true, ..Self::new(ui_limit) }
    }

    pub fn with_id_field(mut self, field: &str) -> Self {
        self.id_field = field.to_string();
        self
    }

    pub fn with_key(mut self, field: &str, layout: KeyLayout) -> Self {
        self.key = Some((field.to_string(), layout));
        self
    }

    /// Id from the abbreviated key when it decodes, else from `id_field`.
    pub fn record_id(&self, record: &Map<String, Value>) -> i64 {
        if let Some((field, layout)) = &self.key {
            if let Some(Value::String(s)) = lookup(record, field) {
                if let Some(id) = layout.try_decode(s) {
                    return id;
                }
            }
        }
        match lookup(record, &self.id_field) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(NO_ID),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(NO_ID),
            _ => NO_ID,
        }
    }

    fn is_identifier(&self, field: &str) -> bool {
        field == self.id_field || self.key.as_ref().is_some_and(|(key, _)| key == field)
    }

    fn ranked_mode(&self) -> bool {
        self.severity_ranked && matches!(self.capacity, Capacity::Prepend(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeEvent {
    Upsert { id: i64, record: Map<String, Value> },
    Tombstone { id: i64 },
}

impl MergeEvent {
    /// Classify a raw push record. A record carrying nothing beyond its
    /// identifiers (id field, abbreviated key) is a delete; for alert
    /// buffers a dismissed alert is also a delete. Records without a
    /// readable id yield `None`.
    pub fn from_record(spec: &BufferSpec, record: Map<String, Value>) -> Option<Self> {
        let id = spec.record_id(&record);
        if id == NO_ID {
            return None;
        }
        let payload = record
            .iter()
            .filter(|(k, v)| !spec.is_identifier(k) && is_defined(Some(v)))
            .count();
        let dismissed = spec.severity_ranked
            && matches!(record.get("dismissed"), Some(Value::Bool(true)));
        if payload == 0 || dismissed {
            Some(MergeEvent::Tombstone { id })
        } else {
            Some(MergeEvent::Upsert { id, record })
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            MergeEvent::Upsert { id, .. } | MergeEvent::Tombstone { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted { evicted: usize },
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
struct Record {
    id: i64,
    fields: Map<String, Value>,
}

/// Ordered, bounded collection of records for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeBuffer {
    spec: BufferSpec,
    rows: VecDeque<Record>,
}

type Rank = (Option<Severity>, Option<i64>);

impl MergeBuffer {
    pub fn new(spec: BufferSpec) -> Self {
        Self { spec, rows: VecDeque::new() }
    }

    pub fn spec(&self) -> &BufferSpec {
        &self.spec
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.id).collect()
    }

    pub fn rows(&self, source: usize) -> Vec<Row> {
        self.rows
            .iter()
            .map(|r| Row::new(r.id, source, r.fields.clone()))
            .collect()
    }

    pub fn records(&self) -> Vec<Value> {
        self.rows.iter().map(|r| Value::Object(r.fields.clone())).collect()
    }

    pub fn apply_record(&mut self, record: Map<String, Value>) -> ApplyOutcome {
        match MergeEvent::from_record(&self.spec, record) {
            Some(event) => self.apply(event),
            None => ApplyOutcome::Unchanged,
        }
    }

    pub fn apply(&mut self, event: MergeEvent) -> ApplyOutcome {
        let existed = match self.rows.iter().position(|r| r.id == event.id()) {
            Some(idx) => {
                self.rows.remove(idx);
                true
            }
            None => false,
        };

        let (id, fields) = match event {
            MergeEvent::Tombstone { .. } => {
                return if existed { ApplyOutcome::Removed } else { ApplyOutcome::Unchanged };
            }
            MergeEvent::Upsert { id, record } => (id, record),
        };
        let record = Record { id, fields };

        if self.spec.ranked_mode() {
            return self.insert_ranked(record);
        }

        let before = self.rows.len();
        match self.spec.capacity {
            Capacity::Unbounded => self.rows.push_back(record),
            Capacity::Append(cap) => {
                self.rows.push_back(record);
                while self.rows.len() > cap {
                    self.rows.pop_front();
                }
            }
            Capacity::Prepend(cap) => {
                self.rows.push_front(record);
                while self.rows.len() > cap {
                    self.rows.pop_back();
                }
            }
        }
        ApplyOutcome::Inserted { evicted: before + 1 - self.rows.len() }
    }

    /// Snapshot message: reset and re-apply in order so capacity holds.
    pub fn replace_all(&mut self, records: Vec<Map<String, Value>>) -> usize {
        self.rows.clear();
        for record in records {
            self.apply_record(record);
        }
        self.rows.len()
    }

    fn insert_ranked(&mut self, record: Record) -> ApplyOutcome {
        let cap = self.spec.capacity.limit().unwrap_or(usize::MAX);
        if cap == 0 {
            return ApplyOutcome::Unchanged;
        }
        let mut evicted = 0;
        if self.rows.len() >= cap {
            let new_rank = self.rank(&record);
            let lowest = self
                .rows
                .iter()
                .enumerate()
                .map(|(idx, r)| (idx, self.rank(r)))
                .fold(None, |acc: Option<(usize, Rank)>, (idx, rank)| match acc {
                    Some((_, best)) if rank > best => acc,
                    _ => Some((idx, rank)),
                });
            match lowest {
                Some((idx, min_rank)) if new_rank > min_rank => {
                    self.rows.remove(idx);
                    evicted = 1;
                }
                _ => return ApplyOutcome::Unchanged,
            }
        }
        self.rows.push_front(record);
        let mut ordered: Vec<Record> = self.rows.drain(..).collect();
        ordered.sort_by(|a, b| self.rank(b).cmp(&self.rank(a)));
        self.rows = ordered.into();
        ApplyOutcome::Inserted { evicted }
    }

    fn rank(&self, record: &Record) -> Rank {
        let severity = match lookup(&record.fields, &self.spec.severity_field) {
            Some(Value::String(s)) => Severity::parse(s),
            _ => None,
        };
        let ts = lookup(&record.fields, &self.spec.timestamp_field).and_then(parse_ts_ms);
        (severity, ts)
    }
}

/// Epoch millis from a number or an RFC3339 / numeric string.
pub fn parse_ts_ms(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .ok()
            .or_else(|| s.trim().parse().ok()),
        _ => None,
    }
}
