//! Accumulates push records between flushes.
//!
//! Within one flush window only the latest record per (source, id)
//! survives; intermediate states are dropped. Flushed items come out in
//! order of their last receipt. A snapshot discards everything received
//! earlier in the window for its source.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::feed::events::{PushKind, PushMessage};
use crate::table::key_codec::NO_ID;
use crate::table::merge::BufferSpec;

#[derive(Debug, Clone, PartialEq)]
pub enum BatchItem {
    Snapshot { source: String, records: Vec<Map<String, Value>> },
    Record { source: String, record: Map<String, Value> },
}

#[derive(Debug, Default)]
pub struct FlushBatcher {
    seq: u64,
    snapshots: HashMap<String, (u64, Vec<Map<String, Value>>)>,
    updates: HashMap<(String, i64), (u64, Map<String, Value>)>,
    dropped: u64,
}

impl FlushBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message. `spec` identifies records of `msg.source`.
    pub fn push(&mut self, msg: PushMessage, spec: &BufferSpec) {
        let total = msg.records.len();
        let records: Vec<Map<String, Value>> = msg
            .records
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(m) => Some(m),
                _ => None,
            })
            .collect();
        self.dropped += (total - records.len()) as u64;
        match msg.kind {
            PushKind::Snapshot => {
                self.updates.retain(|(source, _), _| source != &msg.source);
                self.seq += 1;
                self.snapshots.insert(msg.source, (self.seq, records));
            }
            PushKind::Update => {
                for record in records {
                    let id = spec.record_id(&record);
                    if id == NO_ID {
                        self.dropped += 1;
                        continue;
                    }
                    self.seq += 1;
                    self.updates.insert((msg.source.clone(), id), (self.seq, record));
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len() + self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records rejected for not being objects or lacking a readable id.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn drain(&mut self) -> Vec<BatchItem> {
        let mut items: Vec<(u64, BatchItem)> = self
            .snapshots
            .drain()
            .map(|(source, (seq, records))| (seq, BatchItem::Snapshot { source, records }))
            .chain(
                self.updates
                    .drain()
                    .map(|((source, _), (seq, record))| (seq, BatchItem::Record { source, record })),
            )
            .collect();
        items.sort_by_key(|(seq, _)| *seq);
        items.into_iter().map(|(_, item)| item).collect()
    }
}
