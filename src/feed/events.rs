use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushKind {
    /// Full replacement of the source's collection.
    Snapshot,
    #[default]
    Update,
}

/// One message from the transport: a batch of records for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub source: String,
    #[serde(default)]
    pub kind: PushKind,
    #[serde(default)]
    pub records: Vec<Value>,
}

impl PushMessage {
    pub fn update(source: &str, records: Vec<Value>) -> Self {
        Self { source: source.to_string(), kind: PushKind::Update, records }
    }

    pub fn snapshot(source: &str, records: Vec<Value>) -> Self {
        Self { source: source.to_string(), kind: PushKind::Snapshot, records }
    }
}
