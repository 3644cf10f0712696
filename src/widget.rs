//! One mounted widget: its source buffers, push batcher and scheduler.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::feed::{BatchItem, FlushBatcher, PushMessage};
use crate::logging::{agg_increment, log, log_flush, obj, v_str, Domain, Level};
use crate::message::{ComputeRequest, SourceSnapshot};
use crate::model::{ColumnMetadata, JoinSpec, SortOrder};
use crate::registry::ViewState;
use crate::scheduler::{ComputeFn, Outcome, Scheduler, SchedulerStats};
use crate::table::key_codec::KeyLayout;
use crate::table::merge::{BufferSpec, MergeBuffer};

fn default_id_field() -> String {
    "_id".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDef {
    pub name: String,
    #[serde(default)]
    pub ui_limit: Option<i64>,
    /// Alert-like collection: severity retention when `ui_limit < 0`.
    #[serde(default)]
    pub alerts: bool,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub key_field: Option<String>,
}

impl SourceDef {
    pub fn new(name: &str, ui_limit: Option<i64>) -> Self {
        Self {
            name: name.to_string(),
            ui_limit,
            alerts: false,
            id_field: default_id_field(),
            key_field: None,
        }
    }

    pub fn buffer_spec(&self, metadata: &[ColumnMetadata], separator: char) -> BufferSpec {
        let base = if self.alerts {
            BufferSpec::alerts(self.ui_limit)
        } else {
            BufferSpec::new(self.ui_limit)
        };
        let spec = base.with_id_field(&self.id_field);
        match self
            .key_field
            .as_deref()
            .and_then(|field| metadata.iter().find(|c| c.key == field))
        {
            Some(col) => spec.with_key(&col.key, KeyLayout::from_metadata(col, separator)),
            None => spec,
        }
    }
}

/// Widget definition as handed over by the schema layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDef {
    pub name: String,
    pub sources: Vec<SourceDef>,
    #[serde(default)]
    pub metadata: Vec<ColumnMetadata>,
    #[serde(default)]
    pub join_spec: JoinSpec,
    #[serde(default)]
    pub sort_orders: Vec<SortOrder>,
}

impl WidgetDef {
    /// Single-source widget named after the configured model.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        let mut source = SourceDef::new(&cfg.model, cfg.ui_limit);
        source.alerts = cfg.alerts;
        Self {
            name: cfg.model.clone(),
            sources: vec![source],
            metadata: Vec::new(),
            join_spec: JoinSpec::default(),
            sort_orders: Vec::new(),
        }
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading widget def {}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing widget def {}", path))
    }

    /// Seed a freshly mounted view with the definition's defaults.
    pub fn seed_view(&self, view: &mut ViewState) {
        if view.join_spec == JoinSpec::default() {
            view.join_spec = self.join_spec.clone();
        }
        if view.sort_orders.is_empty() {
            view.sort_orders = self.sort_orders.clone();
        }
    }
}

struct SourceSlot {
    def: SourceDef,
    buffer: MergeBuffer,
}

pub struct WidgetSession {
    name: String,
    metadata: Vec<ColumnMetadata>,
    key_separator: char,
    sources: Vec<SourceSlot>,
    batcher: FlushBatcher,
    scheduler: Scheduler,
}

impl WidgetSession {
    pub fn new(def: &WidgetDef, cfg: &EngineConfig) -> (Self, mpsc::Receiver<Outcome>) {
        let (scheduler, outcomes) = Scheduler::spawn(&def.name, cfg.outcome_buffer);
        (Self::with_scheduler(def, cfg, scheduler), outcomes)
    }

    pub fn with_compute(def: &WidgetDef, cfg: &EngineConfig, compute: ComputeFn) -> (Self, mpsc::Receiver<Outcome>) {
        let (scheduler, outcomes) = Scheduler::spawn_with(&def.name, cfg.outcome_buffer, compute);
        (Self::with_scheduler(def, cfg, scheduler), outcomes)
    }

    fn with_scheduler(def: &WidgetDef, cfg: &EngineConfig, scheduler: Scheduler) -> Self {
        let sources = def
            .sources
            .iter()
            .map(|s| SourceSlot {
                def: s.clone(),
                buffer: MergeBuffer::new(s.buffer_spec(&def.metadata, cfg.key_separator)),
            })
            .collect();
        Self {
            name: def.name.clone(),
            metadata: def.metadata.clone(),
            key_separator: cfg.key_separator,
            sources,
            batcher: FlushBatcher::new(),
            scheduler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn slot_index(&self, source: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.def.name == source)
    }

    pub fn buffer(&self, source: &str) -> Option<&MergeBuffer> {
        self.slot_index(source).map(|i| &self.sources[i].buffer)
    }

    /// Queue a push message until the next flush. Unknown sources are
    /// dropped.
    pub fn ingest(&mut self, msg: PushMessage) -> bool {
        let Some(idx) = self.slot_index(&msg.source) else {
            log(
                Level::Warn,
                Domain::Feed,
                "unknown_source",
                obj(&[("widget", v_str(&self.name)), ("source", v_str(&msg.source))]),
            );
            return false;
        };
        let spec = self.sources[idx].buffer.spec().clone();
        self.batcher.push(msg, &spec);
        true
    }

    pub fn pending(&self) -> usize {
        self.batcher.len()
    }

    /// Apply the batched events to the buffers. Returns how many batch
    /// items were applied.
    pub fn flush(&mut self) -> usize {
        if self.batcher.is_empty() {
            return 0;
        }
        let items = self.batcher.drain();
        let applied = items.len();
        let mut touched = Vec::new();
        for item in items {
            let (source, outcome) = match item {
                BatchItem::Snapshot { source, records } => {
                    let Some(idx) = self.slot_index(&source) else { continue };
                    let size = self.sources[idx].buffer.replace_all(records);
                    (idx, json!({"snapshot": size}))
                }
                BatchItem::Record { source, record } => {
                    let Some(idx) = self.slot_index(&source) else { continue };
                    let outcome = self.sources[idx].buffer.apply_record(record);
                    (idx, json!(format!("{:?}", outcome)))
                }
            };
            if !touched.contains(&source) {
                touched.push(source);
            }
            log(
                Level::Trace,
                Domain::Merge,
                "apply",
                obj(&[
                    ("widget", v_str(&self.name)),
                    ("source", v_str(&self.sources[source].def.name)),
                    ("outcome", outcome),
                ]),
            );
        }
        let rows = self.sources.iter().map(|s| s.buffer.len()).sum();
        agg_increment("flush");
        log_flush(&self.name, applied, touched.len(), rows);
        applied
    }

    /// Immutable snapshot of every buffer plus the current view.
    pub fn request(&self, view: &ViewState) -> ComputeRequest {
        let sources = self
            .sources
            .iter()
            .map(|s| SourceSnapshot {
                name: s.def.name.clone(),
                rows: s.buffer.records(),
                id_field: s.def.id_field.clone(),
                key_field: s.def.key_field.clone(),
            })
            .collect();
        let mut req = ComputeRequest::new(sources, self.metadata.clone());
        req.key_separator = self.key_separator;
        view.apply_to(&mut req);
        req
    }

    pub fn submit(&self, view: &ViewState) -> Result<u64> {
        self.scheduler.submit(self.request(view))
    }

    /// Flush and, when anything changed, schedule a recomputation.
    pub fn flush_and_submit(&mut self, view: &ViewState) -> Result<Option<u64>> {
        if self.flush() == 0 {
            return Ok(None);
        }
        self.submit(view).map(Some)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub async fn shutdown(self) -> Result<SchedulerStats> {
        self.scheduler.shutdown().await
    }
}
