//! Replay a JSON-lines feed through a widget session.

use std::io::Write;

use futures_util::StreamExt;
use serde_json::json;

use livegrid::config::EngineConfig;
use livegrid::feed::{into_stream, JsonlSource, PushMessage};
use livegrid::model::{ColumnMetadata, SortOrder, ValueType};
use livegrid::registry::ViewRegistry;
use livegrid::widget::{SourceDef, WidgetDef, WidgetSession};

fn widget() -> WidgetDef {
    let mut alerts = SourceDef::new("alerts", Some(-2));
    alerts.alerts = true;
    WidgetDef {
        name: "desk".to_string(),
        sources: vec![SourceDef::new("orders", Some(3)), alerts],
        metadata: vec![
            ColumnMetadata::new("qty", ValueType::Number),
            ColumnMetadata::new("severity", ValueType::Enum),
        ],
        join_spec: Default::default(),
        sort_orders: vec![SortOrder::asc("qty")],
    }
}

const FEED: &str = r#"{"source": "orders", "kind": "snapshot", "records": [{"_id": 1, "qty": 10}, {"_id": 2, "qty": 20}]}
{"source": "orders", "records": [{"_id": 3, "qty": 30}]}
{"source": "orders", "records": [{"_id": 3, "qty": 31}, {"_id": 4, "qty": 40}]}
{"source": "alerts", "records": [{"_id": 1, "severity": "critical"}, {"_id": 2, "severity": "info"}]}
{"source": "alerts", "records": [{"_id": 3, "severity": "debug"}]}
{"source": "orders", "records": [{"_id": 2}]}
{"source": "nowhere", "records": [{"_id": 1, "qty": 1}]}
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replay_file_through_session() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FEED.as_bytes()).unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let cfg = EngineConfig::default();
    let def = widget();
    let mut views = ViewRegistry::new(cfg.page_size);
    def.seed_view(views.mount(&def.name));
    let (mut session, mut outcomes) = WidgetSession::new(&def, &cfg);

    let source = JsonlSource::open(&path).await.unwrap();
    let mut stream = Box::pin(into_stream(Box::new(source)));
    let mut accepted = 0;
    while let Some(msg) = stream.next().await {
        if session.ingest(msg.unwrap()) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 6);

    let seq = session.flush_and_submit(views.get(&def.name).unwrap()).unwrap();
    assert_eq!(seq, Some(1));

    // Snapshot [1, 2], then 3 (latest qty 31) and 4 push 1 out; 2 is deleted.
    assert_eq!(session.buffer("orders").unwrap().ids(), vec![3, 4]);
    assert_eq!(session.buffer("alerts").unwrap().ids(), vec![1, 2]);

    let outcome = outcomes.recv().await.unwrap();
    let resp = outcome.result.unwrap();
    let qtys: Vec<i64> = resp.rows.iter().filter_map(|r| r.get("qty").and_then(|v| v.as_i64())).collect();
    assert_eq!(qtys, vec![31, 40]);

    let stats = session.shutdown().await.unwrap();
    assert_eq!(stats.computed, 1);
}

#[tokio::test]
async fn test_updates_in_one_window_keep_latest() {
    let cfg = EngineConfig::default();
    let def = widget();
    let (mut session, _outcomes) = WidgetSession::new(&def, &cfg);
    for qty in [1, 2, 3] {
        session.ingest(PushMessage::update("orders", vec![json!({"_id": 7, "qty": qty})]));
    }
    assert_eq!(session.pending(), 1);
    assert_eq!(session.flush(), 1);
    let records = session.buffer("orders").unwrap().records();
    assert_eq!(records, vec![json!({"_id": 7, "qty": 3})]);
    session.shutdown().await.unwrap();
}
