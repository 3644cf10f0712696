//! Concurrent stress test - many widgets, bursty feeds, tiny flush windows.
//!
//! Checks that buffers never exceed capacity and that every submitted
//! request is either computed or coalesced away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use livegrid::config::EngineConfig;
use livegrid::feed::PushMessage;
use livegrid::model::{ColumnMetadata, SortOrder, ValueType};
use livegrid::registry::ViewState;
use livegrid::widget::{SourceDef, WidgetDef, WidgetSession};

const SEVERITIES: [&str; 5] = ["debug", "info", "warning", "error", "critical"];

fn widget_def(idx: usize) -> WidgetDef {
    let mut alerts = SourceDef::new("alerts", Some(-20));
    alerts.alerts = true;
    WidgetDef {
        name: format!("stress-{}", idx),
        sources: vec![SourceDef::new("orders", Some(50)), SourceDef::new("fills", Some(-30)), alerts],
        metadata: vec![
            ColumnMetadata::new("qty", ValueType::Number),
            ColumnMetadata::new("px", ValueType::Number),
            ColumnMetadata::new("side", ValueType::Enum),
            ColumnMetadata::new("severity", ValueType::Enum),
        ],
        join_spec: Default::default(),
        sort_orders: vec![SortOrder::desc("qty")],
    }
}

fn random_record(rng: &mut StdRng, source: &str) -> Value {
    let id = rng.gen_range(1..200);
    if rng.gen_bool(0.05) {
        return json!({"_id": id});
    }
    match source {
        "alerts" => json!({
            "_id": id,
            "severity": SEVERITIES[rng.gen_range(0..SEVERITIES.len())],
            "last_update_date_time": 1_700_000_000_000i64 + rng.gen_range(0..1_000_000i64),
        }),
        _ => json!({
            "_id": id,
            "qty": rng.gen_range(1..1000),
            "px": rng.gen_range(1.0..500.0),
            "side": if rng.gen_bool(0.5) { "BUY" } else { "SELL" },
        }),
    }
}

fn get_memory_mb() -> f64 {
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|s| s.split_whitespace().nth(1)?.parse::<usize>().ok())
        .map(|pages| pages as f64 * 4096.0 / 1_000_000.0)
        .unwrap_or(0.0)
}

async fn run_widget(idx: usize, rounds: usize, records: Arc<AtomicU64>) -> anyhow::Result<(u64, u64, u64)> {
    let cfg = EngineConfig::default();
    let def = widget_def(idx);
    let (mut session, mut outcomes) = WidgetSession::new(&def, &cfg);
    let drain = tokio::spawn(async move {
        let mut rendered = 0u64;
        while let Some(outcome) = outcomes.recv().await {
            if outcome.result.is_ok() {
                rendered += 1;
            }
        }
        rendered
    });

    let mut rng = StdRng::seed_from_u64(idx as u64);
    let mut view = ViewState::new(cfg.page_size);
    def.seed_view(&mut view);

    for round in 0..rounds {
        for source in &def.sources {
            let burst = rng.gen_range(0..40);
            let batch: Vec<Value> = (0..burst).map(|_| random_record(&mut rng, &source.name)).collect();
            records.fetch_add(batch.len() as u64, Ordering::Relaxed);
            let msg = if rng.gen_bool(0.02) {
                PushMessage::snapshot(&source.name, batch)
            } else {
                PushMessage::update(&source.name, batch)
            };
            session.ingest(msg);
        }
        if round % 7 == 0 {
            view.set_page(rng.gen_range(0..4));
        }
        session.flush_and_submit(&view)?;

        for source in &def.sources {
            let cap = source.ui_limit.map(|n| n.unsigned_abs() as usize).unwrap_or(usize::MAX);
            let len = session.buffer(&source.name).map(|b| b.len()).unwrap_or(0);
            assert!(len <= cap, "{} {} holds {} > {}", def.name, source.name, len, cap);
        }
        if round % 10 == 0 {
            tokio::task::yield_now().await;
        }
    }

    let stats = session.shutdown().await?;
    let rendered = drain.await?;
    assert!(stats.computed <= stats.submitted);
    assert_eq!(stats.computed + stats.coalesced, stats.submitted);
    Ok((stats.submitted, stats.computed, rendered))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== WIDGET STRESS TEST ===\n");

    let n_widgets = num_cpus::get().min(8);
    let rounds = 2_000;
    let iterations = 5;

    println!("Widgets: {}", n_widgets);
    println!("Rounds per widget: {}", rounds);
    println!("Iterations: {}", iterations);
    println!();

    let records = Arc::new(AtomicU64::new(0));
    let mut total_submitted = 0u64;
    let mut total_computed = 0u64;
    let start = Instant::now();
    let initial_mem = get_memory_mb();

    println!(
        "{:>10} {:>12} {:>12} {:>12} {:>12}",
        "Iteration", "Time", "Submitted", "Computed", "Memory MB"
    );
    println!("{}", "-".repeat(62));

    for iter in 0..iterations {
        let iter_start = Instant::now();
        let handles: Vec<_> = (0..n_widgets)
            .map(|w| tokio::spawn(run_widget(iter * n_widgets + w, rounds, Arc::clone(&records))))
            .collect();

        let mut submitted = 0;
        let mut computed = 0;
        for h in handles {
            let (s, c, _) = h.await??;
            submitted += s;
            computed += c;
        }
        total_submitted += submitted;
        total_computed += computed;

        println!(
            "{:>10} {:>12} {:>12} {:>12} {:>12.1}",
            iter + 1,
            format!("{:.2?}", iter_start.elapsed()),
            submitted,
            computed,
            get_memory_mb()
        );
    }

    let total_time = start.elapsed();
    let final_mem = get_memory_mb();

    println!("\n=== Summary ===");
    println!("Total time: {:.2?}", total_time);
    println!("Records pushed: {}", records.load(Ordering::Relaxed));
    println!("Requests submitted: {}", total_submitted);
    println!(
        "Computations run: {} ({:.1}% coalesced)",
        total_computed,
        100.0 * (total_submitted - total_computed) as f64 / total_submitted.max(1) as f64
    );
    println!(
        "Memory: {:.1} MB initial → {:.1} MB final (Δ {:.1} MB)",
        initial_mem,
        final_mem,
        final_mem - initial_mem
    );

    println!("\n✓ Widget stress test complete");
    Ok(())
}
