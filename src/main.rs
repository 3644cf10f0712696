use std::pin::Pin;

use anyhow::Result;
use futures_util::{Stream, StreamExt};
use serde_json::json;
use tokio::time::{interval, Duration, MissedTickBehavior};

use livegrid::config::EngineConfig;
use livegrid::error::FeedError;
use livegrid::feed::{into_stream, JsonlSource, PushMessage, PushSource};
use livegrid::logging::{log, obj, tick_aggregator, v_num, v_str, Domain, Level};
use livegrid::registry::ViewRegistry;
use livegrid::scheduler::Outcome;
use livegrid::widget::{WidgetDef, WidgetSession};

type Feed = Pin<Box<dyn Stream<Item = Result<PushMessage, FeedError>> + Send>>;

async fn open_feed(cfg: &EngineConfig) -> Result<Feed> {
    let source: Box<dyn PushSource> = match &cfg.feed_path {
        Some(path) => Box::new(JsonlSource::open(path).await?),
        None => Box::new(JsonlSource::new(tokio::io::stdin())),
    };
    Ok(Box::pin(into_stream(source)))
}

fn log_render(widget: &str, outcome: &Outcome) {
    match &outcome.result {
        Ok(resp) => log(
            Level::Info,
            Domain::View,
            "render",
            obj(&[
                ("widget", v_str(widget)),
                ("seq", json!(outcome.seq)),
                ("rows", json!(resp.rows.len())),
                ("groups", json!(resp.grouped_rows.len())),
                ("page_rows", json!(resp.active_page_rows.len())),
                ("page_count", json!(resp.page_count)),
                ("columns", json!(resp.filtered_cells.len())),
                ("common_keys", json!(resp.common_key_entries.len())),
                ("elapsed_ms", v_num(outcome.elapsed_ms)),
            ]),
        ),
        // Previous render stays on screen.
        Err(err) => log(
            Level::Error,
            Domain::View,
            "render_failed",
            obj(&[
                ("widget", v_str(widget)),
                ("seq", json!(outcome.seq)),
                ("error", v_str(err.code())),
                ("msg", v_str(&err.to_string())),
            ]),
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = EngineConfig::from_env();
    let def = match &cfg.widget_path {
        Some(path) => WidgetDef::load(path)?,
        None => WidgetDef::from_config(&cfg),
    };

    let mut views = ViewRegistry::new(cfg.page_size);
    def.seed_view(views.mount(&def.name));

    let (mut session, mut outcomes) = WidgetSession::new(&def, &cfg);
    let mut feed = open_feed(&cfg).await?;
    let mut feed_done = false;

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("widget", v_str(&def.name)),
            ("sources", json!(def.sources.len())),
            ("flush_ms", json!(cfg.flush_ms)),
            ("feed", v_str(cfg.feed_path.as_deref().unwrap_or("stdin"))),
        ]),
    );

    let mut ticker = interval(Duration::from_millis(cfg.flush_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = feed.next(), if !feed_done => match msg {
                Some(Ok(msg)) => {
                    session.ingest(msg);
                }
                Some(Err(err)) => log(
                    Level::Warn,
                    Domain::Feed,
                    "bad_message",
                    obj(&[("widget", v_str(&def.name)), ("msg", v_str(&err.to_string()))]),
                ),
                None => {
                    feed_done = true;
                    log(Level::Info, Domain::Feed, "feed_closed", obj(&[("widget", v_str(&def.name))]));
                }
            },
            _ = ticker.tick() => {
                if let Some(view) = views.get(&def.name) {
                    session.flush_and_submit(view)?;
                }
                tick_aggregator();
                if feed_done && session.pending() == 0 {
                    break;
                }
            }
            Some(outcome) = outcomes.recv() => log_render(&def.name, &outcome),
        }
    }

    let drain = async {
        while let Some(outcome) = outcomes.recv().await {
            log_render(&def.name, &outcome);
        }
    };
    let (stats, ()) = tokio::join!(session.shutdown(), drain);
    let stats = stats?;
    views.unmount(&def.name);

    log(
        Level::Info,
        Domain::System,
        "shutdown",
        obj(&[
            ("widget", v_str(&def.name)),
            ("submitted", json!(stats.submitted)),
            ("computed", json!(stats.computed)),
            ("coalesced", json!(stats.coalesced)),
            ("failed", json!(stats.failed)),
        ]),
    );
    Ok(())
}
