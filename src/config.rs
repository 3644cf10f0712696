use crate::table::key_codec::DEFAULT_SEPARATOR;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub flush_ms: u64,
    pub page_size: usize,
    pub key_separator: char,
    pub outcome_buffer: usize,
    pub feed_path: Option<String>,
    /// JSON widget definition; without one a single-source widget is built
    /// from `model`, `ui_limit` and `alerts`.
    pub widget_path: Option<String>,
    pub model: String,
    pub ui_limit: Option<i64>,
    pub alerts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_ms: 500,
            page_size: 25,
            key_separator: DEFAULT_SEPARATOR,
            outcome_buffer: 16,
            feed_path: None,
            widget_path: None,
            model: "positions".to_string(),
            ui_limit: None,
            alerts: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            flush_ms: std::env::var("LIVEGRID_FLUSH_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.flush_ms),
            page_size: std::env::var("LIVEGRID_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(d.page_size),
            key_separator: std::env::var("LIVEGRID_KEY_SEPARATOR")
                .ok()
                .and_then(|v| v.chars().next())
                .unwrap_or(d.key_separator),
            outcome_buffer: std::env::var("LIVEGRID_OUTCOME_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(d.outcome_buffer),
            feed_path: std::env::var("LIVEGRID_FEED").ok().filter(|p| !p.is_empty()),
            widget_path: std::env::var("LIVEGRID_WIDGET").ok().filter(|p| !p.is_empty()),
            model: std::env::var("LIVEGRID_MODEL").unwrap_or(d.model),
            ui_limit: std::env::var("LIVEGRID_UI_LIMIT").ok().and_then(|v| v.parse().ok()),
            alerts: std::env::var("LIVEGRID_ALERTS").map(|v| v == "1" || v == "true").unwrap_or(false),
        }
    }
}
