use serde_json::{Map, Value};

use crate::config::ScrapeExpectationsConfig;

/// Which optional scrape steps are expected for each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeExpectations {
    pub translate: bool,
    pub poster: bool,
    pub fanart: bool,
    pub previews: bool,
    pub trailer: bool,
    pub nfo: bool,
    /// Crawlers expected per file; 0 means only observed attempts count.
    pub expected_crawlers: u32,
}

impl Default for ScrapeExpectations {
    fn default() -> Self {
        Self::from(&ScrapeExpectationsConfig::default())
    }
}

impl From<&ScrapeExpectationsConfig> for ScrapeExpectations {
    fn from(config: &ScrapeExpectationsConfig) -> Self {
        Self {
            translate: config.translate,
            poster: config.poster,
            fanart: config.fanart,
            previews: config.previews,
            trailer: config.trailer,
            nfo: config.nfo,
            expected_crawlers: config.expected_crawlers,
        }
    }
}

impl ScrapeExpectations {
    /// Derive expectations from the backend's flat scrape config.
    ///
    /// Missing keys fall back to the backend's own defaults.
    pub fn from_scrape_config(config: &Map<String, Value>) -> Self {
        Self {
            translate: flag(config, "scrape_translate_enabled", false),
            poster: flag(config, "scrape_download_poster", true),
            fanart: flag(config, "scrape_download_fanart", true),
            previews: flag(config, "scrape_download_previews", false),
            trailer: flag(config, "scrape_download_trailer", false),
            nfo: flag(config, "scrape_write_nfo", true),
            expected_crawlers: source_count(config.get("scrape_sources")),
        }
    }
}

fn flag(config: &Map<String, Value>, key: &str, default: bool) -> bool {
    match config.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(default),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
        _ => default,
    }
}

/// `scrape_sources` is a list of crawler names; a comma-separated string is
/// accepted too.
fn source_count(value: Option<&Value>) -> u32 {
    let count = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| v.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false))
            .count(),
        Some(Value::String(s)) => s.split(',').filter(|p| !p.trim().is_empty()).count(),
        _ => 0,
    };
    count.min(u32::MAX as usize) as u32
}
