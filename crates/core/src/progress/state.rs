//! Per-job scrape session state folded from log output.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of optional artwork produced for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkKind {
    Poster,
    Fanart,
    Preview,
    Trailer,
}

impl ArtworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtworkKind::Poster => "poster",
            ArtworkKind::Fanart => "fanart",
            ArtworkKind::Preview => "preview",
            ArtworkKind::Trailer => "trailer",
        }
    }

    /// Classify a written file by its name suffix (`<stem>-poster.jpg`, ...).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let base = lower.rsplit(['/', '\\']).next().unwrap_or(&lower);
        if base.contains("-preview-") {
            Some(ArtworkKind::Preview)
        } else if base.contains("-poster") {
            Some(ArtworkKind::Poster)
        } else if base.contains("-fanart") {
            Some(ArtworkKind::Fanart)
        } else if base.contains("-trailer") {
            Some(ArtworkKind::Trailer)
        } else {
            None
        }
    }
}

/// Which translated field a translate line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateField {
    Title,
    Plot,
}

impl TranslateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslateField::Title => "title",
            TranslateField::Plot => "plot",
        }
    }
}

/// Message key of a [`MiniStatus`].
///
/// Keys are stable identifiers for a localized one-line status; the
/// renderer owns the actual wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MiniKey {
    StartFile,
    Metadata,
    CrawlerTry,
    CrawlerHit,
    CrawlerMiss,
    CrawlerError,
    TranslateStart,
    TranslateDone,
    TranslateFailed,
    ArtworkTry,
    ArtworkDone,
    ArtworkFailed,
    ArtworkSkipped,
    FileDone,
    NfoDisabled,
}

impl MiniKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MiniKey::StartFile => "startFile",
            MiniKey::Metadata => "metadata",
            MiniKey::CrawlerTry => "crawlerTry",
            MiniKey::CrawlerHit => "crawlerHit",
            MiniKey::CrawlerMiss => "crawlerMiss",
            MiniKey::CrawlerError => "crawlerError",
            MiniKey::TranslateStart => "translateStart",
            MiniKey::TranslateDone => "translateDone",
            MiniKey::TranslateFailed => "translateFailed",
            MiniKey::ArtworkTry => "artworkTry",
            MiniKey::ArtworkDone => "artworkDone",
            MiniKey::ArtworkFailed => "artworkFailed",
            MiniKey::ArtworkSkipped => "artworkSkipped",
            MiniKey::FileDone => "fileDone",
            MiniKey::NfoDisabled => "nfoDisabled",
        }
    }

    /// Whether the key reports something that went wrong.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MiniKey::CrawlerMiss
                | MiniKey::CrawlerError
                | MiniKey::TranslateFailed
                | MiniKey::ArtworkFailed
        )
    }
}

/// Compact `{key, vars}` descriptor for a one-line human status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniStatus {
    pub key: MiniKey,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

impl MiniStatus {
    pub fn new(key: MiniKey) -> Self {
        Self {
            key,
            vars: BTreeMap::new(),
        }
    }

    /// Add a variable (builder style).
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }

    /// Render a plain English line, used by the CLI and in logs.
    pub fn describe(&self) -> String {
        let get = |name: &str| self.vars.get(name).map(String::as_str).unwrap_or("?");
        match self.key {
            MiniKey::StartFile => format!("[{}/{}] {}", get("index"), get("total"), get("name")),
            MiniKey::Metadata => format!("metadata merged: {}", get("code")),
            MiniKey::CrawlerTry => format!("trying {}", get("crawler")),
            MiniKey::CrawlerHit => format!("{} found a match", get("crawler")),
            MiniKey::CrawlerMiss => format!("{} had no match", get("crawler")),
            MiniKey::CrawlerError => format!("{} failed: {}", get("crawler"), get("error")),
            MiniKey::TranslateStart => format!("translating {}", get("field")),
            MiniKey::TranslateDone => format!("translated {}", get("field")),
            MiniKey::TranslateFailed => format!("translation failed: {}", get("error")),
            MiniKey::ArtworkTry => format!("fetching {} from {}", get("kind"), get("source")),
            MiniKey::ArtworkDone => format!("{} saved ({})", get("kind"), get("source")),
            MiniKey::ArtworkFailed => format!("{} failed ({})", get("kind"), get("source")),
            MiniKey::ArtworkSkipped => format!("{} skipped", get("kind")),
            MiniKey::FileDone => format!("wrote {}", get("name")),
            MiniKey::NfoDisabled => "done (nfo disabled)".to_string(),
        }
    }
}

/// Everything known about the file currently being scraped within one job.
///
/// A file-boundary marker replaces the whole value with a fresh one, so no
/// field ever leaks from one file into the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSessionState {
    /// 1-based index from the boundary marker.
    pub file_index: u32,
    pub file_total: u32,
    pub current_file_name: Option<String>,

    pub crawlers_tried: u32,
    /// High-water mark of crawl attempts; never decreases within a session.
    pub expected_crawlers: u32,
    /// Set once the file is finalized; the estimator then stops using the
    /// static crawler expectation.
    pub crawlers_locked: bool,
    pub last_attempted_crawler: Option<String>,
    pub hit_crawler: Option<String>,
    pub hit_sources: Vec<String>,

    pub poster_done: bool,
    pub fanart_done: bool,
    pub previews_done: bool,
    pub trailer_done: bool,
    pub translate_title_done: bool,
    pub translate_plot_done: bool,
    pub nfo_done: bool,

    pub phase: Option<String>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub release: Option<String>,
    pub runtime: Option<String>,
    pub studio: Option<String>,
    pub series: Option<String>,
    pub actors: Vec<String>,
    pub tags: Vec<String>,
    pub plot_len: u32,
    pub plot_source: Option<String>,
    pub plot_preview: Option<String>,
    pub poster_url: Option<String>,
    pub fanart_url: Option<String>,
    pub subtitles: Vec<String>,

    /// Source each artwork kind was last attempted from.
    pub artwork_sources: HashMap<ArtworkKind, String>,
    /// URL each artwork kind was last attempted from.
    pub artwork_urls: HashMap<ArtworkKind, String>,
    pub last_artwork_kind: Option<ArtworkKind>,

    pub mini: Option<MiniStatus>,
    pub last_update_at: Option<DateTime<Utc>>,
}

impl ScrapeSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a boundary marker has been seen for this session.
    pub fn has_started(&self) -> bool {
        self.file_index > 0 || self.current_file_name.is_some()
    }

    /// Whether any crawler produced a result for this file.
    pub fn has_hit(&self) -> bool {
        self.hit_crawler.is_some()
            || !self.hit_sources.is_empty()
            || self.url.is_some()
            || self.title.is_some()
    }

    pub fn artwork_done(&self, kind: ArtworkKind) -> bool {
        match kind {
            ArtworkKind::Poster => self.poster_done,
            ArtworkKind::Fanart => self.fanart_done,
            ArtworkKind::Preview => self.previews_done,
            ArtworkKind::Trailer => self.trailer_done,
        }
    }

    pub(crate) fn mark_artwork_done(&mut self, kind: ArtworkKind) {
        match kind {
            ArtworkKind::Poster => self.poster_done = true,
            ArtworkKind::Fanart => self.fanart_done = true,
            ArtworkKind::Preview => self.previews_done = true,
            ArtworkKind::Trailer => self.trailer_done = true,
        }
    }

    /// Record one crawl attempt and raise the high-water mark.
    pub(crate) fn record_crawl_attempt(&mut self, crawler: &str) {
        self.crawlers_tried = self.crawlers_tried.saturating_add(1);
        self.expected_crawlers = self.expected_crawlers.max(self.crawlers_tried);
        self.last_attempted_crawler = Some(crawler.to_string());
    }

    /// Freeze the crawler denominator at its high-water mark.
    pub(crate) fn lock_crawlers(&mut self) {
        self.expected_crawlers = self.expected_crawlers.max(self.crawlers_tried);
        self.crawlers_locked = true;
    }
}
