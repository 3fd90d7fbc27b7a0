//! Folding classified log events into a session.

use chrono::{DateTime, Utc};

use super::rules::{classify_line, LineEvent};
use super::state::{ArtworkKind, MiniKey, MiniStatus, ScrapeSessionState};

/// Known artwork hosts, matched by URL substring in order.
const SOURCE_TABLE: &[(&str, &str)] = &[
    ("dmm.co.jp", "dmm"),
    ("javbus", "javbus"),
    ("javdb", "javdb"),
    ("metadataapi", "theporndb"),
    ("theporndb", "theporndb"),
    ("javtrailers", "javtrailers"),
    ("jable", "jable"),
];

/// Name of the known source a URL belongs to, or `"other"`.
pub fn source_for_url(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    SOURCE_TABLE
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, source)| *source)
        .unwrap_or("other")
}

/// Fold a chunk of log text into `state`, returning the new state.
///
/// Lines are applied strictly in order. Unrecognized and malformed lines are
/// skipped; this never fails.
pub fn fold(state: ScrapeSessionState, chunk: &str) -> ScrapeSessionState {
    fold_at(state, chunk, Utc::now())
}

/// [`fold`] with an explicit clock, for deterministic callers.
pub fn fold_at(
    mut state: ScrapeSessionState,
    chunk: &str,
    now: DateTime<Utc>,
) -> ScrapeSessionState {
    fold_into(&mut state, chunk, now);
    state
}

/// In-place variant of [`fold_at`]. Returns the number of recognized lines.
pub fn fold_into(state: &mut ScrapeSessionState, chunk: &str, now: DateTime<Utc>) -> usize {
    let mut recognized = 0;
    for line in chunk.lines() {
        if let Some(event) = classify_line(line) {
            apply(state, event, now);
            recognized += 1;
        }
    }
    recognized
}

/// Apply one event to the session.
pub fn apply(state: &mut ScrapeSessionState, event: LineEvent, now: DateTime<Utc>) {
    match event {
        LineEvent::Live(snapshot) => {
            if snapshot.is_empty() {
                return;
            }
            snapshot.merge_into(state);
            let mut mini = MiniStatus::new(MiniKey::Metadata);
            if let Some(code) = &state.code {
                mini = mini.var("code", code.clone());
            }
            if let Some(title) = &state.title {
                mini = mini.var("title", title.clone());
            }
            state.mini = Some(mini);
        }
        LineEvent::FileBoundary { index, total, name } => {
            *state = ScrapeSessionState {
                file_index: index,
                file_total: total,
                current_file_name: Some(name.clone()),
                ..ScrapeSessionState::default()
            };
            state.mini = Some(
                MiniStatus::new(MiniKey::StartFile)
                    .var("name", name)
                    .var("index", index.to_string())
                    .var("total", total.to_string()),
            );
        }
        LineEvent::CrawlerTry { crawler } => {
            state.record_crawl_attempt(&crawler);
            state.mini = Some(
                MiniStatus::new(MiniKey::CrawlerTry)
                    .var("crawler", crawler)
                    .var("attempt", state.crawlers_tried.to_string()),
            );
        }
        LineEvent::CrawlerHit {
            crawler,
            title,
            url: _,
        } => {
            let attributed = attributed_crawler(state, &crawler);
            if !state.hit_sources.contains(&crawler) {
                state.hit_sources.push(crawler.clone());
            }
            state.hit_crawler = Some(crawler);
            let mut mini = MiniStatus::new(MiniKey::CrawlerHit).var("crawler", attributed);
            if let Some(title) = title {
                mini = mini.var("title", title);
            }
            state.mini = Some(mini);
        }
        LineEvent::CrawlerMiss { crawler } => {
            let attributed = attributed_crawler(state, &crawler);
            state.mini = Some(MiniStatus::new(MiniKey::CrawlerMiss).var("crawler", attributed));
        }
        LineEvent::CrawlerError { crawler, error } => {
            let attributed = attributed_crawler(state, &crawler);
            state.mini = Some(
                MiniStatus::new(MiniKey::CrawlerError)
                    .var("crawler", attributed)
                    .var("error", error),
            );
        }
        LineEvent::TranslateStart(field) => {
            state.mini = Some(MiniStatus::new(MiniKey::TranslateStart).var("field", field.as_str()));
        }
        LineEvent::TranslateDone(field) => {
            match field {
                super::state::TranslateField::Title => state.translate_title_done = true,
                super::state::TranslateField::Plot => state.translate_plot_done = true,
            }
            state.mini = Some(MiniStatus::new(MiniKey::TranslateDone).var("field", field.as_str()));
        }
        LineEvent::TranslateFailed { error } => {
            // A failed translation will not be retried for this file.
            state.translate_title_done = true;
            state.translate_plot_done = true;
            state.mini = Some(MiniStatus::new(MiniKey::TranslateFailed).var("error", error));
        }
        LineEvent::ArtworkTry { kind, url } => {
            let source = source_for_url(&url);
            state.artwork_sources.insert(kind, source.to_string());
            state.artwork_urls.insert(kind, url);
            state.last_artwork_kind = Some(kind);
            state.mini = Some(
                MiniStatus::new(MiniKey::ArtworkTry)
                    .var("kind", kind.as_str())
                    .var("source", source),
            );
        }
        LineEvent::ArtworkSaved { kind, file, url } => {
            state.mark_artwork_done(kind);
            let source = artwork_source(state, kind, url.as_deref());
            state.mini = Some(
                MiniStatus::new(MiniKey::ArtworkDone)
                    .var("kind", kind.as_str())
                    .var("source", source)
                    .var("file", file),
            );
        }
        LineEvent::ArtworkFailed { kind, url } => {
            let Some(kind) = kind.or_else(|| failed_kind(state, url.as_deref())) else {
                return;
            };
            state.mark_artwork_done(kind);
            let source = artwork_source(state, kind, url.as_deref());
            state.mini = Some(
                MiniStatus::new(MiniKey::ArtworkFailed)
                    .var("kind", kind.as_str())
                    .var("source", source),
            );
        }
        LineEvent::ArtworkSkipped { kind } => {
            state.mark_artwork_done(kind);
            state.mini = Some(MiniStatus::new(MiniKey::ArtworkSkipped).var("kind", kind.as_str()));
        }
        LineEvent::NfoWritten { name } => {
            state.nfo_done = true;
            state.lock_crawlers();
            state.mini = Some(MiniStatus::new(MiniKey::FileDone).var("name", name));
        }
        LineEvent::NfoDisabled => {
            state.nfo_done = true;
            state.lock_crawlers();
            state.mini = Some(MiniStatus::new(MiniKey::NfoDisabled));
        }
    }
    state.last_update_at = Some(now);
}

/// Hit/miss lines are reported against the crawler that was last attempted.
fn attributed_crawler(state: &ScrapeSessionState, fallback: &str) -> String {
    state
        .last_attempted_crawler
        .clone()
        .unwrap_or_else(|| fallback.to_string())
}

/// Source of the most recent attempt for `kind`, else the URL's own source.
fn artwork_source(state: &ScrapeSessionState, kind: ArtworkKind, url: Option<&str>) -> String {
    if let Some(source) = state.artwork_sources.get(&kind) {
        return source.clone();
    }
    url.map(source_for_url).unwrap_or("other").to_string()
}

/// Kind whose last attempted URL matches `url`, else the last attempted kind.
fn failed_kind(state: &ScrapeSessionState, url: Option<&str>) -> Option<ArtworkKind> {
    if let Some(url) = url {
        let matched = state
            .artwork_urls
            .iter()
            .filter(|(_, tried)| tried.as_str() == url)
            .map(|(kind, _)| *kind)
            .min();
        if matched.is_some() {
            return matched;
        }
    }
    state.last_artwork_kind
}
