//! Structured `live.json:` snapshots embedded in the log stream.

use serde_json::{Map, Value};

use super::state::ScrapeSessionState;

/// Known keys of a live snapshot. Every field is optional; only the ones
/// present (and non-empty) overwrite session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSnapshot {
    pub phase: Option<String>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub release: Option<String>,
    pub runtime: Option<String>,
    pub studio: Option<String>,
    pub series: Option<String>,
    pub actors: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub poster_url: Option<String>,
    pub fanart_url: Option<String>,
    pub plot_len: Option<u32>,
    pub plot_source: Option<String>,
    pub plot_preview: Option<String>,
    pub hit_sources: Option<Vec<String>>,
    pub subtitles: Option<Vec<String>>,
}

impl LiveSnapshot {
    /// Parse a JSON object. Returns `None` for malformed JSON or non-objects.
    ///
    /// Fields are read one by one so a single oddly typed value does not
    /// discard the rest of the snapshot.
    pub fn parse(payload: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(payload).ok()?;
        let obj = value.as_object()?;
        Some(Self {
            phase: text(obj, "phase"),
            code: text(obj, "code"),
            title: text(obj, "title"),
            url: text(obj, "url"),
            release: text(obj, "release"),
            runtime: text(obj, "runtime"),
            studio: text(obj, "studio"),
            series: text(obj, "series"),
            actors: list(obj, "actors"),
            tags: list(obj, "tags"),
            poster_url: text(obj, "poster_url"),
            fanart_url: text(obj, "fanart_url"),
            plot_len: obj
                .get("plot_len")
                .and_then(Value::as_u64)
                .map(|n| n.min(u32::MAX as u64) as u32),
            plot_source: text(obj, "plot_source"),
            plot_preview: text(obj, "plot_preview"),
            hit_sources: list(obj, "hit_sources"),
            subtitles: list(obj, "subtitles"),
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge present fields over `state`, leaving everything else intact.
    ///
    /// Later snapshots of the same file never remove information: an empty
    /// list keeps the known one and `plot_len` only grows.
    pub fn merge_into(&self, state: &mut ScrapeSessionState) {
        fn set_list(slot: &mut Vec<String>, value: &Option<Vec<String>>) {
            if let Some(v) = value {
                if !v.is_empty() {
                    *slot = v.clone();
                }
            }
        }
        fn set_opt(slot: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        set_opt(&mut state.phase, &self.phase);
        set_opt(&mut state.code, &self.code);
        set_opt(&mut state.title, &self.title);
        set_opt(&mut state.url, &self.url);
        set_opt(&mut state.release, &self.release);
        set_opt(&mut state.runtime, &self.runtime);
        set_opt(&mut state.studio, &self.studio);
        set_opt(&mut state.series, &self.series);
        set_list(&mut state.actors, &self.actors);
        set_list(&mut state.tags, &self.tags);
        set_opt(&mut state.poster_url, &self.poster_url);
        set_opt(&mut state.fanart_url, &self.fanart_url);
        if let Some(len) = self.plot_len {
            state.plot_len = state.plot_len.max(len);
        }
        set_opt(&mut state.plot_source, &self.plot_source);
        set_opt(&mut state.plot_preview, &self.plot_preview);
        if let Some(sources) = &self.hit_sources {
            for source in sources {
                if !state.hit_sources.contains(source) {
                    state.hit_sources.push(source.clone());
                }
            }
        }
        set_list(&mut state.subtitles, &self.subtitles);
    }
}

/// String-ish field: strings are trimmed, numbers are stringified, empty
/// strings and nulls count as absent.
fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// List field: non-string entries are skipped. An empty list is a real
/// value ("no actors"), a null is absent.
fn list(obj: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items = obj.get(key)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
    )
}
