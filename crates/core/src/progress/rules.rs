//! Line grammar of the scrape runner's log output.
//!
//! Each log line is classified independently by walking [`RULES`] in order;
//! the first rule that recognizes the line wins. New marker types are added
//! by appending a rule, without touching the fold step.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::live::LiveSnapshot;
use super::state::{ArtworkKind, TranslateField};

/// A recognized log event.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// Structured `live.json:` snapshot.
    Live(LiveSnapshot),
    /// `=== [i/n] name ===`: a new file begins.
    FileBoundary { index: u32, total: u32, name: String },
    CrawlerTry { crawler: String },
    CrawlerHit {
        crawler: String,
        title: Option<String>,
        url: Option<String>,
    },
    CrawlerMiss { crawler: String },
    CrawlerError { crawler: String, error: String },
    TranslateStart(TranslateField),
    TranslateDone(TranslateField),
    TranslateFailed { error: String },
    /// An artwork download is being attempted from `url`.
    ArtworkTry { kind: ArtworkKind, url: String },
    /// An artwork file was written.
    ArtworkSaved {
        kind: ArtworkKind,
        file: String,
        url: Option<String>,
    },
    /// An artwork download failed. `kind` is known for trailer lines only;
    /// generic failures are attributed through `url`.
    ArtworkFailed {
        kind: Option<ArtworkKind>,
        url: Option<String>,
    },
    ArtworkSkipped { kind: ArtworkKind },
    NfoWritten { name: String },
    NfoDisabled,
}

/// A named classifier in the rule table.
pub struct LineRule {
    pub name: &'static str,
    pub parse: fn(&str) -> Option<LineEvent>,
}

/// Ordered rule table; first match wins.
pub static RULES: &[LineRule] = &[
    LineRule {
        name: "live_json",
        parse: parse_live_json,
    },
    LineRule {
        name: "file_boundary",
        parse: parse_file_boundary,
    },
    LineRule {
        name: "crawler",
        parse: parse_crawler,
    },
    LineRule {
        name: "translate",
        parse: parse_translate,
    },
    LineRule {
        name: "artwork_try",
        parse: parse_artwork_try,
    },
    LineRule {
        name: "artwork_saved",
        parse: parse_artwork_saved,
    },
    LineRule {
        name: "artwork_failed",
        parse: parse_artwork_failed,
    },
    LineRule {
        name: "artwork_skipped",
        parse: parse_artwork_skipped,
    },
    LineRule {
        name: "nfo",
        parse: parse_nfo,
    },
];

static TIMESTAMP_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} ").unwrap());

static FILE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^===\s*\[(\d+)/(\d+)\]\s+(.+?)\s*===$").unwrap());

static CRAWLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(try|hit|miss|error) crawler:\s*(\S+)\s*(.*)$").unwrap());

static HIT_FIELDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^title=(.*?)(?:\s+url=(.*))?$").unwrap());

static TRANSLATE_STEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^translate: (title|plot) (start|done)$").unwrap());

static ARTWORK_TRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^artwork try (poster|fanart|preview)(?: \(fallback\)|\[\d+\])?:\s*(\S+)").unwrap()
});

static SAVED_WITH_SOURCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:artwork downloaded|trailer downloaded|trailer hls downloaded):\s*(.+?)(?:\s+\(\d+ bytes\))?(?:\s+<-\s+(\S+))?$",
    )
    .unwrap()
});

static POSTER_CROPPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^poster cropped from fanart:\s*(.+?)(?:\s+\(\d+x\d+\))?$").unwrap()
});

static ARTWORK_FAILED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^artwork (?:download failed|download error|placeholder image, skip):\s*(.*)$")
        .unwrap()
});

static TRAILER_FAILED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:trailer download (?:failed|error)|trailer hls (?:failed|download error)|trailer too large.*?, skip|warn: trailer not downloaded):?\s*(.*)$",
    )
    .unwrap()
});

/// Strip the `YYYY-MM-DD HH:MM:SS ` prefix the job runner writes.
pub fn strip_timestamp(line: &str) -> &str {
    match TIMESTAMP_PREFIX.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Classify one raw log line. Returns `None` for lines the engine ignores.
pub fn classify_line(raw: &str) -> Option<LineEvent> {
    let line = strip_timestamp(raw.trim_end_matches(['\r', '\n'])).trim();
    if line.is_empty() {
        return None;
    }
    RULES.iter().find_map(|rule| (rule.parse)(line))
}

/// Remove one pair of matching surrounding quotes, as written by Python's `repr`.
pub fn strip_quotes(value: &str) -> &str {
    let v = value.trim();
    for q in ['\'', '"'] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

fn optional_value(value: &str) -> Option<String> {
    let v = strip_quotes(value);
    if v.is_empty() || v == "None" {
        None
    } else {
        Some(v.to_string())
    }
}

/// Last whitespace-separated token that looks like a URL.
fn trailing_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .rev()
        .find(|t| t.starts_with("http://") || t.starts_with("https://"))
        .map(|t| t.to_string())
}

fn parse_live_json(line: &str) -> Option<LineEvent> {
    let payload = line.strip_prefix("live.json:")?;
    // Malformed snapshots are still "recognized" so no later rule sees them.
    Some(match LiveSnapshot::parse(payload.trim()) {
        Some(snapshot) => LineEvent::Live(snapshot),
        None => LineEvent::Live(LiveSnapshot::default()),
    })
}

fn parse_file_boundary(line: &str) -> Option<LineEvent> {
    let caps = FILE_BOUNDARY.captures(line)?;
    Some(LineEvent::FileBoundary {
        index: caps[1].parse().ok()?,
        total: caps[2].parse().ok()?,
        name: caps[3].trim().to_string(),
    })
}

fn parse_crawler(line: &str) -> Option<LineEvent> {
    let caps = CRAWLER.captures(line)?;
    let crawler = caps[2].to_string();
    let rest = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
    match &caps[1] {
        "try" => Some(LineEvent::CrawlerTry { crawler }),
        "hit" => {
            let (title, url) = match HIT_FIELDS.captures(rest) {
                Some(fields) => (
                    optional_value(&fields[1]),
                    fields.get(2).and_then(|m| optional_value(m.as_str())),
                ),
                None => (None, None),
            };
            Some(LineEvent::CrawlerHit {
                crawler,
                title,
                url,
            })
        }
        "miss" => Some(LineEvent::CrawlerMiss { crawler }),
        "error" => {
            let error = rest.strip_prefix("error=").unwrap_or(rest).trim().to_string();
            Some(LineEvent::CrawlerError { crawler, error })
        }
        _ => None,
    }
}

fn parse_translate(line: &str) -> Option<LineEvent> {
    if let Some(rest) = line.strip_prefix("translate failed:") {
        return Some(LineEvent::TranslateFailed {
            error: rest.trim().to_string(),
        });
    }
    let caps = TRANSLATE_STEP.captures(line)?;
    let field = match &caps[1] {
        "title" => TranslateField::Title,
        _ => TranslateField::Plot,
    };
    Some(match &caps[2] {
        "start" => LineEvent::TranslateStart(field),
        _ => LineEvent::TranslateDone(field),
    })
}

fn parse_artwork_try(line: &str) -> Option<LineEvent> {
    let caps = ARTWORK_TRY.captures(line)?;
    let kind = match &caps[1] {
        "poster" => ArtworkKind::Poster,
        "fanart" => ArtworkKind::Fanart,
        _ => ArtworkKind::Preview,
    };
    Some(LineEvent::ArtworkTry {
        kind,
        url: caps[2].to_string(),
    })
}

fn parse_artwork_saved(line: &str) -> Option<LineEvent> {
    if let Some(caps) = SAVED_WITH_SOURCE.captures(line) {
        let file = caps[1].trim().to_string();
        let kind = if line.starts_with("trailer") {
            ArtworkKind::Trailer
        } else {
            ArtworkKind::from_file_name(&file)?
        };
        return Some(LineEvent::ArtworkSaved {
            kind,
            file,
            url: caps.get(2).map(|m| m.as_str().to_string()),
        });
    }
    let caps = POSTER_CROPPED.captures(line)?;
    Some(LineEvent::ArtworkSaved {
        kind: ArtworkKind::Poster,
        file: caps[1].trim().to_string(),
        url: None,
    })
}

fn parse_artwork_failed(line: &str) -> Option<LineEvent> {
    if let Some(caps) = ARTWORK_FAILED.captures(line) {
        return Some(LineEvent::ArtworkFailed {
            kind: None,
            url: trailing_url(&caps[1]),
        });
    }
    let caps = TRAILER_FAILED.captures(line)?;
    Some(LineEvent::ArtworkFailed {
        kind: Some(ArtworkKind::Trailer),
        url: trailing_url(&caps[1]),
    })
}

fn parse_artwork_skipped(line: &str) -> Option<LineEvent> {
    if line.starts_with("artwork skip previews")
        || line.starts_with("artwork fallback previews: placeholder detected")
    {
        return Some(LineEvent::ArtworkSkipped {
            kind: ArtworkKind::Preview,
        });
    }
    None
}

fn parse_nfo(line: &str) -> Option<LineEvent> {
    if line == "nfo disabled" {
        return Some(LineEvent::NfoDisabled);
    }
    let name = line.strip_prefix("write nfo:")?.trim();
    Some(LineEvent::NfoWritten {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names_are_unique() {
        let mut names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), RULES.len());
    }

    #[test]
    fn test_strip_timestamp() {
        assert_eq!(
            strip_timestamp("2024-06-01 12:30:45 try crawler: dmm"),
            "try crawler: dmm"
        );
        assert_eq!(strip_timestamp("try crawler: dmm"), "try crawler: dmm");
        assert_eq!(strip_timestamp("2024-06-01 oops"), "2024-06-01 oops");
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("'T'"), "T");
        assert_eq!(strip_quotes("\"it's\""), "it's");
        assert_eq!(strip_quotes("'unbalanced"), "'unbalanced");
    }

    #[test]
    fn test_file_boundary() {
        let event = classify_line("2024-06-01 12:00:00 === [2/10] ABC-123.mp4 ===").unwrap();
        assert_eq!(
            event,
            LineEvent::FileBoundary {
                index: 2,
                total: 10,
                name: "ABC-123.mp4".to_string()
            }
        );
    }

    #[test]
    fn test_file_boundary_with_spaces_in_name() {
        let event = classify_line("=== [1/1] My Clip (2020).mkv ===").unwrap();
        assert!(matches!(event, LineEvent::FileBoundary { name, .. } if name == "My Clip (2020).mkv"));
    }

    #[test]
    fn test_try_crawler() {
        assert_eq!(
            classify_line("try crawler: javbus"),
            Some(LineEvent::CrawlerTry {
                crawler: "javbus".to_string()
            })
        );
    }

    #[test]
    fn test_hit_crawler_strips_quotes() {
        let event = classify_line("hit crawler: siteA title='T' url='u'").unwrap();
        assert_eq!(
            event,
            LineEvent::CrawlerHit {
                crawler: "siteA".to_string(),
                title: Some("T".to_string()),
                url: Some("u".to_string()),
            }
        );
    }

    #[test]
    fn test_hit_crawler_none_values() {
        let event = classify_line("hit crawler: dmm title=None url=None").unwrap();
        assert_eq!(
            event,
            LineEvent::CrawlerHit {
                crawler: "dmm".to_string(),
                title: None,
                url: None,
            }
        );
    }

    #[test]
    fn test_miss_and_error_crawler() {
        assert_eq!(
            classify_line("miss crawler: javdb"),
            Some(LineEvent::CrawlerMiss {
                crawler: "javdb".to_string()
            })
        );
        assert_eq!(
            classify_line("error crawler: javdb error=timed out"),
            Some(LineEvent::CrawlerError {
                crawler: "javdb".to_string(),
                error: "timed out".to_string()
            })
        );
    }

    #[test]
    fn test_translate_lines() {
        assert_eq!(
            classify_line("translate: title start"),
            Some(LineEvent::TranslateStart(TranslateField::Title))
        );
        assert_eq!(
            classify_line("translate: plot done"),
            Some(LineEvent::TranslateDone(TranslateField::Plot))
        );
        assert_eq!(
            classify_line("translate failed: quota exceeded"),
            Some(LineEvent::TranslateFailed {
                error: "quota exceeded".to_string()
            })
        );
    }

    #[test]
    fn test_artwork_try_variants() {
        assert_eq!(
            classify_line("artwork try fanart: https://pics.dmm.co.jp/a/pl.jpg"),
            Some(LineEvent::ArtworkTry {
                kind: ArtworkKind::Fanart,
                url: "https://pics.dmm.co.jp/a/pl.jpg".to_string()
            })
        );
        assert!(matches!(
            classify_line("artwork try poster (fallback): https://www.javbus.com/p.jpg"),
            Some(LineEvent::ArtworkTry { kind: ArtworkKind::Poster, .. })
        ));
        assert!(matches!(
            classify_line("artwork try preview[3]: https://x/y.jpg"),
            Some(LineEvent::ArtworkTry { kind: ArtworkKind::Preview, .. })
        ));
    }

    #[test]
    fn test_artwork_saved_by_suffix() {
        let event =
            classify_line("artwork downloaded: ABC-123-poster.jpg (2048 bytes) <- https://a/b.jpg")
                .unwrap();
        assert_eq!(
            event,
            LineEvent::ArtworkSaved {
                kind: ArtworkKind::Poster,
                file: "ABC-123-poster.jpg".to_string(),
                url: Some("https://a/b.jpg".to_string()),
            }
        );
        assert!(matches!(
            classify_line("trailer downloaded: ABC-123-trailer.mp4 (99 bytes) <- https://t/x.mp4"),
            Some(LineEvent::ArtworkSaved { kind: ArtworkKind::Trailer, .. })
        ));
        assert!(matches!(
            classify_line("poster cropped from fanart: ABC-123-poster.jpg (379x538)"),
            Some(LineEvent::ArtworkSaved { kind: ArtworkKind::Poster, .. })
        ));
    }

    #[test]
    fn test_artwork_saved_unknown_suffix_ignored() {
        assert_eq!(
            classify_line("artwork downloaded: cover.jpg (10 bytes) <- https://a/b.jpg"),
            None
        );
    }

    #[test]
    fn test_artwork_failures() {
        assert_eq!(
            classify_line("artwork download failed: 404 https://a/b.jpg"),
            Some(LineEvent::ArtworkFailed {
                kind: None,
                url: Some("https://a/b.jpg".to_string())
            })
        );
        assert_eq!(
            classify_line("artwork download error: https://a/c.jpg"),
            Some(LineEvent::ArtworkFailed {
                kind: None,
                url: Some("https://a/c.jpg".to_string())
            })
        );
        assert_eq!(
            classify_line("warn: trailer not downloaded: https://t/x.mp4"),
            Some(LineEvent::ArtworkFailed {
                kind: Some(ArtworkKind::Trailer),
                url: Some("https://t/x.mp4".to_string())
            })
        );
        assert!(matches!(
            classify_line("trailer download failed: 403 https://t/x.mp4"),
            Some(LineEvent::ArtworkFailed { kind: Some(ArtworkKind::Trailer), .. })
        ));
    }

    #[test]
    fn test_artwork_skip_previews() {
        assert_eq!(
            classify_line("artwork skip previews: no preview_urls"),
            Some(LineEvent::ArtworkSkipped {
                kind: ArtworkKind::Preview
            })
        );
    }

    #[test]
    fn test_nfo_lines() {
        assert_eq!(
            classify_line("write nfo: ABC-123.nfo"),
            Some(LineEvent::NfoWritten {
                name: "ABC-123.nfo".to_string()
            })
        );
        assert_eq!(classify_line("nfo disabled"), Some(LineEvent::NfoDisabled));
    }

    #[test]
    fn test_live_json_line() {
        let event = classify_line(r#"live.json: {"title":"T","plot_len":42}"#).unwrap();
        match event {
            LineEvent::Live(snapshot) => {
                assert_eq!(snapshot.title.as_deref(), Some("T"));
                assert_eq!(snapshot.plot_len, Some(42));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_malformed_live_json_is_empty_snapshot() {
        let event = classify_line("live.json: {not json").unwrap();
        assert_eq!(event, LineEvent::Live(LiveSnapshot::default()));
    }

    #[test]
    fn test_unrecognized_lines() {
        assert_eq!(classify_line("metadata: merging results..."), None);
        assert_eq!(classify_line(""), None);
        assert_eq!(classify_line("   "), None);
        assert_eq!(classify_line("scan: found 3 files"), None);
    }
}
