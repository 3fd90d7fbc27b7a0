use crate::progress::ScrapeSessionState;

use super::ScrapeExpectations;

/// Relative weight of each sub-signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights {
    pub started: f64,
    pub crawl: f64,
    pub hit: f64,
    pub metadata: f64,
    pub translate: f64,
    pub artwork: f64,
    pub nfo: f64,
}

pub const WEIGHTS: SignalWeights = SignalWeights {
    started: 0.04,
    crawl: 0.26,
    hit: 0.10,
    metadata: 0.26,
    translate: 0.12,
    artwork: 0.16,
    nfo: 0.06,
};

/// Plot text shorter than this does not count as a real plot.
const MIN_PLOT_LEN: u32 = 30;

/// Completion ratio of the current file, in `[0, 1]`.
pub fn estimate(state: &ScrapeSessionState, exp: &ScrapeExpectations) -> f64 {
    let w = WEIGHTS;
    let mut sum = 0.0;
    let mut total = 0.0;
    let mut add = |weight: f64, ratio: f64| {
        sum += weight * ratio.clamp(0.0, 1.0);
        total += weight;
    };

    add(w.started, bool_ratio(state.has_started()));
    add(w.crawl, crawl_ratio(state, exp));
    add(w.hit, bool_ratio(state.has_hit()));
    add(w.metadata, metadata_ratio(state));

    if exp.translate {
        add(
            w.translate,
            mean(&[state.translate_title_done, state.translate_plot_done]),
        );
    }

    let artwork: Vec<bool> = [
        (exp.poster, state.poster_done),
        (exp.fanart, state.fanart_done),
        (exp.previews, state.previews_done),
        (exp.trailer, state.trailer_done),
    ]
    .iter()
    .filter(|(enabled, _)| *enabled)
    .map(|(_, done)| *done)
    .collect();
    if !artwork.is_empty() {
        add(w.artwork, mean(&artwork));
    }

    if exp.nfo {
        add(w.nfo, bool_ratio(state.nfo_done));
    }

    if total <= 0.0 {
        return 0.0;
    }
    (sum / total).clamp(0.0, 1.0)
}

/// Position across the whole job: `((file_index - 1) + ratio) / file_total`.
///
/// Returns 0 when no file total is known yet.
pub fn overall_progress(state: &ScrapeSessionState, file_ratio: f64) -> f64 {
    if state.file_total == 0 {
        return 0.0;
    }
    let done_before = state.file_index.saturating_sub(1) as f64;
    ((done_before + file_ratio.clamp(0.0, 1.0)) / state.file_total as f64).clamp(0.0, 1.0)
}

fn crawl_ratio(state: &ScrapeSessionState, exp: &ScrapeExpectations) -> f64 {
    let denominator = if state.crawlers_locked {
        state.expected_crawlers
    } else {
        state.expected_crawlers.max(exp.expected_crawlers)
    };
    if denominator == 0 {
        return 0.0;
    }
    state.crawlers_tried as f64 / denominator as f64
}

fn metadata_ratio(state: &ScrapeSessionState) -> f64 {
    mean(&[
        state.title.is_some(),
        state.url.is_some(),
        state.plot_len >= MIN_PLOT_LEN,
        !state.actors.is_empty(),
        !state.tags.is_empty(),
        state.release.is_some(),
        state.runtime.is_some(),
        state.studio.is_some() || state.series.is_some(),
        state.poster_url.is_some(),
        state.fanart_url.is_some(),
    ])
}

fn bool_ratio(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn mean(flags: &[bool]) -> f64 {
    if flags.is_empty() {
        return 0.0;
    }
    flags.iter().filter(|b| **b).count() as f64 / flags.len() as f64
}
