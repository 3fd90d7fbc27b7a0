//! Merging persisted rows with live tasks.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::types::{parse_timestamp, ActiveTask, HistoryRow, MergedRow, TaskId};

/// Merge history rows with live tasks into one de-duplicated view.
///
/// Live values override persisted ones field by field, and only when
/// present. Live tasks without a history row become synthesized rows. The
/// result is sorted newest first, with rows lacking `created_at` on top.
pub fn merge_tasks(history: &[HistoryRow], active: &[ActiveTask]) -> Vec<MergedRow> {
    let by_id: HashMap<&TaskId, &ActiveTask> = active.iter().map(|t| (&t.id, t)).collect();
    let mut seen: HashSet<&TaskId> = HashSet::with_capacity(history.len());

    let mut rows: Vec<MergedRow> = Vec::with_capacity(history.len() + active.len());
    for row in history {
        if !seen.insert(&row.id) {
            continue;
        }
        rows.push(overlay(row, by_id.get(&row.id).copied()));
    }

    for task in active {
        if seen.insert(&task.id) {
            rows.push(synthesize(task));
        }
    }

    sort_newest_first(&mut rows);
    rows
}

fn overlay(row: &HistoryRow, live: Option<&ActiveTask>) -> MergedRow {
    let Some(live) = live else {
        return MergedRow {
            id: row.id.clone(),
            url: row.url.clone(),
            title: row.title.clone(),
            status: row.status,
            progress: None,
            speed: None,
            total_bytes: None,
            error: row.error.clone(),
            output_path: row.output_path.clone(),
            scrape_after_download: row.scrape_after_download,
            scrape_job_id: row.scrape_job_id,
            scrape_status: row.scrape_status.clone(),
            created_at: row.created_at.clone(),
            completed_at: row.completed_at.clone(),
            live: false,
        };
    };

    MergedRow {
        id: row.id.clone(),
        url: live.url.clone().or_else(|| row.url.clone()),
        title: row.title.clone(),
        status: live.status.or(row.status),
        progress: live.progress,
        speed: live.speed.clone(),
        total_bytes: live.total_bytes,
        error: live.error.clone().or_else(|| row.error.clone()),
        output_path: row.output_path.clone(),
        scrape_after_download: live.scrape_after_download.or(row.scrape_after_download),
        scrape_job_id: live.scrape_job_id.or(row.scrape_job_id),
        scrape_status: live
            .scrape_status
            .clone()
            .or_else(|| row.scrape_status.clone()),
        created_at: row.created_at.clone(),
        completed_at: row.completed_at.clone(),
        live: true,
    }
}

fn synthesize(task: &ActiveTask) -> MergedRow {
    MergedRow {
        id: task.id.clone(),
        url: task.url.clone(),
        title: None,
        status: task.status,
        progress: task.progress,
        speed: task.speed.clone(),
        total_bytes: task.total_bytes,
        error: task.error.clone(),
        output_path: None,
        scrape_after_download: task.scrape_after_download,
        scrape_job_id: task.scrape_job_id,
        scrape_status: task.scrape_status.clone(),
        created_at: None,
        completed_at: None,
        live: true,
    }
}

/// Stable sort: missing `created_at` first, then newest first. Timestamps
/// that do not parse sort after every parsed one.
fn sort_newest_first(rows: &mut [MergedRow]) {
    rows.sort_by(|a, b| {
        let ka = sort_key(a);
        let kb = sort_key(b);
        match (ka, kb) {
            (SortKey::Unpersisted, SortKey::Unpersisted) => Ordering::Equal,
            (SortKey::Unpersisted, _) => Ordering::Less,
            (_, SortKey::Unpersisted) => Ordering::Greater,
            (SortKey::At(x), SortKey::At(y)) => y.cmp(&x),
            (SortKey::At(_), SortKey::Unparsed) => Ordering::Less,
            (SortKey::Unparsed, SortKey::At(_)) => Ordering::Greater,
            (SortKey::Unparsed, SortKey::Unparsed) => Ordering::Equal,
        }
    });
}

enum SortKey {
    Unpersisted,
    At(chrono::DateTime<chrono::Utc>),
    Unparsed,
}

fn sort_key(row: &MergedRow) -> SortKey {
    match row.created_at.as_deref() {
        None => SortKey::Unpersisted,
        Some(s) => parse_timestamp(s).map(SortKey::At).unwrap_or(SortKey::Unparsed),
    }
}
