//! Types for download task reconciliation.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::client::ClientError;

/// Task identifier, compared as a string.
///
/// The backend sends integer ids in some places and strings in others; both
/// deserialize to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => TaskId(n.to_string()),
            RawId::Float(f) if f.fract() == 0.0 => TaskId((f as i64).to_string()),
            RawId::Float(f) => TaskId(f.to_string()),
            RawId::Text(s) => TaskId(s.trim().to_string()),
        })
    }
}

/// Status of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    /// Waiting for a worker (persisted as `排队中` by older backends).
    Queued,
    Preparing,
    Downloading,
    Merging,
    Paused,
    Completed,
    Failed,
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "Queued",
            TaskStatus::Preparing => "Preparing",
            TaskStatus::Downloading => "Downloading",
            TaskStatus::Merging => "Merging",
            TaskStatus::Paused => "Paused",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Unknown => "Unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the task is still being worked on.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskStatus::Queued
                | TaskStatus::Preparing
                | TaskStatus::Downloading
                | TaskStatus::Merging
        )
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.trim() {
            "Queued" | "Pending" | "排队中" => TaskStatus::Queued,
            "Preparing" => TaskStatus::Preparing,
            "Downloading" => TaskStatus::Downloading,
            "Merging" => TaskStatus::Merging,
            "Paused" => TaskStatus::Paused,
            "Completed" => TaskStatus::Completed,
            "Failed" => TaskStatus::Failed,
            _ => TaskStatus::Unknown,
        }
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted task row from `GET /api/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub id: TaskId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub scrape_after_download: Option<bool>,
    #[serde(default)]
    pub scrape_job_id: Option<u64>,
    #[serde(default)]
    pub scrape_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<String>,
}

impl HistoryRow {
    pub fn new(id: impl Into<TaskId>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            url: None,
            title: None,
            status: Some(status),
            error: None,
            output_path: None,
            scrape_after_download: None,
            scrape_job_id: None,
            scrape_status: None,
            created_at: None,
            completed_at: None,
        }
    }
}

/// A live task from the push channel.
///
/// Every field except `id` may be missing from a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTask {
    pub id: TaskId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Percent, 0..=100.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub speed: Option<String>,
    #[serde(default)]
    pub total_bytes: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub scrape_after_download: Option<bool>,
    #[serde(default)]
    pub scrape_job_id: Option<u64>,
    #[serde(default)]
    pub scrape_status: Option<String>,
}

impl ActiveTask {
    pub fn new(id: impl Into<TaskId>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            url: None,
            status: Some(status),
            progress: None,
            speed: None,
            total_bytes: None,
            error: None,
            scrape_after_download: None,
            scrape_job_id: None,
            scrape_status: None,
        }
    }
}

/// One row of the merged task view. Built per render, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub id: TaskId,
    pub url: Option<String>,
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub progress: Option<f64>,
    pub speed: Option<String>,
    pub total_bytes: Option<u64>,
    pub error: Option<String>,
    pub output_path: Option<String>,
    /// Tri-state: `None` when neither side knows.
    pub scrape_after_download: Option<bool>,
    pub scrape_job_id: Option<u64>,
    pub scrape_status: Option<String>,
    pub created_at: Option<String>,
    pub completed_at: Option<String>,
    /// Whether a live task contributed to this row.
    pub live: bool,
}

/// Source of persisted task rows.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn list_history(&self) -> Result<Vec<HistoryRow>, ClientError>;
}

/// Accept strings or numbers (unix seconds) for timestamp fields.
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Raw::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept booleans or the 0/1 integers SQLite stores.
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Number(i64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Bool(b) => b,
        Raw::Number(n) => n != 0,
    }))
}

/// Parse the timestamp shapes the backend produces.
///
/// SQLite `CURRENT_TIMESTAMP` text, RFC 3339, and unix seconds are accepted.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    let secs: f64 = value.parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs.fract()) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}
