//! Types for log tailing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ClientError;
use crate::job::JobId;

/// One response of the offset-based log endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogChunk {
    #[serde(default)]
    pub exists: bool,
    /// Log text from the requested offset up to `next_offset`.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub next_offset: u64,
}

impl LogChunk {
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Whole log of one unit (file) within a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLog {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub filename: String,
}

/// Outcome of one [`LogStreamReader::poll`](super::LogStreamReader::poll).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// New text was applied and the offset committed.
    Applied { next_offset: u64 },
    /// The response did not move past the committed offset; nothing applied.
    Discarded { next_offset: u64 },
    /// The log does not exist (yet); nothing applied.
    Missing,
}

/// Source of job log text.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch log text starting at `offset`.
    async fn fetch_log(&self, job_id: JobId, offset: u64) -> Result<LogChunk, ClientError>;

    /// Fetch the whole log of one item.
    async fn fetch_item_log(&self, job_id: JobId, filename: &str)
        -> Result<ItemLog, ClientError>;
}
