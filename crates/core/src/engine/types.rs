//! Types for the live engine.

use serde::Serialize;
use thiserror::Error;

use crate::job::{JobId, JobStatus};
use crate::progress::MiniStatus;
use crate::push::ConnectionState;
use crate::tasks::MergedRow;

/// Errors that can occur setting up the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Backend client error.
    #[error("backend client error: {0}")]
    Client(#[from] crate::client::ClientError),

    /// Config domain not synced by this engine.
    #[error("config domain not synced: {0}")]
    DomainNotSynced(crate::confsync::ConfigDomain),
}

/// Live progress of one scrape job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: JobStatus,
    /// 1-based index of the file being scraped, 0 before the first boundary.
    pub file_index: u32,
    pub file_total: u32,
    pub current_file: Option<String>,
    /// Completion of the current file.
    pub file_ratio: f64,
    /// Completion of the whole job.
    pub overall: f64,
    pub mini: Option<MiniStatus>,
    /// Job failure detail, passed through untouched.
    pub error: Option<String>,
}

/// Point-in-time view of everything the engine tracks.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub jobs: Vec<JobProgress>,
    pub tasks: Vec<MergedRow>,
    /// `None` when the push channel is disabled.
    #[serde(skip)]
    pub push: Option<ConnectionState>,
}

impl EngineSnapshot {
    /// Whether any job or task is still being worked on.
    pub fn is_busy(&self) -> bool {
        self.jobs.iter().any(|j| j.status.is_active())
            || self
                .tasks
                .iter()
                .any(|t| t.status.map(|s| s.is_active()).unwrap_or(false))
    }
}
