use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ClientError;

/// Identifier of a scrape job.
pub type JobId = u64;

/// Status of a scrape job.
///
/// The backend reports plain strings; anything unrecognized maps to
/// [`JobStatus::Pending`] so it is never treated as active or terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Starting,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns the string representation used by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Starting => "Starting",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    /// Whether the job is producing log output right now.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Starting | JobStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.trim() {
            "Starting" => JobStatus::Starting,
            "Running" => JobStatus::Running,
            "Completed" => JobStatus::Completed,
            "Failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scrape job snapshot from `GET /api/scrape/jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Number of files finished so far.
    #[serde(default)]
    pub current: u32,
    /// Number of files in the job.
    #[serde(default)]
    pub total: u32,
    /// Path of the file currently being processed.
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub completed_at: Option<f64>,
    /// Failure detail, passed through untouched.
    #[serde(default)]
    pub error: Option<String>,
}

impl Job {
    /// Create a job with only the fields the engine cares about.
    pub fn new(id: JobId, status: JobStatus) -> Self {
        Self {
            id,
            status,
            current: 0,
            total: 0,
            current_file: None,
            directory: None,
            created_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Server-side counter progress (`current / total`), without log refinement.
    pub fn counter_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

/// Source of the backend's job list.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError>;
}
