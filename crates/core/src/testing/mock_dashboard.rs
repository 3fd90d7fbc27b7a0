//! Mock dashboard backend for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::ClientError;
use crate::confsync::{ConfigBackend, ConfigDomain, ConfigSnapshot};
use crate::job::{Job, JobId, JobSource};
use crate::logtail::{ItemLog, LogChunk, LogSource};
use crate::tasks::{HistoryRow, HistorySource};

#[derive(Debug, Default)]
struct MockState {
    jobs: Vec<Job>,
    logs: HashMap<JobId, String>,
    item_logs: HashMap<(JobId, String), String>,
    history: Vec<HistoryRow>,
    configs: HashMap<ConfigDomain, ConfigSnapshot>,
    save_defaults: HashMap<ConfigDomain, ConfigSnapshot>,
    saved: Vec<(ConfigDomain, ConfigSnapshot)>,
    log_requests: Vec<(JobId, u64)>,
    history_fetches: usize,
    fail_saves: bool,
    fail_fetches: bool,
    fail_polls: bool,
}

/// In-memory implementation of every backend seam.
///
/// Provides controllable behavior for testing:
/// - Append to job logs and serve them by byte offset
/// - Record config saves for assertions
/// - Simulate canonicalizing saves and failures
///
/// # Example
///
/// ```rust,ignore
/// let mock = MockDashboard::new();
/// mock.set_jobs(vec![Job::new(1, JobStatus::Running)]);
/// mock.append_log(1, "=== [1/2] A.mp4 ===\n");
///
/// let chunk = mock.fetch_log(1, 0).await?;
/// assert!(chunk.exists);
/// ```
#[derive(Debug, Default)]
pub struct MockDashboard {
    state: Mutex<MockState>,
}

impl MockDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn set_jobs(&self, jobs: Vec<Job>) {
        self.with_state(|s| s.jobs = jobs);
    }

    /// Append text to a job's log, creating it if needed.
    pub fn append_log(&self, job_id: JobId, text: &str) {
        self.with_state(|s| s.logs.entry(job_id).or_default().push_str(text));
    }

    pub fn set_item_log(&self, job_id: JobId, filename: &str, text: &str) {
        self.with_state(|s| {
            s.item_logs
                .insert((job_id, filename.to_string()), text.to_string());
        });
    }

    pub fn set_history(&self, rows: Vec<HistoryRow>) {
        self.with_state(|s| s.history = rows);
    }

    pub fn set_config(&self, domain: ConfigDomain, snapshot: ConfigSnapshot) {
        self.with_state(|s| {
            s.configs.insert(domain, snapshot);
        });
    }

    /// Keys the backend fills in on every save when missing.
    pub fn set_save_defaults(&self, domain: ConfigDomain, defaults: ConfigSnapshot) {
        self.with_state(|s| {
            s.save_defaults.insert(domain, defaults);
        });
    }

    pub fn config(&self, domain: ConfigDomain) -> Option<ConfigSnapshot> {
        self.with_state(|s| s.configs.get(&domain).cloned())
    }

    pub fn fail_saves(&self, fail: bool) {
        self.with_state(|s| s.fail_saves = fail);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.with_state(|s| s.fail_fetches = fail);
    }

    /// Make job, log, and history polls fail.
    pub fn fail_polls(&self, fail: bool) {
        self.with_state(|s| s.fail_polls = fail);
    }

    /// Every recorded save, in order.
    pub fn saved_configs(&self) -> Vec<(ConfigDomain, ConfigSnapshot)> {
        self.with_state(|s| s.saved.clone())
    }

    /// Every `(job_id, offset)` log request, in order.
    pub fn log_requests(&self) -> Vec<(JobId, u64)> {
        self.with_state(|s| s.log_requests.clone())
    }

    pub fn history_fetches(&self) -> usize {
        self.with_state(|s| s.history_fetches)
    }
}

fn unavailable() -> ClientError {
    ClientError::ConnectionFailed("mock backend unavailable".to_string())
}

#[async_trait]
impl JobSource for MockDashboard {
    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        self.with_state(|s| {
            if s.fail_polls {
                return Err(unavailable());
            }
            Ok(s.jobs.clone())
        })
    }
}

#[async_trait]
impl LogSource for MockDashboard {
    async fn fetch_log(&self, job_id: JobId, offset: u64) -> Result<LogChunk, ClientError> {
        self.with_state(|s| {
            s.log_requests.push((job_id, offset));
            if s.fail_polls {
                return Err(unavailable());
            }
            let Some(log) = s.logs.get(&job_id) else {
                return Ok(LogChunk::missing());
            };
            let mut start = (offset as usize).min(log.len());
            while !log.is_char_boundary(start) {
                start -= 1;
            }
            Ok(LogChunk {
                exists: true,
                text: log[start..].to_string(),
                next_offset: log.len() as u64,
            })
        })
    }

    async fn fetch_item_log(&self, job_id: JobId, filename: &str) -> Result<ItemLog, ClientError> {
        self.with_state(|s| {
            let text = s.item_logs.get(&(job_id, filename.to_string())).cloned();
            Ok(ItemLog {
                exists: text.is_some(),
                text: text.unwrap_or_default(),
                filename: filename.to_string(),
            })
        })
    }
}

#[async_trait]
impl HistorySource for MockDashboard {
    async fn list_history(&self) -> Result<Vec<HistoryRow>, ClientError> {
        self.with_state(|s| {
            s.history_fetches += 1;
            if s.fail_polls {
                return Err(unavailable());
            }
            Ok(s.history.clone())
        })
    }
}

#[async_trait]
impl ConfigBackend for MockDashboard {
    async fn fetch_config(&self, domain: ConfigDomain) -> Result<ConfigSnapshot, ClientError> {
        self.with_state(|s| {
            if s.fail_fetches {
                return Err(unavailable());
            }
            Ok(s.configs.get(&domain).cloned().unwrap_or_default())
        })
    }

    async fn save_config(
        &self,
        domain: ConfigDomain,
        snapshot: &ConfigSnapshot,
    ) -> Result<ConfigSnapshot, ClientError> {
        self.with_state(|s| {
            s.saved.push((domain, snapshot.clone()));
            if s.fail_saves {
                return Err(ClientError::Http {
                    status: 500,
                    body: "save failed".to_string(),
                });
            }
            let mut canonical = s.save_defaults.get(&domain).cloned().unwrap_or_default();
            for (key, value) in snapshot {
                canonical.insert(key.clone(), value.clone());
            }
            s.configs.insert(domain, canonical.clone());
            Ok(canonical)
        })
    }
}
