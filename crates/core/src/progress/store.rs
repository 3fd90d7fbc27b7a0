//! Keyed store of scrape sessions, one per active job.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::fold::fold_into;
use super::state::ScrapeSessionState;
use crate::job::JobId;

/// Owns the session of every job whose log is being tailed.
///
/// Sessions are created lazily by the first chunk, reset on request and
/// evicted when the job leaves the active set. The store holds no locks; the
/// engine wraps it in one.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<JobId, ScrapeSessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a chunk into the job's session, creating it on first use.
    ///
    /// Returns the number of recognized lines.
    pub fn apply_chunk(&mut self, job_id: JobId, chunk: &str) -> usize {
        self.apply_chunk_at(job_id, chunk, Utc::now())
    }

    pub fn apply_chunk_at(&mut self, job_id: JobId, chunk: &str, now: DateTime<Utc>) -> usize {
        let session = self.sessions.entry(job_id).or_default();
        fold_into(session, chunk, now)
    }

    /// Keep only sessions for the given jobs; returns the evicted ids.
    pub fn retain_active(&mut self, active: &[JobId]) -> Vec<JobId> {
        let evicted: Vec<JobId> = self
            .sessions
            .keys()
            .filter(|id| !active.contains(id))
            .copied()
            .collect();
        for id in &evicted {
            self.sessions.remove(id);
        }
        evicted
    }

    pub fn get(&self, job_id: JobId) -> Option<&ScrapeSessionState> {
        self.sessions.get(&job_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
