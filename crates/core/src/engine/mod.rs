//! Live engine: runs every channel against one backend.
//!
//! [`LiveEngine`] owns the shared state (jobs, sessions, reconciler,
//! estimator flags) and the background tasks that keep it current. Callers
//! read it through [`LiveEngine::snapshot`].

mod runner;
mod types;

pub use runner::{job_progress, LiveEngine};
pub use types::{EngineError, EngineSnapshot, JobProgress};
