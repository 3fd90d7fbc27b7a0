//! livedash core: live status reconciliation for a media dashboard.
//!
//! Folds scrape job logs into per-file progress, merges pushed and polled
//! task lists, and keeps config domains in sync with the backend.

pub mod client;
pub mod config;
pub mod confsync;
pub mod engine;
pub mod estimate;
pub mod job;
pub mod logtail;
pub mod metrics;
pub mod progress;
pub mod push;
pub mod tasks;
pub mod testing;

pub use client::{ClientError, DashboardClient};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use confsync::{ConfigDomain, ConfigSnapshot, ConfigSync, SaveGate, SaveOutcome};
pub use engine::{EngineError, EngineSnapshot, JobProgress, LiveEngine};
pub use estimate::{estimate, overall_progress, ScrapeExpectations};
pub use job::{Job, JobId, JobStatus};
pub use logtail::{LogStreamReader, PollOutcome};
pub use progress::{fold, MiniKey, MiniStatus, ScrapeSessionState, SessionStore};
pub use push::{ConnectionState, PushClient, PushHandle};
pub use tasks::{merge_tasks, ActiveTask, HistoryRow, MergedRow, TaskId, TaskReconciler, TaskStatus};
