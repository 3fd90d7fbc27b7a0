use std::time::Duration;

use tracing::debug;

use crate::config::PollingConfig;

use super::merge::merge_tasks;
use super::transitions::TransitionDetector;
use super::types::{ActiveTask, HistoryRow, MergedRow};

/// Holds both views of the task list and merges them on demand.
#[derive(Debug, Default)]
pub struct TaskReconciler {
    history: Vec<HistoryRow>,
    active: Vec<ActiveTask>,
    detector: TransitionDetector,
}

impl TaskReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the live set with a push. Returns true when history should be
    /// refetched now because a task just reached a terminal status.
    pub fn apply_push(&mut self, tasks: Vec<ActiveTask>) -> bool {
        let transitioned = self.detector.observe(&tasks);
        if !transitioned.is_empty() {
            debug!("Tasks reached a terminal status: {:?}", transitioned);
        }
        self.active = tasks;
        !transitioned.is_empty()
    }

    /// Replace the persisted set with a fresh poll.
    pub fn set_history(&mut self, rows: Vec<HistoryRow>) {
        self.history = rows;
    }

    pub fn history(&self) -> &[HistoryRow] {
        &self.history
    }

    pub fn active(&self) -> &[ActiveTask] {
        &self.active
    }

    /// Current merged view.
    pub fn merged(&self) -> Vec<MergedRow> {
        merge_tasks(&self.history, &self.active)
    }

    /// Whether any live task is still being worked on.
    pub fn is_busy(&self) -> bool {
        self.active
            .iter()
            .any(|t| t.status.map(|s| s.is_active()).unwrap_or(true))
    }
}

/// Adaptive poll interval: tight while busy, loose while idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCadence {
    pub busy: Duration,
    pub idle: Duration,
}

impl Default for PollCadence {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollCadence {
    fn from(config: &PollingConfig) -> Self {
        Self {
            busy: config.busy_interval(),
            idle: config.idle_interval(),
        }
    }
}

impl PollCadence {
    pub fn interval(&self, busy: bool) -> Duration {
        if busy {
            self.busy
        } else {
            self.idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskStatus;

    #[test]
    fn test_push_then_merge() {
        let mut reconciler = TaskReconciler::new();
        let mut row = HistoryRow::new("5", TaskStatus::Queued);
        row.title = Some("Title".to_string());
        reconciler.set_history(vec![row]);

        let needs_refetch = reconciler.apply_push(vec![ActiveTask {
            progress: Some(40.0),
            ..ActiveTask::new("5", TaskStatus::Downloading)
        }]);
        assert!(!needs_refetch);
        assert!(reconciler.is_busy());

        let merged = reconciler.merged();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, Some(TaskStatus::Downloading));
        assert_eq!(merged[0].title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_completion_requests_refetch_once() {
        let mut reconciler = TaskReconciler::new();
        reconciler.apply_push(vec![ActiveTask::new("1", TaskStatus::Downloading)]);
        assert!(reconciler.apply_push(vec![ActiveTask::new("1", TaskStatus::Completed)]));
        assert!(!reconciler.apply_push(vec![ActiveTask::new("1", TaskStatus::Completed)]));
        assert!(!reconciler.is_busy());
    }

    #[test]
    fn test_empty_push_clears_live_set() {
        let mut reconciler = TaskReconciler::new();
        reconciler.apply_push(vec![ActiveTask::new("1", TaskStatus::Downloading)]);
        reconciler.apply_push(Vec::new());
        assert!(reconciler.active().is_empty());
        assert!(!reconciler.is_busy());
    }

    #[test]
    fn test_poll_cadence() {
        let cadence = PollCadence::default();
        assert_eq!(cadence.interval(true), Duration::from_secs(1));
        assert_eq!(cadence.interval(false), Duration::from_secs(8));
    }
}
