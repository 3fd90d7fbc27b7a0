use std::collections::{HashMap, HashSet};

use super::types::{ActiveTask, TaskId, TaskStatus};

/// Detects tasks entering a terminal status between pushes.
///
/// Signals once per transition: a task that keeps reporting `Completed`
/// triggers only on the first push that carries it.
#[derive(Debug, Default)]
pub struct TransitionDetector {
    last_seen: HashMap<TaskId, TaskStatus>,
}

impl TransitionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a push and return the ids that just became terminal.
    ///
    /// Ids absent from the push are forgotten, so a task that later reappears
    /// is treated as new.
    pub fn observe(&mut self, tasks: &[ActiveTask]) -> Vec<TaskId> {
        let mut transitioned = Vec::new();
        let mut present: HashSet<&TaskId> = HashSet::with_capacity(tasks.len());

        for task in tasks {
            present.insert(&task.id);
            let Some(status) = task.status else {
                continue;
            };
            let previous = self.last_seen.insert(task.id.clone(), status);
            if status.is_terminal() && previous != Some(status) {
                transitioned.push(task.id.clone());
            }
        }

        self.last_seen.retain(|id, _| present.contains(id));
        transitioned
    }

    pub fn last_status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.last_seen.get(id).copied()
    }

    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(entries: &[(&str, TaskStatus)]) -> Vec<ActiveTask> {
        entries
            .iter()
            .map(|(id, status)| ActiveTask::new(*id, *status))
            .collect()
    }

    #[test]
    fn test_signals_once_per_transition() {
        let mut detector = TransitionDetector::new();
        assert!(detector
            .observe(&push(&[("1", TaskStatus::Downloading)]))
            .is_empty());
        assert_eq!(
            detector.observe(&push(&[("1", TaskStatus::Completed)])),
            vec![TaskId::from("1")]
        );
        assert!(detector
            .observe(&push(&[("1", TaskStatus::Completed)]))
            .is_empty());
    }

    #[test]
    fn test_first_sighting_terminal_counts() {
        let mut detector = TransitionDetector::new();
        assert_eq!(
            detector.observe(&push(&[("2", TaskStatus::Failed)])),
            vec![TaskId::from("2")]
        );
    }

    #[test]
    fn test_completed_to_failed_is_a_transition() {
        let mut detector = TransitionDetector::new();
        detector.observe(&push(&[("3", TaskStatus::Completed)]));
        assert_eq!(detector.observe(&push(&[("3", TaskStatus::Failed)])).len(), 1);
    }

    #[test]
    fn test_missing_status_keeps_previous() {
        let mut detector = TransitionDetector::new();
        detector.observe(&push(&[("4", TaskStatus::Downloading)]));
        let mut task = ActiveTask::new("4", TaskStatus::Downloading);
        task.status = None;
        assert!(detector.observe(&[task]).is_empty());
        assert_eq!(
            detector.last_status(&TaskId::from("4")),
            Some(TaskStatus::Downloading)
        );
    }

    #[test]
    fn test_prunes_absent_ids() {
        let mut detector = TransitionDetector::new();
        detector.observe(&push(&[("5", TaskStatus::Completed), ("6", TaskStatus::Downloading)]));
        assert_eq!(detector.tracked(), 2);
        detector.observe(&push(&[("6", TaskStatus::Downloading)]));
        assert_eq!(detector.tracked(), 1);
        assert_eq!(
            detector.observe(&push(&[("5", TaskStatus::Completed)])),
            vec![TaskId::from("5")]
        );
    }
}
