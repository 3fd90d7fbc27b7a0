//! Save-loop guard for one config domain.
//!
//! ```text
//!   Loading --fetched--> Idle --change--> PendingSave --elapsed--> Saving
//!                         ^                                          |
//!                         +------------- succeeded / failed ---------+
//! ```
//!
//! A local change only schedules a save once the domain is ready, the
//! one-shot skip flag is clear, and its hash differs from the last value
//! known to be saved. Together these keep a fetch or a save response from
//! echoing back into another save.

use super::types::{stable_hash, ConfigSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePhase {
    /// Initial fetch has not completed.
    Loading,
    Idle,
    /// Debounce timer armed with a pending payload.
    PendingSave,
    /// A save request is in flight.
    Saving,
}

/// What the gate decided about a local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    NotReady,
    /// Consumed the one-shot skip flag.
    Skipped,
    /// Same as the last saved value; any pending save is cancelled.
    Unchanged,
    /// (Re)start the debounce timer.
    Schedule,
}

#[derive(Debug, Clone)]
pub struct SaveGate {
    phase: SavePhase,
    skip_once: bool,
    last_saved_hash: Option<String>,
    pending: Option<ConfigSnapshot>,
    sent_hash: Option<String>,
}

impl Default for SaveGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveGate {
    pub fn new() -> Self {
        Self {
            phase: SavePhase::Loading,
            skip_once: false,
            last_saved_hash: None,
            pending: None,
            sent_hash: None,
        }
    }

    pub fn phase(&self) -> SavePhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase != SavePhase::Loading
    }

    pub fn last_saved_hash(&self) -> Option<&str> {
        self.last_saved_hash.as_deref()
    }

    pub fn skip_armed(&self) -> bool {
        self.skip_once
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Initial fetch finished. `remote` is `None` when it failed.
    ///
    /// Either way the domain becomes ready and the next change is skipped.
    pub fn fetched(&mut self, remote: Option<&ConfigSnapshot>) {
        if let Some(remote) = remote {
            self.last_saved_hash = Some(stable_hash(remote));
        }
        self.phase = SavePhase::Idle;
        self.skip_once = true;
    }

    pub fn on_local_change(&mut self, value: &ConfigSnapshot) -> ChangeDecision {
        if self.phase == SavePhase::Loading {
            return ChangeDecision::NotReady;
        }
        if self.skip_once {
            self.skip_once = false;
            return ChangeDecision::Skipped;
        }
        if self.last_saved_hash.as_deref() == Some(stable_hash(value).as_str()) {
            self.pending = None;
            if self.phase == SavePhase::PendingSave {
                self.phase = SavePhase::Idle;
            }
            return ChangeDecision::Unchanged;
        }
        self.pending = Some(value.clone());
        if self.phase == SavePhase::Idle {
            self.phase = SavePhase::PendingSave;
        }
        ChangeDecision::Schedule
    }

    /// Debounce fired. Returns the payload to save, or `None` when nothing
    /// is pending or a save is already in flight (the pending value is then
    /// dropped; the next change re-arms).
    pub fn on_debounce_elapsed(&mut self) -> Option<ConfigSnapshot> {
        if self.phase == SavePhase::Saving {
            self.pending = None;
            return None;
        }
        let payload = self.pending.take()?;
        self.sent_hash = Some(stable_hash(&payload));
        self.phase = SavePhase::Saving;
        Some(payload)
    }

    /// Save returned the backend's canonical value.
    ///
    /// Returns the value to adopt locally when it differs from what was
    /// sent; skip-once is re-armed so adopting it does not save again.
    pub fn on_save_succeeded(&mut self, response: &ConfigSnapshot) -> Option<ConfigSnapshot> {
        let hash = stable_hash(response);
        let differs = self.sent_hash.as_deref() != Some(hash.as_str());
        self.last_saved_hash = Some(hash);
        self.sent_hash = None;
        self.phase = self.after_save();
        if differs {
            self.skip_once = true;
            Some(response.clone())
        } else {
            None
        }
    }

    /// Save failed; the last saved hash is kept.
    pub fn on_save_failed(&mut self) {
        self.sent_hash = None;
        self.phase = self.after_save();
    }

    fn after_save(&self) -> SavePhase {
        if self.pending.is_some() {
            SavePhase::PendingSave
        } else {
            SavePhase::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(value: serde_json::Value) -> ConfigSnapshot {
        value.as_object().cloned().unwrap()
    }

    fn ready_gate(remote: &ConfigSnapshot) -> SaveGate {
        let mut gate = SaveGate::new();
        gate.fetched(Some(remote));
        assert_eq!(gate.on_local_change(remote), ChangeDecision::Skipped);
        gate
    }

    #[test]
    fn test_not_ready_before_fetch() {
        let mut gate = SaveGate::new();
        assert!(!gate.is_ready());
        assert_eq!(gate.on_local_change(&cfg(json!({"a": 1}))), ChangeDecision::NotReady);
        assert!(!gate.has_pending());
    }

    #[test]
    fn test_skip_once_consumed_exactly_once() {
        let remote = cfg(json!({"a": 1}));
        let mut gate = SaveGate::new();
        gate.fetched(Some(&remote));
        assert!(gate.skip_armed());
        assert_eq!(gate.on_local_change(&cfg(json!({"a": 2}))), ChangeDecision::Skipped);
        assert_eq!(gate.on_local_change(&cfg(json!({"a": 2}))), ChangeDecision::Schedule);
    }

    #[test]
    fn test_fetch_failure_still_ready() {
        let mut gate = SaveGate::new();
        gate.fetched(None);
        assert!(gate.is_ready());
        assert!(gate.last_saved_hash().is_none());
        assert_eq!(gate.on_local_change(&cfg(json!({}))), ChangeDecision::Skipped);
        assert_eq!(gate.on_local_change(&cfg(json!({}))), ChangeDecision::Schedule);
    }

    #[test]
    fn test_unchanged_value_not_scheduled() {
        let remote = cfg(json!({"a": 1}));
        let mut gate = ready_gate(&remote);
        assert_eq!(gate.on_local_change(&remote), ChangeDecision::Unchanged);
        assert_eq!(gate.phase(), SavePhase::Idle);
    }

    #[test]
    fn test_revert_cancels_pending() {
        let remote = cfg(json!({"a": 1}));
        let mut gate = ready_gate(&remote);
        assert_eq!(gate.on_local_change(&cfg(json!({"a": 2}))), ChangeDecision::Schedule);
        assert_eq!(gate.phase(), SavePhase::PendingSave);
        assert_eq!(gate.on_local_change(&remote), ChangeDecision::Unchanged);
        assert_eq!(gate.phase(), SavePhase::Idle);
        assert!(gate.on_debounce_elapsed().is_none());
    }

    #[test]
    fn test_save_carries_latest_value() {
        let mut gate = ready_gate(&cfg(json!({"a": 1})));
        for n in 2..6 {
            assert_eq!(gate.on_local_change(&cfg(json!({"a": n}))), ChangeDecision::Schedule);
        }
        let payload = gate.on_debounce_elapsed().unwrap();
        assert_eq!(payload, cfg(json!({"a": 5})));
        assert_eq!(gate.phase(), SavePhase::Saving);
    }

    #[test]
    fn test_echoed_response_is_not_adopted() {
        let mut gate = ready_gate(&cfg(json!({"a": 1})));
        gate.on_local_change(&cfg(json!({"a": 2})));
        let sent = gate.on_debounce_elapsed().unwrap();
        assert_eq!(gate.on_save_succeeded(&sent), None);
        assert!(!gate.skip_armed());
        assert_eq!(gate.phase(), SavePhase::Idle);
        assert_eq!(gate.on_local_change(&sent), ChangeDecision::Unchanged);
    }

    #[test]
    fn test_canonical_response_adopted_with_skip() {
        let mut gate = ready_gate(&cfg(json!({"a": 1})));
        gate.on_local_change(&cfg(json!({"a": 2})));
        gate.on_debounce_elapsed().unwrap();
        let canonical = cfg(json!({"a": 2, "b": "default"}));
        assert_eq!(gate.on_save_succeeded(&canonical), Some(canonical.clone()));
        assert!(gate.skip_armed());
        assert_eq!(gate.on_local_change(&canonical), ChangeDecision::Skipped);
        assert_eq!(gate.on_local_change(&canonical), ChangeDecision::Unchanged);
    }

    #[test]
    fn test_elapsed_while_saving_is_skipped() {
        let mut gate = ready_gate(&cfg(json!({"a": 1})));
        gate.on_local_change(&cfg(json!({"a": 2})));
        let sent = gate.on_debounce_elapsed().unwrap();
        assert_eq!(gate.on_local_change(&cfg(json!({"a": 3}))), ChangeDecision::Schedule);
        assert_eq!(gate.phase(), SavePhase::Saving);
        assert!(gate.on_debounce_elapsed().is_none());
        assert!(!gate.has_pending());
        gate.on_save_succeeded(&sent);
        assert_eq!(gate.phase(), SavePhase::Idle);
    }

    #[test]
    fn test_change_during_save_survives_if_timer_fires_later() {
        let mut gate = ready_gate(&cfg(json!({"a": 1})));
        gate.on_local_change(&cfg(json!({"a": 2})));
        let sent = gate.on_debounce_elapsed().unwrap();
        gate.on_local_change(&cfg(json!({"a": 3})));
        gate.on_save_succeeded(&sent);
        assert_eq!(gate.phase(), SavePhase::PendingSave);
        assert_eq!(gate.on_debounce_elapsed(), Some(cfg(json!({"a": 3}))));
    }

    #[test]
    fn test_failed_save_keeps_hash() {
        let remote = cfg(json!({"a": 1}));
        let mut gate = ready_gate(&remote);
        let before = gate.last_saved_hash().map(str::to_string);
        gate.on_local_change(&cfg(json!({"a": 2})));
        gate.on_debounce_elapsed().unwrap();
        gate.on_save_failed();
        assert_eq!(gate.phase(), SavePhase::Idle);
        assert_eq!(gate.last_saved_hash().map(str::to_string), before);
        assert_eq!(gate.on_local_change(&cfg(json!({"a": 2}))), ChangeDecision::Schedule);
    }
}
