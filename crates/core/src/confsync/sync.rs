//! Async driver running a [`SaveGate`] against a backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::ClientError;
use crate::metrics::CONFIG_SAVES;

use super::gate::{ChangeDecision, SaveGate};
use super::types::{stable_hash, ConfigBackend, ConfigDomain, ConfigSnapshot, SaveOutcome};

/// Keeps one config domain in sync with the backend.
///
/// Local edits go in through [`ConfigSync::edit`]; the current local value
/// (including values adopted from the backend) is published on a watch
/// channel.
pub struct ConfigSync {
    domain: ConfigDomain,
    edits: mpsc::Sender<ConfigSnapshot>,
    local: watch::Receiver<ConfigSnapshot>,
    ready: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl ConfigSync {
    /// Fetch the domain and start syncing it.
    ///
    /// Save results are reported on `outcomes` when given.
    pub fn spawn(
        domain: ConfigDomain,
        backend: Arc<dyn ConfigBackend>,
        debounce: Duration,
        outcomes: Option<mpsc::Sender<SaveOutcome>>,
    ) -> Self {
        let (edits_tx, edits_rx) = mpsc::channel(32);
        let (local_tx, local_rx) = watch::channel(ConfigSnapshot::new());
        let (ready_tx, ready_rx) = watch::channel(false);

        let driver = Driver {
            domain,
            backend,
            debounce,
            outcomes,
            local: local_tx,
            ready: ready_tx,
            gate: SaveGate::new(),
        };
        let task = tokio::spawn(driver.run(edits_rx));

        Self {
            domain,
            edits: edits_tx,
            local: local_rx,
            ready: ready_rx,
            task,
        }
    }

    pub fn domain(&self) -> ConfigDomain {
        self.domain
    }

    /// Submit a new local value.
    pub async fn edit(&self, value: ConfigSnapshot) -> bool {
        self.edits.send(value).await.is_ok()
    }

    /// Apply a change to the current local value and submit it.
    pub async fn update<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut ConfigSnapshot),
    {
        let mut value = self.current();
        change(&mut value);
        self.edit(value).await
    }

    pub fn current(&self) -> ConfigSnapshot {
        self.local.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConfigSnapshot> {
        self.local.clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the initial fetch has completed.
    pub async fn wait_ready(&self) {
        let mut ready = self.ready.clone();
        while !*ready.borrow_and_update() {
            if ready.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stop syncing. A pending debounced save is dropped.
    pub async fn stop(self) {
        drop(self.edits);
        if let Err(e) = self.task.await {
            warn!("Config sync task for {} ended abnormally: {}", self.domain, e);
        }
    }
}

struct Driver {
    domain: ConfigDomain,
    backend: Arc<dyn ConfigBackend>,
    debounce: Duration,
    outcomes: Option<mpsc::Sender<SaveOutcome>>,
    local: watch::Sender<ConfigSnapshot>,
    ready: watch::Sender<bool>,
    gate: SaveGate,
}

impl Driver {
    async fn run(mut self, mut edits: mpsc::Receiver<ConfigSnapshot>) {
        match self.backend.fetch_config(self.domain).await {
            Ok(remote) => {
                debug!("Fetched {} config ({} keys)", self.domain, remote.len());
                self.gate.fetched(Some(&remote));
                self.local.send_replace(remote);
            }
            Err(e) => {
                warn!("Failed to fetch {} config: {}", self.domain, e);
                self.gate.fetched(None);
            }
        }
        let _ = self.ready.send(true);

        let timer = tokio::time::sleep(self.debounce);
        tokio::pin!(timer);
        let mut armed = false;

        // The post-fetch value passes through the change path like any other
        // update and consumes the skip flag.
        let initial = self.local.borrow().clone();
        self.on_change(initial, timer.as_mut(), &mut armed);

        let (done_tx, mut done_rx) = mpsc::channel::<Result<ConfigSnapshot, ClientError>>(1);

        loop {
            tokio::select! {
                edit = edits.recv() => match edit {
                    Some(value) => {
                        self.local.send_replace(value.clone());
                        self.on_change(value, timer.as_mut(), &mut armed);
                    }
                    None => break,
                },
                _ = timer.as_mut(), if armed => {
                    armed = false;
                    match self.gate.on_debounce_elapsed() {
                        Some(payload) => {
                            let backend = Arc::clone(&self.backend);
                            let domain = self.domain;
                            let done = done_tx.clone();
                            tokio::spawn(async move {
                                let result = backend.save_config(domain, &payload).await;
                                let _ = done.send(result).await;
                            });
                        }
                        None => {
                            debug!("Skipping {} config save: a save is already in flight", self.domain);
                            CONFIG_SAVES
                                .with_label_values(&[self.domain.as_str(), "in_flight_skip"])
                                .inc();
                        }
                    }
                }
                Some(result) = done_rx.recv() => {
                    self.on_saved(result, timer.as_mut(), &mut armed).await;
                }
            }
        }
        debug!("Config sync for {} stopped", self.domain);
    }

    fn on_change(
        &mut self,
        value: ConfigSnapshot,
        timer: std::pin::Pin<&mut tokio::time::Sleep>,
        armed: &mut bool,
    ) {
        match self.gate.on_local_change(&value) {
            ChangeDecision::Schedule => {
                timer.reset(Instant::now() + self.debounce);
                *armed = true;
            }
            ChangeDecision::Unchanged if !self.gate.has_pending() => {
                *armed = false;
            }
            _ => {}
        }
    }

    async fn on_saved(
        &mut self,
        result: Result<ConfigSnapshot, ClientError>,
        timer: std::pin::Pin<&mut tokio::time::Sleep>,
        armed: &mut bool,
    ) {
        let outcome = match result {
            Ok(response) => {
                let hash = stable_hash(&response);
                info!("Saved {} config", self.domain);
                CONFIG_SAVES
                    .with_label_values(&[self.domain.as_str(), "success"])
                    .inc();
                if let Some(adopted) = self.gate.on_save_succeeded(&response) {
                    self.local.send_replace(adopted.clone());
                    self.on_change(adopted, timer, armed);
                }
                SaveOutcome::Saved {
                    domain: self.domain,
                    hash,
                }
            }
            Err(e) => {
                warn!("Failed to save {} config: {}", self.domain, e);
                CONFIG_SAVES
                    .with_label_values(&[self.domain.as_str(), "failed"])
                    .inc();
                self.gate.on_save_failed();
                SaveOutcome::Failed {
                    domain: self.domain,
                    error: e.to_string(),
                }
            }
        };
        if let Some(outcomes) = &self.outcomes {
            let _ = outcomes.send(outcome).await;
        }
    }
}
