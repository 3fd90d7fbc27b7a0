//! Live engine implementation.
//!
//! Wires both channels into shared state:
//! - Push: task snapshots feed the reconciler; a terminal transition wakes
//!   the history loop for an immediate refetch
//! - Pull: history and job polls at an adaptive cadence (busy / idle)
//! - Log tails: one task per Running/Starting job, stopped when it leaves
//!   that state

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::DashboardClient;
use crate::config::Config;
use crate::confsync::{ConfigBackend, ConfigDomain, ConfigSnapshot, ConfigSync, SaveOutcome};
use crate::estimate::{estimate, overall_progress, ScrapeExpectations};
use crate::job::{Job, JobId, JobSource, JobStatus};
use crate::logtail::{fetch_item_session, LogSource, LogStreamReader};
use crate::metrics::{HISTORY_FETCHES, JOBS_TAILED, LOG_LINES_RECOGNIZED};
use crate::progress::{ScrapeSessionState, SessionStore};
use crate::push::{PushClient, PushHandle};
use crate::tasks::{HistorySource, PollCadence, TaskReconciler};

use super::types::{EngineError, EngineSnapshot, JobProgress};

/// State shared between the engine and its background tasks.
#[derive(Clone)]
struct Shared {
    job_source: Arc<dyn JobSource>,
    logs: Arc<dyn LogSource>,
    history: Arc<dyn HistorySource>,
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    sessions: Arc<RwLock<SessionStore>>,
    reconciler: Arc<RwLock<TaskReconciler>>,
    tails: Arc<RwLock<HashMap<JobId, JoinHandle<()>>>>,
    refetch: Arc<Notify>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    cadence: PollCadence,
    log_interval: Duration,
}

impl Shared {
    async fn is_busy(&self) -> bool {
        if self.reconciler.read().await.is_busy() {
            return true;
        }
        self.jobs.read().await.values().any(|j| j.status.is_active())
    }
}

/// The live engine - keeps job progress and the task list in sync with the
/// dashboard backend.
pub struct LiveEngine {
    config: Config,
    configs: Arc<dyn ConfigBackend>,
    shared: Shared,
    expectations: Arc<RwLock<ScrapeExpectations>>,
    syncs: RwLock<HashMap<ConfigDomain, ConfigSync>>,
    push: Mutex<Option<PushHandle>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    outcomes_tx: broadcast::Sender<SaveOutcome>,
}

impl LiveEngine {
    /// Create an engine reading every seam from one backend.
    pub fn new<B>(config: Config, backend: Arc<B>) -> Self
    where
        B: JobSource + LogSource + HistorySource + ConfigBackend + 'static,
    {
        let job_source: Arc<dyn JobSource> = backend.clone();
        let logs: Arc<dyn LogSource> = backend.clone();
        let history: Arc<dyn HistorySource> = backend.clone();
        let configs: Arc<dyn ConfigBackend> = backend;
        let (shutdown_tx, _) = broadcast::channel(1);
        let (outcomes_tx, _) = broadcast::channel(16);

        let shared = Shared {
            job_source,
            logs,
            history,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(SessionStore::new())),
            reconciler: Arc::new(RwLock::new(TaskReconciler::new())),
            tails: Arc::new(RwLock::new(HashMap::new())),
            refetch: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            cadence: PollCadence::from(&config.polling),
            log_interval: config.polling.log_interval(),
        };

        Self {
            expectations: Arc::new(RwLock::new(ScrapeExpectations::from(&config.scrape))),
            config,
            configs,
            shared,
            syncs: RwLock::new(HashMap::new()),
            push: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            outcomes_tx,
        }
    }

    /// Create an engine talking HTTP to the configured backend.
    pub fn from_config(config: Config) -> Result<Self, EngineError> {
        let client = DashboardClient::new(&config.backend)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    /// Start the engine (spawns background tasks).
    pub async fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Engine already running");
            return;
        }

        info!("Starting live engine against {}", self.config.backend.base_url);

        let mut workers = Vec::new();
        workers.extend(self.start_config_syncs().await);
        workers.extend(self.start_push().await);
        workers.push(self.spawn_history_loop());
        workers.push(self.spawn_job_loop());
        self.workers.lock().await.extend(workers);

        info!("Live engine started");
    }

    /// Stop the engine and every task it spawned.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            warn!("Engine not running");
            return;
        }

        info!("Stopping live engine");

        let _ = self.shared.shutdown_tx.send(());

        let push = self.push.lock().await.take();
        if let Some(push) = push {
            push.disconnect().await;
        }

        let syncs: Vec<ConfigSync> = self.syncs.write().await.drain().map(|(_, s)| s).collect();
        for sync in syncs {
            sync.stop().await;
        }

        // The job loop must be gone before tails are drained, or it could
        // spawn a new one.
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Engine task ended abnormally: {}", e);
            }
        }

        let tails: Vec<JoinHandle<()>> = self
            .shared
            .tails
            .write()
            .await
            .drain()
            .map(|(_, h)| h)
            .collect();
        for tail in tails {
            tail.abort();
            let _ = tail.await;
        }
        JOBS_TAILED.set(0);

        info!("Live engine stopped");
    }

    /// Current progress of every known job plus the merged task list.
    pub async fn snapshot(&self) -> EngineSnapshot {
        let exp = *self.expectations.read().await;
        let mut jobs: Vec<JobProgress> = {
            let jobs = self.shared.jobs.read().await;
            let sessions = self.shared.sessions.read().await;
            jobs.values()
                .map(|job| job_progress(job, sessions.get(job.id), &exp))
                .collect()
        };
        jobs.sort_by(|a, b| b.job_id.cmp(&a.job_id));

        let tasks = self.shared.reconciler.read().await.merged();
        let push = self.push.lock().await.as_ref().map(|h| h.state());

        EngineSnapshot { jobs, tasks, push }
    }

    /// Flags currently used by the progress estimator.
    pub async fn expectations(&self) -> ScrapeExpectations {
        *self.expectations.read().await
    }

    /// Jobs whose log is being tailed right now.
    pub async fn tailed_jobs(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.shared.tails.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Local value of a synced config domain.
    pub async fn config_value(&self, domain: ConfigDomain) -> Option<ConfigSnapshot> {
        self.syncs.read().await.get(&domain).map(|s| s.current())
    }

    /// Submit a local edit of a synced config domain.
    pub async fn edit_config(
        &self,
        domain: ConfigDomain,
        value: ConfigSnapshot,
    ) -> Result<(), EngineError> {
        let syncs = self.syncs.read().await;
        let sync = syncs
            .get(&domain)
            .ok_or(EngineError::DomainNotSynced(domain))?;
        if !sync.edit(value).await {
            warn!("Config sync for {} is no longer running", domain);
        }
        Ok(())
    }

    /// Receive the result of every config save.
    pub fn subscribe_save_outcomes(&self) -> broadcast::Receiver<SaveOutcome> {
        self.outcomes_tx.subscribe()
    }

    /// Fold the whole log of one finished item into a fresh session.
    pub async fn item_session(
        &self,
        job_id: JobId,
        filename: &str,
    ) -> Result<Option<ScrapeSessionState>, EngineError> {
        Ok(fetch_item_session(self.shared.logs.as_ref(), job_id, filename).await?)
    }

    async fn start_config_syncs(&self) -> Vec<JoinHandle<()>> {
        let mut workers = Vec::new();
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<SaveOutcome>(16);

        {
            let mut syncs = self.syncs.write().await;
            for domain in &self.config.sync.domains {
                if syncs.contains_key(domain) {
                    continue;
                }
                let sync = ConfigSync::spawn(
                    *domain,
                    Arc::clone(&self.configs),
                    self.config.sync.debounce(),
                    Some(outcome_tx.clone()),
                );
                syncs.insert(*domain, sync);
            }
        }
        drop(outcome_tx);

        let outcomes = self.outcomes_tx.clone();
        workers.push(tokio::spawn(async move {
            while let Some(outcome) = outcome_rx.recv().await {
                if let SaveOutcome::Failed { domain, error } = &outcome {
                    warn!("Saving {} config failed: {}", domain, error);
                }
                let _ = outcomes.send(outcome);
            }
        }));

        if self.config.scrape.from_server {
            workers.push(self.spawn_expectations_watch().await);
        }

        workers
    }

    /// Keep estimator flags in line with the backend's scrape config.
    async fn spawn_expectations_watch(&self) -> JoinHandle<()> {
        let expectations = Arc::clone(&self.expectations);
        let scrape = self
            .syncs
            .read()
            .await
            .get(&ConfigDomain::Scrape)
            .map(|s| s.subscribe());

        let Some(mut scrape) = scrape else {
            // Not synced: read it once.
            let configs = Arc::clone(&self.configs);
            return tokio::spawn(async move {
                match configs.fetch_config(ConfigDomain::Scrape).await {
                    Ok(value) => adopt_expectations(&expectations, &value).await,
                    Err(e) => warn!("Failed to fetch scrape config: {}", e),
                }
            });
        };

        let mut shutdown_rx = self.shared.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let value = scrape.borrow_and_update().clone();
                adopt_expectations(&expectations, &value).await;
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    changed = scrape.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn start_push(&self) -> Option<JoinHandle<()>> {
        if !self.config.push.enabled {
            info!("Push channel disabled; task list follows history polls only");
            return None;
        }

        let client = PushClient::from_config(&self.config.backend, &self.config.push);
        let (updates_tx, mut updates_rx) = mpsc::channel(16);
        *self.push.lock().await = Some(client.spawn(updates_tx));

        let reconciler = Arc::clone(&self.shared.reconciler);
        let refetch = Arc::clone(&self.shared.refetch);
        Some(tokio::spawn(async move {
            while let Some(tasks) = updates_rx.recv().await {
                if reconciler.write().await.apply_push(tasks) {
                    refetch.notify_one();
                }
            }
            debug!("Push consumer stopped");
        }))
    }

    fn spawn_history_loop(&self) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let mut shutdown_rx = shared.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("History poll loop started");
            let mut trigger = "startup";
            loop {
                HISTORY_FETCHES.with_label_values(&[trigger]).inc();
                match shared.history.list_history().await {
                    Ok(rows) => shared.reconciler.write().await.set_history(rows),
                    Err(e) => debug!("History poll failed: {}", e),
                }

                let interval = shared.cadence.interval(shared.is_busy().await);
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("History poll loop received shutdown signal");
                        break;
                    }
                    _ = shared.refetch.notified() => trigger = "transition",
                    _ = tokio::time::sleep(interval) => trigger = "timer",
                }
                if !shared.running.load(Ordering::Relaxed) {
                    break;
                }
            }
            info!("History poll loop stopped");
        })
    }

    fn spawn_job_loop(&self) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let mut shutdown_rx = shared.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Job poll loop started");
            loop {
                if let Err(e) = poll_jobs(&shared).await {
                    debug!("Job poll failed: {}", e);
                }

                let interval = shared.cadence.interval(shared.is_busy().await);
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Job poll loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
                if !shared.running.load(Ordering::Relaxed) {
                    break;
                }
            }
            info!("Job poll loop stopped");
        })
    }
}

async fn adopt_expectations(target: &RwLock<ScrapeExpectations>, scrape: &ConfigSnapshot) {
    if scrape.is_empty() {
        return;
    }
    let exp = ScrapeExpectations::from_scrape_config(scrape);
    debug!("Estimator expectations from backend: {:?}", exp);
    *target.write().await = exp;
}

/// Refresh the job list, then start and stop log tails to match it.
async fn poll_jobs(shared: &Shared) -> Result<(), crate::client::ClientError> {
    let list = shared.job_source.list_jobs().await?;
    let active: Vec<JobId> = list
        .iter()
        .filter(|j| j.status.is_active())
        .map(|j| j.id)
        .collect();
    *shared.jobs.write().await = list.into_iter().map(|j| (j.id, j)).collect();

    let stopped: Vec<(JobId, JoinHandle<()>)> = {
        let mut tails = shared.tails.write().await;
        let inactive: Vec<JobId> = tails
            .keys()
            .filter(|id| !active.contains(id))
            .copied()
            .collect();
        let stopped = inactive
            .into_iter()
            .filter_map(|id| tails.remove(&id).map(|h| (id, h)))
            .collect();

        for id in &active {
            if !tails.contains_key(id) {
                info!("Tailing log of job {}", id);
                tails.insert(*id, spawn_tail(shared, *id));
            }
        }
        JOBS_TAILED.set(tails.len() as i64);
        stopped
    };

    for (id, handle) in stopped {
        handle.abort();
        let _ = handle.await;
        info!("Stopped tailing log of job {}", id);
    }

    let evicted = shared.sessions.write().await.retain_active(&active);
    if !evicted.is_empty() {
        debug!("Evicted sessions of jobs {:?}", evicted);
    }
    Ok(())
}

fn spawn_tail(shared: &Shared, job_id: JobId) -> JoinHandle<()> {
    let logs = Arc::clone(&shared.logs);
    let sessions = Arc::clone(&shared.sessions);
    let interval = shared.log_interval;
    let mut shutdown_rx = shared.shutdown_tx.subscribe();

    tokio::spawn(async move {
        let mut reader = LogStreamReader::new(job_id);
        loop {
            let mut text = String::new();
            if let Err(e) = reader.poll(logs.as_ref(), |chunk| text.push_str(chunk)).await {
                debug!("Log poll for job {} failed: {}", job_id, e);
            }
            if !text.is_empty() {
                let recognized = sessions.write().await.apply_chunk(job_id, &text);
                LOG_LINES_RECOGNIZED.inc_by(recognized as u64);
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}

/// Combine a job with its folded session into displayable progress.
pub fn job_progress(
    job: &Job,
    session: Option<&ScrapeSessionState>,
    exp: &ScrapeExpectations,
) -> JobProgress {
    let mut progress = JobProgress {
        job_id: job.id,
        status: job.status,
        file_index: job.current,
        file_total: job.total,
        current_file: job.current_file.clone(),
        file_ratio: 0.0,
        overall: job.counter_ratio(),
        mini: None,
        error: job.error.clone(),
    };

    if let Some(state) = session {
        progress.mini = state.mini.clone();
        if state.file_total > 0 {
            progress.file_index = state.file_index;
            progress.file_total = state.file_total;
            progress.current_file = state.current_file_name.clone().or(progress.current_file);
            progress.file_ratio = estimate(state, exp);
            progress.overall = overall_progress(state, progress.file_ratio);
        }
    }

    if job.status == JobStatus::Completed {
        progress.file_ratio = 1.0;
        progress.overall = 1.0;
    }
    progress
}
