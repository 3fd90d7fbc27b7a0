//! In-process fake dashboard backend for integration tests.
//!
//! Serves the HTTP API and the `/ws` push channel with axum on an ephemeral
//! port. Tests mutate the backend through [`FakeBackend`] and observe what
//! the engine requested.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

use livedash_core::{Config, EngineSnapshot, LiveEngine};

/// How long `wait_*` helpers poll before failing the test.
pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Inner {
    jobs: Vec<Value>,
    logs: HashMap<u64, String>,
    history: Vec<Value>,
    configs: HashMap<String, Map<String, Value>>,
    saves: Vec<(String, Value)>,
    history_requests: usize,
    fail_saves: bool,
}

pub struct BackendState {
    inner: Mutex<Inner>,
    /// Largest log slice returned per request.
    max_log_bytes: AtomicUsize,
    push: broadcast::Sender<String>,
    kick: Notify,
    ws_connections: AtomicUsize,
}

impl BackendState {
    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(64);
        let state = Arc::new(BackendState {
            inner: Mutex::new(Inner::default()),
            max_log_bytes: AtomicUsize::new(65536),
            push,
            kick: Notify::new(),
            ws_connections: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/scrape/jobs", get(list_jobs))
            .route("/api/scrape/logs/{job_id}", get(read_log))
            .route("/api/scrape/logs/{job_id}/item", get(read_item_log))
            .route("/api/history", get(list_history))
            .route(
                "/api/download/config",
                get(|s: State<Arc<BackendState>>| get_config(s, "download"))
                    .post(|s: State<Arc<BackendState>>, b: Json<Value>| save_config(s, "download", b)),
            )
            .route(
                "/api/player/config",
                get(|s: State<Arc<BackendState>>| get_config(s, "player"))
                    .post(|s: State<Arc<BackendState>>, b: Json<Value>| save_config(s, "player", b)),
            )
            .route(
                "/api/scrape/config",
                get(|s: State<Arc<BackendState>>| get_config(s, "scrape"))
                    .post(|s: State<Arc<BackendState>>, b: Json<Value>| save_config(s, "scrape", b)),
            )
            .route("/ws", get(ws_upgrade))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Engine config pointed at this backend with fast test cadences.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.backend.base_url = self.base_url();
        config.backend.timeout_secs = 2;
        config.polling.busy_interval_ms = 50;
        config.polling.idle_interval_ms = 200;
        config.polling.log_interval_ms = 30;
        config.push.enabled = false;
        config.push.reconnect_delay_ms = 100;
        config.sync.domains = vec![];
        config.sync.debounce_ms = 150;
        config.scrape.from_server = false;
        config
    }

    pub fn set_job(&self, id: u64, status: &str, current: u32, total: u32) {
        self.state.with(|s| {
            s.jobs.retain(|j| j["id"] != json!(id));
            s.jobs.push(json!({
                "id": id,
                "directory": "/media/incoming",
                "status": status,
                "created_at": 1718000000.0,
                "completed_at": null,
                "current": current,
                "total": total,
                "current_file": null,
            }));
        });
    }

    pub fn append_log(&self, job_id: u64, text: &str) {
        self.state
            .with(|s| s.logs.entry(job_id).or_default().push_str(text));
    }

    pub fn set_max_log_bytes(&self, max: usize) {
        self.state.max_log_bytes.store(max, Ordering::SeqCst);
    }

    pub fn set_history(&self, rows: Vec<Value>) {
        self.state.with(|s| s.history = rows);
    }

    pub fn history_requests(&self) -> usize {
        self.state.with(|s| s.history_requests)
    }

    pub fn set_config(&self, domain: &str, value: Value) {
        let map = value.as_object().cloned().unwrap();
        self.state.with(|s| {
            s.configs.insert(domain.to_string(), map);
        });
    }

    pub fn saves(&self) -> Vec<(String, Value)> {
        self.state.with(|s| s.saves.clone())
    }

    pub fn fail_saves(&self, fail: bool) {
        self.state.with(|s| s.fail_saves = fail);
    }

    /// Send a raw text frame to every connected push client.
    pub fn push(&self, message: Value) {
        let _ = self.state.push.send(message.to_string());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.state.push.send(text.to_string());
    }

    /// Close every open push connection from the server side.
    pub fn kick_push_clients(&self) {
        self.state.kick.notify_waiters();
    }

    /// Push connections accepted so far.
    pub fn ws_connections(&self) -> usize {
        self.state.ws_connections.load(Ordering::SeqCst)
    }

    /// Push clients currently subscribed.
    pub fn ws_subscribers(&self) -> usize {
        self.state.push.receiver_count()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn list_jobs(State(state): State<Arc<BackendState>>) -> Json<Value> {
    Json(Value::Array(state.with(|s| s.jobs.clone())))
}

#[derive(Deserialize)]
struct OffsetQuery {
    #[serde(default)]
    offset: usize,
}

async fn read_log(
    State(state): State<Arc<BackendState>>,
    Path(job_id): Path<u64>,
    Query(query): Query<OffsetQuery>,
) -> Json<Value> {
    let max = state.max_log_bytes.load(Ordering::SeqCst);
    let body = state.with(|s| match s.logs.get(&job_id) {
        None => json!({"exists": false, "text": "", "next_offset": 0}),
        Some(log) => {
            let bytes = log.as_bytes();
            let start = query.offset.min(bytes.len());
            let end = (start + max).min(bytes.len());
            json!({
                "exists": true,
                "text": String::from_utf8_lossy(&bytes[start..end]),
                "next_offset": end,
            })
        }
    });
    Json(body)
}

#[derive(Deserialize)]
struct ItemQuery {
    filename: String,
}

/// Slice of the job log between the item's boundary marker and the next one.
async fn read_item_log(
    State(state): State<Arc<BackendState>>,
    Path(job_id): Path<u64>,
    Query(query): Query<ItemQuery>,
) -> Json<Value> {
    let body = state.with(|s| match s.logs.get(&job_id) {
        None => json!({"exists": false, "text": "", "filename": query.filename}),
        Some(log) => {
            let mut out = String::new();
            let mut inside = false;
            for line in log.lines() {
                if line.contains("=== [") {
                    inside = line.contains(&query.filename);
                }
                if inside {
                    out.push_str(line);
                    out.push('\n');
                }
            }
            json!({"exists": true, "text": out, "filename": query.filename})
        }
    });
    Json(body)
}

async fn list_history(State(state): State<Arc<BackendState>>) -> Json<Value> {
    Json(Value::Array(state.with(|s| {
        s.history_requests += 1;
        s.history.clone()
    })))
}

async fn get_config(State(state): State<Arc<BackendState>>, domain: &'static str) -> Json<Value> {
    let config = state.with(|s| s.configs.get(domain).cloned().unwrap_or_default());
    Json(Value::Object(config))
}

/// Store the posted keys and answer with the full stored config, the way
/// the real backend re-reads its config after saving.
async fn save_config(
    State(state): State<Arc<BackendState>>,
    domain: &'static str,
    Json(body): Json<Value>,
) -> Response {
    let result = state.with(|s| {
        s.saves.push((domain.to_string(), body.clone()));
        if s.fail_saves {
            return None;
        }
        let stored = s.configs.entry(domain.to_string()).or_default();
        if let Value::Object(updates) = body {
            for (k, v) in updates {
                stored.insert(k, v);
            }
        }
        Some(stored.clone())
    });
    match result {
        Some(config) => Json(Value::Object(config)).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "disk full").into_response(),
    }
}

async fn ws_upgrade(
    State(state): State<Arc<BackendState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| push_session(socket, state))
}

async fn push_session(mut socket: WebSocket, state: Arc<BackendState>) {
    let mut messages = state.push.subscribe();
    state.ws_connections.fetch_add(1, Ordering::SeqCst);
    loop {
        tokio::select! {
            message = messages.recv() => match message {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = state.kick.notified() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

/// Poll the engine until `check` accepts a snapshot.
pub async fn wait_for_snapshot<F>(engine: &LiveEngine, mut check: F) -> EngineSnapshot
where
    F: FnMut(&EngineSnapshot) -> bool,
{
    let deadline = Instant::now() + WAIT;
    loop {
        let snapshot = engine.snapshot().await;
        if check(&snapshot) {
            return snapshot;
        }
        if Instant::now() > deadline {
            panic!("condition not met in time; last snapshot: {:?}", snapshot);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Poll a synchronous condition until it holds.
pub async fn wait_until<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + WAIT;
    while !check() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Log lines for one file, as the job runner writes them.
pub fn file_log(index: u32, total: u32, code: &str) -> String {
    format!(
        "2024-06-01 12:00:00 === [{index}/{total}] {code}.mp4 ===\n\
         2024-06-01 12:00:01 try crawler: javbus\n\
         2024-06-01 12:00:02 hit crawler: javbus title='Title {code}' url='https://www.javbus.com/{code}'\n\
         2024-06-01 12:00:03 live.json: {{\"code\":\"{code}\",\"title\":\"Title {code}\",\"release\":\"2021-01-02\",\"studio\":\"S1\"}}\n\
         2024-06-01 12:00:04 artwork downloaded: {code}-poster.jpg (1024 bytes) <- https://www.javbus.com/p.jpg\n\
         2024-06-01 12:00:05 artwork downloaded: {code}-fanart.jpg (2048 bytes) <- https://pics.dmm.co.jp/f.jpg\n\
         2024-06-01 12:00:06 write nfo: {code}.nfo\n"
    )
}
