//! Reconnecting WebSocket client for the push channel.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::{BackendConfig, PushConfig};
use crate::metrics::{PUSH_CONNECTED, PUSH_MESSAGES, PUSH_RECONNECTS};
use crate::tasks::ActiveTask;

use super::{ConnectionState, PushMessage};

/// Push channel client settings.
#[derive(Debug, Clone)]
pub struct PushClient {
    url: String,
    reconnect_delay: Duration,
    connect_timeout: Duration,
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl PushClient {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bound each connection attempt, handshake included.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Derive the WebSocket URL from the backend's HTTP base URL. Connection
    /// attempts share the backend request timeout.
    pub fn from_config(backend: &BackendConfig, push: &PushConfig) -> Self {
        Self::new(ws_url(&backend.base_url, &push.path), push.reconnect_delay())
            .with_connect_timeout(Duration::from_secs(backend.timeout_secs.max(1) as u64))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection loop. Task snapshots are sent to `updates`.
    pub fn spawn(self, updates: mpsc::Sender<Vec<ActiveTask>>) -> PushHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let task = tokio::spawn(run(self, updates, shutdown_rx, state_tx));
        PushHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            task,
        }
    }
}

/// Handle to a running push client.
///
/// Dropping the handle stops the client as well.
pub struct PushHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl PushHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the connection and cancel any pending reconnect.
    pub async fn disconnect(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Push client task ended abnormally: {}", e);
        }
    }
}

/// Why a connected session ended.
enum SessionEnd {
    /// Shutdown requested or nobody is listening anymore.
    Stop,
    /// Server closed or the socket failed.
    Lost,
}

async fn run(
    client: PushClient,
    updates: mpsc::Sender<Vec<ActiveTask>>,
    mut shutdown: watch::Receiver<bool>,
    state: watch::Sender<ConnectionState>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        state.send_replace(ConnectionState::Connecting);

        let attempt = tokio::time::timeout(client.connect_timeout, connect_async(client.url.as_str()));
        let connect = tokio::select! {
            result = attempt => result,
            _ = shutdown.changed() => break,
        };

        match connect {
            Ok(Ok((ws, _))) => {
                info!("Push channel connected to {}", client.url);
                state.send_replace(ConnectionState::Connected);
                PUSH_CONNECTED.set(1);
                let end = session(ws, &updates, &mut shutdown).await;
                PUSH_CONNECTED.set(0);
                if let SessionEnd::Stop = end {
                    break;
                }
                warn!(
                    "Push channel closed, reconnecting in {:?}",
                    client.reconnect_delay
                );
            }
            Ok(Err(e)) => {
                warn!(
                    "Push channel connect to {} failed: {}, retrying in {:?}",
                    client.url, e, client.reconnect_delay
                );
            }
            Err(_) => {
                warn!(
                    "Push channel connect to {} timed out after {:?}, retrying in {:?}",
                    client.url, client.connect_timeout, client.reconnect_delay
                );
            }
        }

        state.send_replace(ConnectionState::Disconnected);
        tokio::select! {
            _ = tokio::time::sleep(client.reconnect_delay) => {}
            _ = shutdown.changed() => break,
        }
        PUSH_RECONNECTS.inc();
    }

    state.send_replace(ConnectionState::Stopped);
    debug!("Push client stopped");
}

async fn session<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    updates: &mpsc::Sender<Vec<ActiveTask>>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Stop;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !deliver(&text, updates).await {
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Stop;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Push channel error: {}", e);
                    return SessionEnd::Lost;
                }
            }
        }
    }
}

/// Forward one text frame. Returns false once the receiver is gone.
async fn deliver(text: &str, updates: &mpsc::Sender<Vec<ActiveTask>>) -> bool {
    match PushMessage::parse(text) {
        Some(PushMessage::Update { tasks }) => {
            PUSH_MESSAGES.with_label_values(&["update"]).inc();
            updates.send(tasks).await.is_ok()
        }
        Some(_) => {
            PUSH_MESSAGES.with_label_values(&["ignored"]).inc();
            true
        }
        None => {
            PUSH_MESSAGES.with_label_values(&["malformed"]).inc();
            debug!("Ignoring malformed push message: {}", truncate(text, 200));
            true
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// `http://host:port` + `/ws` -> `ws://host:port/ws`.
pub fn ws_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}{}", base, path)
}
