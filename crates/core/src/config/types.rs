use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::confsync::ConfigDomain;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub scrape: ScrapeExpectationsConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Dashboard backend connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the dashboard backend (e.g., "http://127.0.0.1:8000").
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout() -> u32 {
    10
}

/// Poll cadence for the pull channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Job list / history poll interval while any job or task is active.
    #[serde(default = "default_busy_interval")]
    pub busy_interval_ms: u64,
    /// Job list / history poll interval while everything is idle.
    #[serde(default = "default_idle_interval")]
    pub idle_interval_ms: u64,
    /// Log tail interval for a Running/Starting job.
    #[serde(default = "default_log_interval")]
    pub log_interval_ms: u64,
}

fn default_busy_interval() -> u64 {
    1000
}

fn default_idle_interval() -> u64 {
    8000
}

fn default_log_interval() -> u64 {
    400
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            busy_interval_ms: default_busy_interval(),
            idle_interval_ms: default_idle_interval(),
            log_interval_ms: default_log_interval(),
        }
    }
}

impl PollingConfig {
    pub fn busy_interval(&self) -> Duration {
        Duration::from_millis(self.busy_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }
}

/// Push channel (WebSocket) settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path of the push endpoint on the backend.
    #[serde(default = "default_push_path")]
    pub path: String,
    /// Fixed delay before reconnecting after an involuntary close.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_push_path() -> String {
    "/ws".to_string()
}

fn default_reconnect_delay() -> u64 {
    3000
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_push_path(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl PushConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Config-domain synchronization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Debounce window for local edits before a save is issued.
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    /// Domains kept in sync with the backend.
    #[serde(default = "default_domains")]
    pub domains: Vec<ConfigDomain>,
}

fn default_debounce() -> u64 {
    600
}

fn default_domains() -> Vec<ConfigDomain> {
    ConfigDomain::ALL.to_vec()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            domains: default_domains(),
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Static fallback for which scrape steps are enabled.
///
/// Used by the progress estimator until the backend's scrape config has been
/// fetched (and always, when `from_server` is false).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeExpectationsConfig {
    /// Prefer the backend's scrape config over the values below once fetched.
    #[serde(default = "default_true")]
    pub from_server: bool,
    #[serde(default)]
    pub translate: bool,
    #[serde(default = "default_true")]
    pub poster: bool,
    #[serde(default = "default_true")]
    pub fanart: bool,
    #[serde(default)]
    pub previews: bool,
    #[serde(default)]
    pub trailer: bool,
    #[serde(default = "default_true")]
    pub nfo: bool,
    /// Number of crawlers expected per file (0 = only count observed attempts).
    #[serde(default)]
    pub expected_crawlers: u32,
}

impl Default for ScrapeExpectationsConfig {
    fn default() -> Self {
        Self {
            from_server: true,
            translate: false,
            poster: true,
            fanart: true,
            previews: false,
            trailer: false,
            nfo: true,
            expected_crawlers: 0,
        }
    }
}

/// Local status endpoint served by the CLI (`/status`, `/metrics`, `/health`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_status_host")]
    pub host: IpAddr,
    #[serde(default = "default_status_port")]
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_status_host(),
            port: default_status_port(),
        }
    }
}

fn default_status_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_status_port() -> u16 {
    9187
}
