//! Types for config-domain synchronization.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::client::ClientError;

/// A config domain mirrored between client and backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigDomain {
    Download,
    Player,
    Scrape,
}

impl ConfigDomain {
    pub const ALL: [ConfigDomain; 3] = [
        ConfigDomain::Download,
        ConfigDomain::Player,
        ConfigDomain::Scrape,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigDomain::Download => "download",
            ConfigDomain::Player => "player",
            ConfigDomain::Scrape => "scrape",
        }
    }

    /// Backend path serving this domain (GET to fetch, POST to save).
    pub fn path(&self) -> String {
        format!("/api/{}/config", self.as_str())
    }
}

impl fmt::Display for ConfigDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat key/value config of one domain.
pub type ConfigSnapshot = Map<String, Value>;

/// Hex SHA-256 of the snapshot's key-sorted JSON encoding.
pub fn stable_hash(snapshot: &ConfigSnapshot) -> String {
    let mut hasher = Sha256::new();
    write_canonical(&Value::Object(snapshot.clone()), &mut hasher);
    format!("{:x}", hasher.finalize())
}

/// Feed a value with object keys in sorted order, independent of how the
/// map happens to be ordered.
fn write_canonical(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hasher.update(Value::String(key.clone()).to_string().as_bytes());
                hasher.update(b":");
                if let Some(v) = map.get(key) {
                    write_canonical(v, hasher);
                }
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                write_canonical(item, hasher);
            }
            hasher.update(b"]");
        }
        other => hasher.update(other.to_string().as_bytes()),
    }
}

/// Result of a save, reported to whoever surfaces it to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { domain: ConfigDomain, hash: String },
    Failed { domain: ConfigDomain, error: String },
}

/// Backend storing config domains.
#[async_trait]
pub trait ConfigBackend: Send + Sync {
    async fn fetch_config(&self, domain: ConfigDomain) -> Result<ConfigSnapshot, ClientError>;

    /// Save and return the backend's canonical value.
    async fn save_config(
        &self,
        domain: ConfigDomain,
        snapshot: &ConfigSnapshot,
    ) -> Result<ConfigSnapshot, ClientError>;
}
