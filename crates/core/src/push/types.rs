//! Push channel message types.

use serde::{Deserialize, Serialize};

use crate::tasks::ActiveTask;

/// A message on the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// Full snapshot of the live task set.
    Update {
        #[serde(default)]
        tasks: Vec<ActiveTask>,
    },
    /// Keep-alive.
    Ping,
    /// Any other message type; ignored.
    #[serde(other)]
    Other,
}

impl PushMessage {
    /// Parse a text frame. Returns `None` for malformed payloads.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Connection state of the push client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// Waiting out the reconnect delay.
    Disconnected,
    /// Manually disconnected; no further reconnects.
    Stopped,
}
