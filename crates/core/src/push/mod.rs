//! Push channel: a reconnecting WebSocket client that delivers live task
//! snapshots.

mod client;
mod types;

pub use client::{ws_url, PushClient, PushHandle};
pub use types::{ConnectionState, PushMessage};
