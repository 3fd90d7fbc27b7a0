//! Scrape jobs as reported by the backend.
//!
//! Jobs are server-owned: the engine only reads them to decide which log
//! streams to tail and how fast to poll.

mod types;

pub use types::*;
