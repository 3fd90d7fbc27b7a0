//! Log tailing for running jobs.
//!
//! A [`LogStreamReader`] polls the backend's offset-based log endpoint and
//! hands complete lines to the caller, committing the offset afterwards.

mod reader;
mod types;

pub use reader::{fetch_item_session, LogStreamReader};
pub use types::{ItemLog, LogChunk, LogSource, PollOutcome};
