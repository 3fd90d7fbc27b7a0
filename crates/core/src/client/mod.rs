//! Dashboard backend access.
//!
//! [`DashboardClient`] speaks the backend's HTTP API and implements the
//! job, log, history, and config seams the engine is written against.

mod dashboard;
mod types;

pub use dashboard::DashboardClient;
pub use types::*;
