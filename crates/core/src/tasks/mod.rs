//! Download task reconciliation.
//!
//! The same logical task is seen twice: as a persisted row from the history
//! endpoint and as a live entry on the push channel. [`merge_tasks`] joins
//! the two by id, and [`TransitionDetector`] notices when a live task
//! finishes so the persisted view can be refreshed promptly.

mod merge;
mod reconciler;
mod transitions;
mod types;

pub use merge::merge_tasks;
pub use reconciler::{PollCadence, TaskReconciler};
pub use transitions::TransitionDetector;
pub use types::*;
