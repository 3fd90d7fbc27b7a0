//! Debounced, loop-free synchronization of config domains.
//!
//! Each domain runs its own [`ConfigSync`] driver. The decision logic lives
//! in [`SaveGate`], a small state machine with no I/O.

mod gate;
mod sync;
mod types;

pub use gate::{ChangeDecision, SaveGate, SavePhase};
pub use sync::ConfigSync;
pub use types::{stable_hash, ConfigBackend, ConfigDomain, ConfigSnapshot, SaveOutcome};
