//! Virtual phase estimation.
//!
//! Turns a [`ScrapeSessionState`](crate::progress::ScrapeSessionState) into a
//! completion ratio for the file being scraped, as a weighted mean of
//! independent sub-signals. Signals for steps that are disabled in the
//! scrape configuration are left out entirely.

mod expectations;
mod weights;

pub use expectations::ScrapeExpectations;
pub use weights::{estimate, overall_progress, SignalWeights, WEIGHTS};
