//! Scrape progress state machine.
//!
//! Raw log text is classified line by line through an ordered rule table
//! ([`RULES`]) into [`LineEvent`]s, which are then folded into a
//! [`ScrapeSessionState`]. Folding never fails: unknown or malformed lines
//! are skipped.

mod fold;
mod live;
mod rules;
mod state;
mod store;

pub use fold::{apply, fold, fold_at, fold_into, source_for_url};
pub use live::LiveSnapshot;
pub use rules::{classify_line, strip_quotes, strip_timestamp, LineEvent, LineRule, RULES};
pub use state::{ArtworkKind, MiniKey, MiniStatus, ScrapeSessionState, TranslateField};
pub use store::SessionStore;
