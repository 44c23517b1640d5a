//! `tabsentry-sessions` — session reconciliation across browser restarts.
//!
//! # Overview
//!
//! When a new browser session begins (`newSession` flag set at startup), all
//! live windows are drained into last-session snapshots. Each window created
//! afterwards is compared against snapshots with the exact same tab count;
//! if at least [`matcher::MATCH_THRESHOLD`] of positions agree on normalized
//! URLs, the snapshot's tab metadata is carried over instead of starting
//! cold.
//!
//! # Data flow
//!
//! ```text
//! window-created → SessionMatcher (drain once, then reconcile)
//!                → TabRegistry mutations → Store
//! ```

pub mod error;
pub mod matcher;
pub mod url;

pub use error::{MatchError, Result};
pub use matcher::{SessionMatcher, WindowOutcome, MATCH_THRESHOLD};
