use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument, warn};

use tabsentry_core::types::{LastSession, SettingKey, SettingValue, Tab, TabOverrides, Window};
use tabsentry_registry::{SystemFlags, TabRegistry};
use tabsentry_store::Store;

use crate::error::Result;
use crate::url::normalize_url;

/// Minimum fraction of positions whose normalized URLs must agree for a
/// window to be recognized as a returning session. Tolerates a handful of
/// tabs having navigated away without false-matching unrelated windows that
/// happen to share a tab count.
pub const MATCH_THRESHOLD: f64 = 0.8;

/// Where the matcher is in the startup lifecycle. `Draining` is transient
/// inside a single handler invocation, so only the endpoints are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchState {
    /// No session boundary observed yet.
    Fresh,
    /// Live state has been archived; new windows go through reconciliation.
    Reconciling,
}

/// What `handle_window_created` decided about a window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// A drained session matched; its tab metadata was carried over.
    Restored {
        session_index: i64,
        match_ratio: f64,
    },
    /// No candidate reached the threshold — treated as entirely new.
    New,
}

/// Decides, per window-creation event, whether the window is a returning
/// session or a new one, and merges archived tab state on a match.
pub struct SessionMatcher {
    store: Arc<Store>,
    registry: Arc<TabRegistry>,
    flags: SystemFlags,
    state: Mutex<MatchState>,
}

impl SessionMatcher {
    pub fn new(store: Arc<Store>, registry: Arc<TabRegistry>, flags: SystemFlags) -> Self {
        Self {
            store,
            registry,
            flags,
            state: Mutex::new(MatchState::Fresh),
        }
    }

    /// Entry point for every window-creation event.
    ///
    /// The first invocation after a `newSession` flag checks-and-clears it by
    /// draining all live windows into last-session records; every invocation
    /// then reconciles the new window against the drained candidates.
    #[instrument(skip(self, window, tabs), fields(window_id = window.window_id, tabs = tabs.len()))]
    pub fn handle_window_created(&self, window: &Window, tabs: &[Tab]) -> Result<WindowOutcome> {
        {
            let mut state = self.state.lock().unwrap();
            if *state == MatchState::Fresh {
                // Flag check first, clear at the end of the drain — narrows
                // (not eliminates) the race window for a second startup event.
                if self.flags.is_set(SettingKey::NewSession)? {
                    self.drain()?;
                }
                *state = MatchState::Reconciling;
            }
        }
        self.reconcile(window, tabs)
    }

    /// Archive every live window with its tabs into a last-session record,
    /// then clear the live collections. Tabs are discarded, not archived to
    /// closed tabs — this is system teardown, not a user close.
    ///
    /// Sessions left over from the previous startup were never reopened by
    /// the user; they are demoted to old sessions first, so only the current
    /// startup's snapshots act as reconciliation candidates.
    fn drain(&self) -> Result<()> {
        let stale = self.store.all_last_sessions()?;
        if !stale.is_empty() {
            info!(sessions = stale.len(), "demoting unmatched prior sessions");
        }
        for session in &stale {
            self.store
                .append_old_session(session, &chrono::Utc::now().to_rfc3339())?;
            self.store.delete_last_session(session.index)?;
        }

        let windows = self.registry.all_windows()?;
        info!(windows = windows.len(), "new session: draining live state");

        for window in windows {
            let tabs = self.registry.tabs_by_window(window.window_id)?;
            self.store.append_last_session(
                window.window_id,
                window.title.as_deref(),
                &tabs,
            )?;
            self.registry.remove_window(window.window_id)?;
        }
        for tab in self.registry.all_tabs()? {
            self.registry.discard_tab(tab.id)?;
        }

        self.flags
            .update(SettingKey::NewSession, Some(SettingValue::Bool(false)))?;
        Ok(())
    }

    /// Match the new window against drained sessions with the exact same tab
    /// count. First candidate at or above the threshold wins; candidates are
    /// evaluated in drain order (ascending index).
    fn reconcile(&self, window: &Window, tabs: &[Tab]) -> Result<WindowOutcome> {
        let candidates = self.store.last_sessions_by_tabs_length(tabs.len() as i64)?;
        debug!(candidates = candidates.len(), "length-gated candidate lookup");

        for session in &candidates {
            if session.tabs_length == 0 {
                continue;
            }
            let (merged, misses) = merge_tabs(session, window.window_id, tabs);
            let match_ratio = (session.tabs_length - misses) as f64 / session.tabs_length as f64;

            if match_ratio < MATCH_THRESHOLD {
                debug!(
                    session_index = session.index,
                    match_ratio, "candidate below threshold"
                );
                continue;
            }

            info!(
                session_index = session.index,
                match_ratio, "window reconciled to drained session"
            );
            self.registry.add_window(window.clone())?;
            for tab in merged {
                self.registry.add_tab(tab, TabOverrides::default())?;
            }
            self.store.delete_last_session(session.index)?;
            self.store
                .append_old_session(session, &chrono::Utc::now().to_rfc3339())?;

            return Ok(WindowOutcome::Restored {
                session_index: session.index,
                match_ratio,
            });
        }

        info!("no session matched; window treated as new");
        self.registry.add_window(window.clone())?;
        for tab in tabs {
            self.registry.add_tab(
                tab.clone(),
                TabOverrides {
                    window_id: Some(window.window_id),
                    last_visited: Some(None),
                },
            )?;
        }
        Ok(WindowOutcome::New)
    }
}

/// Walk the two tab lists position-by-position. A position whose normalized
/// URLs agree keeps the session tab's full record (preserving `lastVisited`
/// and friends) rewritten to the live tab's id and window; any other
/// position — including one whose URL fails to normalize — counts as a miss
/// and keeps the live tab.
fn merge_tabs(session: &LastSession, new_window_id: i64, live: &[Tab]) -> (Vec<Tab>, i64) {
    let mut merged = Vec::with_capacity(live.len());
    let mut misses = 0i64;

    for (position, live_tab) in live.iter().enumerate() {
        let matched = session.tabs.get(position).and_then(|session_tab| {
            match (
                normalize_url(&session_tab.url),
                normalize_url(&live_tab.url),
            ) {
                (Ok(a), Ok(b)) if a == b => Some(session_tab),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(position, error = %e, "url normalization failed, counting as miss");
                    None
                }
                _ => None,
            }
        });

        match matched {
            Some(session_tab) => {
                let mut tab = session_tab.clone();
                tab.id = live_tab.id;
                tab.window_id = new_window_id;
                merged.push(tab);
            }
            None => {
                misses += 1;
                let mut tab = live_tab.clone();
                tab.window_id = new_window_id;
                merged.push(tab);
            }
        }
    }

    (merged, misses)
}
