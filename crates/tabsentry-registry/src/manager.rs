use std::sync::Arc;

use tracing::{debug, instrument, warn};

use tabsentry_core::types::{
    CloseReason, ClosedTab, Tab, TabOverrides, TabPatch, Window, WindowPatch,
};
use tabsentry_store::Store;

use crate::error::Result;

/// CRUD façade over the live tab and window collections.
///
/// Maintains the closed-tabs archive as a side effect of removal and answers
/// the "alternate tab" query. NotFound on a mutation is logged and swallowed —
/// callers must not assume the mutation occurred.
pub struct TabRegistry {
    store: Arc<Store>,
}

impl TabRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /*
     * TABS
     */

    /// Persist a tab after applying explicit overrides. No uniqueness check:
    /// a put with an existing id overwrites in place (last-write-wins).
    pub fn add_tab(&self, mut tab: Tab, overrides: TabOverrides) -> Result<()> {
        overrides.apply(&mut tab);
        self.store.put_tab(&tab)?;
        Ok(())
    }

    /// Read-modify-write. Returns `false` (after a warn log) when the tab is
    /// absent; the update did not happen.
    pub fn update_tab(&self, tab_id: i64, patch: TabPatch) -> Result<bool> {
        let Some(mut tab) = self.store.get_tab(tab_id)? else {
            warn!(tab_id, "update_tab: tab not found, skipping");
            return Ok(false);
        };
        patch.apply(&mut tab);
        self.store.put_tab(&tab)?;
        Ok(true)
    }

    pub fn get_tab(&self, tab_id: i64) -> Result<Option<Tab>> {
        Ok(self.store.get_tab(tab_id)?)
    }

    pub fn all_tabs(&self) -> Result<Vec<Tab>> {
        Ok(self.store.all_tabs()?)
    }

    pub fn tabs_len(&self) -> Result<usize> {
        Ok(self.store.count_tabs()?)
    }

    /// All tabs of a window, ordered by their position field ascending.
    pub fn tabs_by_window(&self, window_id: i64) -> Result<Vec<Tab>> {
        Ok(self.store.tabs_by_window(window_id)?)
    }

    /// Delete a live tab and archive it, unless its URL is an internal
    /// browser page. Returns the removed record (`None` if absent).
    #[instrument(skip(self))]
    pub fn remove_tab(&self, tab_id: i64) -> Result<Option<Tab>> {
        let Some(tab) = self.store.delete_tab(tab_id)? else {
            warn!(tab_id, "remove_tab: tab not found");
            return Ok(None);
        };
        if tab.is_internal() {
            debug!(tab_id, url = %tab.url, "internal page, not archiving");
        } else {
            self.store.append_closed_tab(&tab, CloseReason::Manual)?;
        }
        Ok(Some(tab))
    }

    /// Delete a live tab without archiving — system-driven teardown (session
    /// drain), not a user close.
    pub fn discard_tab(&self, tab_id: i64) -> Result<Option<Tab>> {
        Ok(self.store.delete_tab(tab_id)?)
    }

    /// The second-most-recently-visited tab: the most recent one is the tab
    /// the user is on right now, so alternate-tab must skip it. `None` when
    /// fewer than two visited tabs exist.
    pub fn get_last_tab(&self) -> Result<Option<Tab>> {
        let mut recent = self.store.most_recent_tabs(2)?;
        if recent.len() < 2 {
            return Ok(None);
        }
        Ok(Some(recent.remove(1)))
    }

    /*
     * WINDOWS
     */

    pub fn add_window(&self, window: Window) -> Result<()> {
        self.store.put_window(&window)?;
        Ok(())
    }

    pub fn update_window(&self, window_id: i64, patch: WindowPatch) -> Result<bool> {
        let Some(mut window) = self.store.get_window(window_id)? else {
            warn!(window_id, "update_window: window not found, skipping");
            return Ok(false);
        };
        patch.apply(&mut window);
        self.store.put_window(&window)?;
        Ok(true)
    }

    pub fn get_window(&self, window_id: i64) -> Result<Option<Window>> {
        Ok(self.store.get_window(window_id)?)
    }

    pub fn all_windows(&self) -> Result<Vec<Window>> {
        Ok(self.store.all_windows()?)
    }

    pub fn remove_window(&self, window_id: i64) -> Result<()> {
        self.store.delete_window(window_id)?;
        Ok(())
    }

    /// Windows whose current live tab count equals `length`.
    pub fn windows_by_tab_count(&self, length: usize) -> Result<Vec<Window>> {
        let mut matching = Vec::new();
        for window in self.store.all_windows()? {
            if self.store.tabs_by_window(window.window_id)?.len() == length {
                matching.push(window);
            }
        }
        Ok(matching)
    }

    /// Drop all live tabs and windows. Archives and sessions are untouched.
    pub fn clear_live_state(&self) -> Result<()> {
        self.store.clear_tabs()?;
        self.store.clear_windows()?;
        Ok(())
    }

    /*
     * CLOSED TABS
     */

    pub fn add_tab_to_closed_tabs(&self, tab: &Tab, reason: CloseReason) -> Result<i64> {
        Ok(self.store.append_closed_tab(tab, reason)?)
    }

    pub fn all_closed_tabs(&self) -> Result<Vec<ClosedTab>> {
        Ok(self.store.all_closed_tabs()?)
    }

    /// Remove the archive entry for a reopened tab. Deletes only on an exact
    /// `(url, title)` match for the id — guards against removing the wrong
    /// entry when the same URL was archived more than once.
    #[instrument(skip(self, url, title))]
    pub fn remove_from_closed_tabs(&self, tab_id: i64, url: &str, title: &str) -> Result<bool> {
        for entry in self.store.closed_tabs_by_tab_id(tab_id)? {
            if entry.url == url && entry.title == title {
                self.store.delete_closed_tab(entry.index)?;
                debug!(tab_id, idx = entry.index, "closed tab entry removed");
                return Ok(true);
            }
        }
        warn!(tab_id, "remove_from_closed_tabs: no exact match, skipping");
        Ok(false)
    }
}
