use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use tabsentry_core::config::BridgeConfig;
use tabsentry_core::types::{CloseReason, SettingKey, SettingValue, TabOverrides, TabPatch};
use tabsentry_registry::{SystemFlags, TabRegistry};
use tabsentry_sessions::SessionMatcher;

use crate::protocol::{BrowserEvent, HostCommand, TabChange};

/// Dispatches browser lifecycle events into the core and collects the host
/// commands each handler produces.
///
/// The original background script kept "time since window created" and the
/// closing-window tab buffer as module globals; here they are explicit
/// fields with a defined initialization point.
pub struct EventRouter {
    registry: Arc<TabRegistry>,
    flags: SystemFlags,
    matcher: SessionMatcher,
    /// Set on every window-created event; tab-created events arriving within
    /// the suppression window are session-restore population, not user tabs.
    window_created_at: Option<Instant>,
    /// Tab ids buffered per closing window — those removals are window
    /// teardown, not individual user closes.
    closed_window_tabs: HashMap<i64, Vec<i64>>,
    restore_suppress: Duration,
    badge_updates: bool,
}

impl EventRouter {
    pub fn new(
        registry: Arc<TabRegistry>,
        flags: SystemFlags,
        matcher: SessionMatcher,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            registry,
            flags,
            matcher,
            window_created_at: None,
            closed_window_tabs: HashMap::new(),
            restore_suppress: Duration::from_millis(config.restore_suppress_ms),
            badge_updates: config.badge_updates,
        }
    }

    pub fn dispatch(&mut self, event: BrowserEvent) -> Result<Vec<HostCommand>> {
        match event {
            BrowserEvent::Startup => self.on_startup(),
            BrowserEvent::Installed { windows, tabs } => self.on_installed(windows, tabs),
            BrowserEvent::TabCreated { tab } => self.on_tab_created(tab),
            BrowserEvent::TabUpdated { tab_id, change, tab } => {
                self.on_tab_updated(tab_id, change, tab)
            }
            BrowserEvent::TabRemoved {
                tab_id,
                window_id,
                is_window_closing,
                active_tab_id,
            } => self.on_tab_removed(tab_id, window_id, is_window_closing, active_tab_id),
            BrowserEvent::TabActivated { tab_id, .. } => self.on_tab_activated(tab_id),
            BrowserEvent::TabAttached {
                tab_id,
                new_window_id,
            } => self.on_tab_attached(tab_id, new_window_id),
            BrowserEvent::WindowCreated { window, tabs } => self.on_window_created(window, tabs),
            BrowserEvent::WindowRemoved { window_id } => self.on_window_removed(window_id),
            BrowserEvent::WindowFocusChanged { window_id } => {
                debug!(window_id, "window focus changed");
                Ok(Vec::new())
            }
            BrowserEvent::Command { name } => self.on_command(&name),
            BrowserEvent::Message { kind } => self.on_message(&kind),
        }
    }

    fn on_startup(&mut self) -> Result<Vec<HostCommand>> {
        info!("browser startup — marking new session");
        self.flags
            .update(SettingKey::NewSession, Some(SettingValue::Bool(true)))?;
        self.badge()
    }

    /// Cold-start population: only when nothing is tracked yet, seed the
    /// live collections from the enumeration snapshot.
    fn on_installed(
        &mut self,
        windows: Vec<tabsentry_core::types::Window>,
        tabs: Vec<tabsentry_core::types::Tab>,
    ) -> Result<Vec<HostCommand>> {
        if self.registry.tabs_len()? == 0 && self.registry.all_windows()?.is_empty() {
            info!(
                windows = windows.len(),
                tabs = tabs.len(),
                "cold start: seeding live collections"
            );
            for window in windows {
                self.registry.add_window(window)?;
            }
            for tab in tabs {
                self.registry.add_tab(
                    tab,
                    TabOverrides {
                        last_visited: Some(None),
                        ..Default::default()
                    },
                )?;
            }
        }
        self.badge()
    }

    fn on_tab_created(&mut self, tab: tabsentry_core::types::Tab) -> Result<Vec<HostCommand>> {
        if let Some(created_at) = self.window_created_at {
            if created_at.elapsed() < self.restore_suppress {
                debug!(
                    tab_id = tab.id,
                    "tab created within restore window — owned by session matcher"
                );
                return Ok(Vec::new());
            }
        }
        self.registry.add_tab(
            tab,
            TabOverrides {
                last_visited: Some(None),
                ..Default::default()
            },
        )?;
        self.badge()
    }

    fn on_tab_updated(
        &mut self,
        tab_id: i64,
        change: TabChange,
        tab: tabsentry_core::types::Tab,
    ) -> Result<Vec<HostCommand>> {
        let Some(stored) = self.registry.get_tab(tab_id)? else {
            return Ok(Vec::new());
        };

        if let Some(title) = change.title {
            self.registry.update_tab(
                tab_id,
                TabPatch {
                    title: Some(title),
                    ..Default::default()
                },
            )?;
        } else if let Some(favicon_url) = change.favicon_url {
            self.registry.update_tab(
                tab_id,
                TabPatch {
                    favicon_url: Some(Some(favicon_url)),
                    ..Default::default()
                },
            )?;
        } else if let Some(url) = change.url {
            // Navigating away from a tracked page closes it logically: the
            // old URL goes to the archive before the live record moves on.
            if !stored.url.is_empty() && !stored.is_internal() && stored.url != url {
                let mut archived = stored.clone();
                archived.last_visited = Some(now_ms());
                self.registry
                    .add_tab_to_closed_tabs(&archived, CloseReason::UrlChange)?;
            }
            self.registry.update_tab(
                tab_id,
                TabPatch {
                    url: Some(url),
                    ..Default::default()
                },
            )?;
        } else if change.status.as_deref() == Some("complete") {
            // Load finished: diff the full tab against what we hold.
            let mut patch = TabPatch::default();
            if tab.url != stored.url {
                patch.url = Some(tab.url);
            }
            if tab.title != stored.title {
                patch.title = Some(tab.title);
            }
            if tab.favicon_url != stored.favicon_url {
                patch.favicon_url = Some(tab.favicon_url);
            }
            if !patch.is_empty() {
                self.registry.update_tab(tab_id, patch)?;
            }
        }
        Ok(Vec::new())
    }

    fn on_tab_removed(
        &mut self,
        tab_id: i64,
        window_id: i64,
        is_window_closing: bool,
        active_tab_id: Option<i64>,
    ) -> Result<Vec<HostCommand>> {
        if is_window_closing {
            self.closed_window_tabs
                .entry(window_id)
                .or_default()
                .push(tab_id);
            return Ok(Vec::new());
        }

        self.registry.remove_tab(tab_id)?;
        // Keep alternate-tab accurate: the tab the user lands on counts as
        // visited now.
        if let Some(active) = active_tab_id {
            self.registry.update_tab(
                active,
                TabPatch {
                    last_visited: Some(now_ms()),
                    ..Default::default()
                },
            )?;
        }
        self.badge()
    }

    fn on_tab_activated(&mut self, tab_id: i64) -> Result<Vec<HostCommand>> {
        self.registry.update_tab(
            tab_id,
            TabPatch {
                last_visited: Some(now_ms()),
                ..Default::default()
            },
        )?;
        Ok(Vec::new())
    }

    fn on_tab_attached(&mut self, tab_id: i64, new_window_id: i64) -> Result<Vec<HostCommand>> {
        self.registry.update_tab(
            tab_id,
            TabPatch {
                window_id: Some(new_window_id),
                ..Default::default()
            },
        )?;
        Ok(Vec::new())
    }

    fn on_window_created(
        &mut self,
        window: tabsentry_core::types::Window,
        tabs: Vec<tabsentry_core::types::Tab>,
    ) -> Result<Vec<HostCommand>> {
        self.window_created_at = Some(Instant::now());
        let outcome = self.matcher.handle_window_created(&window, &tabs)?;
        debug!(window_id = window.window_id, ?outcome, "window identified");
        self.badge()
    }

    fn on_window_removed(&mut self, window_id: i64) -> Result<Vec<HostCommand>> {
        // The buffered removals belong to this window's teardown; drop them.
        if let Some(buffered) = self.closed_window_tabs.remove(&window_id) {
            debug!(
                window_id,
                buffered = buffered.len(),
                "window closed, clearing buffered tab removals"
            );
        }
        Ok(Vec::new())
    }

    fn on_command(&mut self, name: &str) -> Result<Vec<HostCommand>> {
        match name {
            "alternate-tab" => match self.registry.get_last_tab()? {
                Some(tab) => Ok(vec![
                    HostCommand::FocusWindow {
                        window_id: tab.window_id,
                    },
                    HostCommand::ActivateTab { tab_id: tab.id },
                ]),
                None => {
                    info!("alternate-tab: no previous tab");
                    Ok(Vec::new())
                }
            },
            other => {
                warn!(command = other, "unknown command");
                Ok(Vec::new())
            }
        }
    }

    fn on_message(&mut self, kind: &str) -> Result<Vec<HostCommand>> {
        match kind {
            "open-home" => Ok(vec![HostCommand::OpenPage {
                page: "home.html".into(),
            }]),
            other => {
                debug!(message = other, "ignoring message");
                Ok(Vec::new())
            }
        }
    }

    fn badge(&self) -> Result<Vec<HostCommand>> {
        if !self.badge_updates {
            return Ok(Vec::new());
        }
        Ok(vec![HostCommand::SetBadge {
            text: self.registry.tabs_len()?.to_string(),
        }])
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tabsentry_core::types::{Tab, Window};
    use tabsentry_store::Store;

    fn router() -> EventRouter {
        let store = Arc::new(Store::new(Connection::open_in_memory().unwrap()).unwrap());
        let registry = Arc::new(TabRegistry::new(Arc::clone(&store)));
        let flags = SystemFlags::new(Arc::clone(&store));
        let matcher = SessionMatcher::new(store, Arc::clone(&registry), flags.clone());
        EventRouter::new(registry, flags, matcher, &BridgeConfig::default())
    }

    fn tab(id: i64, url: &str) -> Tab {
        Tab {
            id,
            index: 0,
            window_id: 1,
            url: url.into(),
            title: format!("tab {id}"),
            favicon_url: None,
            last_visited: None,
        }
    }

    #[test]
    fn tab_created_tracks_and_updates_badge() {
        let mut router = router();
        let commands = router
            .dispatch(BrowserEvent::TabCreated {
                tab: tab(1, "https://a.com"),
            })
            .unwrap();
        assert_eq!(commands, vec![HostCommand::SetBadge { text: "1".into() }]);
        assert!(router.registry.get_tab(1).unwrap().is_some());
    }

    #[test]
    fn tab_created_right_after_window_is_suppressed() {
        let mut router = router();
        router.window_created_at = Some(Instant::now());
        let commands = router
            .dispatch(BrowserEvent::TabCreated {
                tab: tab(1, "https://a.com"),
            })
            .unwrap();
        assert!(commands.is_empty());
        assert!(router.registry.get_tab(1).unwrap().is_none());
    }

    #[test]
    fn url_change_archives_old_page_first() {
        let mut router = router();
        router
            .dispatch(BrowserEvent::TabCreated {
                tab: tab(1, "https://old.com"),
            })
            .unwrap();
        router
            .dispatch(BrowserEvent::TabUpdated {
                tab_id: 1,
                change: TabChange {
                    url: Some("https://new.com".into()),
                    ..Default::default()
                },
                tab: tab(1, "https://new.com"),
            })
            .unwrap();

        let closed = router.registry.all_closed_tabs().unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].url, "https://old.com");
        assert_eq!(closed[0].reason, CloseReason::UrlChange);
        assert!(closed[0].last_visited.is_some());
        assert_eq!(
            router.registry.get_tab(1).unwrap().unwrap().url,
            "https://new.com"
        );
    }

    #[test]
    fn window_closing_removals_are_buffered_not_archived() {
        let mut router = router();
        router
            .dispatch(BrowserEvent::TabCreated {
                tab: tab(1, "https://a.com"),
            })
            .unwrap();
        let commands = router
            .dispatch(BrowserEvent::TabRemoved {
                tab_id: 1,
                window_id: 1,
                is_window_closing: true,
                active_tab_id: None,
            })
            .unwrap();
        assert!(commands.is_empty());
        // Tab survives; nothing archived.
        assert!(router.registry.get_tab(1).unwrap().is_some());
        assert!(router.registry.all_closed_tabs().unwrap().is_empty());

        router
            .dispatch(BrowserEvent::WindowRemoved { window_id: 1 })
            .unwrap();
        assert!(router.closed_window_tabs.is_empty());
    }

    #[test]
    fn removal_bumps_remaining_active_tab() {
        let mut router = router();
        for id in [1, 2] {
            router
                .dispatch(BrowserEvent::TabCreated {
                    tab: tab(id, "https://a.com"),
                })
                .unwrap();
        }
        router
            .dispatch(BrowserEvent::TabRemoved {
                tab_id: 1,
                window_id: 1,
                is_window_closing: false,
                active_tab_id: Some(2),
            })
            .unwrap();
        assert!(router.registry.get_tab(1).unwrap().is_none());
        assert!(router
            .registry
            .get_tab(2)
            .unwrap()
            .unwrap()
            .last_visited
            .is_some());
    }

    #[test]
    fn alternate_tab_focuses_second_most_recent() {
        let mut router = router();
        for (id, visited) in [(1, 100), (2, 300), (3, 200)] {
            let mut t = tab(id, "https://a.com");
            t.last_visited = Some(visited);
            router
                .registry
                .add_tab(t, TabOverrides::default())
                .unwrap();
        }
        let commands = router
            .dispatch(BrowserEvent::Command {
                name: "alternate-tab".into(),
            })
            .unwrap();
        assert_eq!(
            commands,
            vec![
                HostCommand::FocusWindow { window_id: 1 },
                HostCommand::ActivateTab { tab_id: 3 },
            ]
        );
    }

    #[test]
    fn startup_sets_new_session_flag() {
        let mut router = router();
        router.dispatch(BrowserEvent::Startup).unwrap();
        assert!(router.flags.is_set(SettingKey::NewSession).unwrap());
    }

    #[test]
    fn installed_seeds_only_empty_state() {
        let mut router = router();
        let snapshot_tabs = vec![tab(1, "https://a.com"), tab(2, "https://b.com")];
        let windows = vec![Window {
            window_id: 1,
            title: None,
            session_id: None,
        }];
        router
            .dispatch(BrowserEvent::Installed {
                windows: windows.clone(),
                tabs: snapshot_tabs.clone(),
            })
            .unwrap();
        assert_eq!(router.registry.tabs_len().unwrap(), 2);

        // A second install event must not duplicate or reset anything.
        router.registry.discard_tab(2).unwrap();
        router
            .dispatch(BrowserEvent::Installed {
                windows,
                tabs: snapshot_tabs,
            })
            .unwrap();
        assert_eq!(router.registry.tabs_len().unwrap(), 1);
    }
}
