//! Wire types for the stdio bridge.
//!
//! The extension side pushes one JSON object per line on stdin; the bridge
//! answers with host commands, one JSON object per line on stdout. The pipe
//! is one-way in each direction, so event payloads carry whatever snapshot
//! data a handler needs (a created window arrives with its tabs, a removal
//! with the currently active tab id) instead of querying back.

use serde::{Deserialize, Serialize};

use tabsentry_core::types::{Tab, Window};

/// Inbound browser lifecycle event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BrowserEvent {
    /// The browser started — a new session begins.
    Startup,
    /// The extension was (re)installed; carries a point-in-time enumeration
    /// of open windows and tabs for cold-start population.
    Installed {
        #[serde(default)]
        windows: Vec<Window>,
        #[serde(default)]
        tabs: Vec<Tab>,
    },
    TabCreated {
        tab: Tab,
    },
    TabUpdated {
        tab_id: i64,
        change: TabChange,
        tab: Tab,
    },
    TabRemoved {
        tab_id: i64,
        window_id: i64,
        #[serde(default)]
        is_window_closing: bool,
        /// The tab left active after the close, if any.
        #[serde(default)]
        active_tab_id: Option<i64>,
    },
    TabActivated {
        tab_id: i64,
        window_id: i64,
    },
    TabAttached {
        tab_id: i64,
        new_window_id: i64,
    },
    /// Fires after the window's initial tabs exist; they ride along.
    WindowCreated {
        window: Window,
        #[serde(default)]
        tabs: Vec<Tab>,
    },
    WindowRemoved {
        window_id: i64,
    },
    WindowFocusChanged {
        window_id: i64,
    },
    Command {
        name: String,
    },
    Message {
        kind: String,
    },
}

/// The changed-fields payload of a tab-updated event.
///
/// Update events fire repeatedly per tab, each carrying a different subset;
/// the sequence is not linear and `status: "complete"` does not mean every
/// property has settled. Handlers route on individual fields, in order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChange {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Outbound host command — fire-and-forget side effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum HostCommand {
    /// Show the live tab count on the extension badge.
    SetBadge { text: String },
    /// Bring a window to the front.
    FocusWindow { window_id: i64 },
    /// Mark a tab active within its window.
    ActivateTab { tab_id: i64 },
    /// Open an extension page in a new tab.
    OpenPage { page: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_event_decodes() {
        let ev: BrowserEvent = serde_json::from_str(r#"{"type":"startup"}"#).unwrap();
        assert!(matches!(ev, BrowserEvent::Startup));
    }

    #[test]
    fn tab_created_decodes_nested_tab() {
        let json = r#"{"type":"tab-created","tab":{"id":3,"windowId":1,"url":"https://a.com"}}"#;
        let ev: BrowserEvent = serde_json::from_str(json).unwrap();
        match ev {
            BrowserEvent::TabCreated { tab } => {
                assert_eq!(tab.id, 3);
                assert_eq!(tab.window_id, 1);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn tab_removed_defaults_optional_fields() {
        let json = r#"{"type":"tab-removed","tabId":3,"windowId":1}"#;
        let ev: BrowserEvent = serde_json::from_str(json).unwrap();
        match ev {
            BrowserEvent::TabRemoved {
                tab_id,
                is_window_closing,
                active_tab_id,
                ..
            } => {
                assert_eq!(tab_id, 3);
                assert!(!is_window_closing);
                assert_eq!(active_tab_id, None);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn window_created_carries_tabs() {
        let json = r#"{"type":"window-created",
            "window":{"windowId":4},
            "tabs":[{"id":1,"windowId":4,"url":"https://a.com"}]}"#;
        let ev: BrowserEvent = serde_json::from_str(json).unwrap();
        match ev {
            BrowserEvent::WindowCreated { window, tabs } => {
                assert_eq!(window.window_id, 4);
                assert_eq!(tabs.len(), 1);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn change_payload_routes_on_individual_fields() {
        let json = r#"{"type":"tab-updated","tabId":3,
            "change":{"faviconUrl":"https://a.com/i.png"},
            "tab":{"id":3,"windowId":1,"url":"https://a.com"}}"#;
        let ev: BrowserEvent = serde_json::from_str(json).unwrap();
        match ev {
            BrowserEvent::TabUpdated { change, .. } => {
                assert_eq!(change.favicon_url.as_deref(), Some("https://a.com/i.png"));
                assert_eq!(change.title, None);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn host_commands_serialize_kebab_case() {
        let cmd = HostCommand::SetBadge { text: "12".into() };
        assert_eq!(
            serde_json::to_string(&cmd).unwrap(),
            r#"{"type":"set-badge","text":"12"}"#
        );
        let cmd = HostCommand::FocusWindow { window_id: 7 };
        assert_eq!(
            serde_json::to_string(&cmd).unwrap(),
            r#"{"type":"focus-window","windowId":7}"#
        );
    }
}
