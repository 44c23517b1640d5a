use serde::{Deserialize, Serialize};

/// URLs containing this marker are internal browser pages and are never
/// archived to closed tabs.
pub const INTERNAL_URL_MARKER: &str = "chrome://";

/// A live browser tab as tracked in the store.
///
/// Field names follow the browser's wire shape (camelCase) so tabs can be
/// decoded straight out of lifecycle event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    /// Browser-assigned id, unique among live tabs.
    pub id: i64,
    /// Position within the owning window.
    #[serde(default)]
    pub index: i64,
    pub window_id: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub favicon_url: Option<String>,
    /// Epoch milliseconds of the last activation, `None` until first visited.
    #[serde(default)]
    pub last_visited: Option<i64>,
}

impl Tab {
    /// Internal browser pages (new-tab, settings, ...) are exempt from the
    /// closed-tabs archive.
    pub fn is_internal(&self) -> bool {
        self.url.contains(INTERNAL_URL_MARKER)
    }
}

/// Explicit partial overrides merged onto a tab at insertion time.
///
/// Replaces the original's `{...tab, ...overrides}` spread with named,
/// compile-time-checked fields.
#[derive(Debug, Clone, Default)]
pub struct TabOverrides {
    /// Re-home the tab to a different window.
    pub window_id: Option<i64>,
    /// `Some(None)` resets the timestamp, `Some(Some(ms))` sets it.
    pub last_visited: Option<Option<i64>>,
}

impl TabOverrides {
    pub fn apply(&self, tab: &mut Tab) {
        if let Some(window_id) = self.window_id {
            tab.window_id = window_id;
        }
        if let Some(last_visited) = self.last_visited {
            tab.last_visited = last_visited;
        }
    }
}

/// The union of fields a tab update may touch.
///
/// Unknown fields cannot exist by construction, unlike the original's
/// duck-typed `for key in patch` loop.
#[derive(Debug, Clone, Default)]
pub struct TabPatch {
    pub index: Option<i64>,
    pub window_id: Option<i64>,
    pub url: Option<String>,
    pub title: Option<String>,
    /// `Some(None)` clears the favicon.
    pub favicon_url: Option<Option<String>>,
    pub last_visited: Option<i64>,
}

impl TabPatch {
    pub fn apply(&self, tab: &mut Tab) {
        if let Some(index) = self.index {
            tab.index = index;
        }
        if let Some(window_id) = self.window_id {
            tab.window_id = window_id;
        }
        if let Some(ref url) = self.url {
            tab.url = url.clone();
        }
        if let Some(ref title) = self.title {
            tab.title = title.clone();
        }
        if let Some(ref favicon_url) = self.favicon_url {
            tab.favicon_url = favicon_url.clone();
        }
        if let Some(last_visited) = self.last_visited {
            tab.last_visited = Some(last_visited);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none()
            && self.window_id.is_none()
            && self.url.is_none()
            && self.title.is_none()
            && self.favicon_url.is_none()
            && self.last_visited.is_none()
    }
}

/// A live browser window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub window_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Fields a window update may touch.
#[derive(Debug, Clone, Default)]
pub struct WindowPatch {
    pub title: Option<String>,
    pub session_id: Option<String>,
}

impl WindowPatch {
    pub fn apply(&self, window: &mut Window) {
        if let Some(ref title) = self.title {
            window.title = Some(title.clone());
        }
        if let Some(ref session_id) = self.session_id {
            window.session_id = Some(session_id.clone());
        }
    }
}

/// Why a tab landed in the closed-tabs archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseReason {
    /// The user closed the tab.
    Manual,
    /// The tab navigated away from the archived URL.
    UrlChange,
    /// The tab was reconstructed during session restore.
    SessionRestore,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::UrlChange => write!(f, "url-change"),
            Self::SessionRestore => write!(f, "session-restore"),
        }
    }
}

impl std::str::FromStr for CloseReason {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "url-change" => Ok(Self::UrlChange),
            "session-restore" => Ok(Self::SessionRestore),
            other => Err(format!("unknown close reason: {other}")),
        }
    }
}

/// Append-only archive entry derived from a removed (or navigated-away) tab.
///
/// Keyed by its own auto-increment `index`; `tab_id` is the originating
/// browser tab id and may repeat across entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedTab {
    pub index: i64,
    pub tab_id: i64,
    pub window_id: i64,
    pub url: String,
    pub title: String,
    pub favicon_url: Option<String>,
    pub last_visited: Option<i64>,
    pub reason: CloseReason,
}

/// Snapshot of a window and its tabs taken when a new browser session begins.
///
/// `tabs_length` is fixed at creation time and serves as the join key for
/// candidate lookup during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSession {
    pub index: i64,
    /// The historic window id — the live window it reconciles to gets a new one.
    pub window_id: i64,
    pub title: Option<String>,
    pub tabs: Vec<Tab>,
    pub tabs_length: i64,
}

/// A consumed or expired `LastSession`, kept purely for history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldSession {
    pub index: i64,
    pub window_id: i64,
    pub title: Option<String>,
    pub tabs: Vec<Tab>,
    pub tabs_length: i64,
    /// Archival date label (RFC3339 UTC).
    pub name: String,
}

/// The process-wide settings map keys. Stored under their `as_str` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    GroupByWindow,
    FilterByLlms,
    HistoryView,
    NewSession,
    StartupComplete,
    DetailedRows,
    AlwaysShowClosedTabs,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GroupByWindow => "groupByWindow",
            Self::FilterByLlms => "filterByLLMs",
            Self::HistoryView => "historyView",
            Self::NewSession => "newSession",
            Self::StartupComplete => "startupComplete",
            Self::DetailedRows => "detailedRows",
            Self::AlwaysShowClosedTabs => "alwaysShowClosedTabs",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettingKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "groupByWindow" => Ok(Self::GroupByWindow),
            "filterByLLMs" => Ok(Self::FilterByLlms),
            "historyView" => Ok(Self::HistoryView),
            "newSession" => Ok(Self::NewSession),
            "startupComplete" => Ok(Self::StartupComplete),
            "detailedRows" => Ok(Self::DetailedRows),
            "alwaysShowClosedTabs" => Ok(Self::AlwaysShowClosedTabs),
            other => Err(format!("unknown setting key: {other}")),
        }
    }
}

/// A stored setting value — booleans for toggles, strings for view modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

impl SettingValue {
    /// Truthiness used by toggle semantics: absent/false/"" are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// Logical negation — toggling always yields a boolean.
    pub fn negated(&self) -> SettingValue {
        SettingValue::Bool(!self.truthy())
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
