use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use tabsentry_core::types::{
    CloseReason, ClosedTab, LastSession, OldSession, SettingKey, SettingValue, Tab, Window,
};

use crate::db::init_db;
use crate::error::{Result, StoreError};

/// Transactional object store over a single SQLite database.
///
/// Wraps the connection in a `Mutex`; every mutation runs inside its own
/// transaction so a failure rolls back rather than leaving a partial write.
/// Reads are single statements and need no explicit transaction.
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Wrap a connection, running the idempotent schema upgrade first.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /*
     * TABS
     */

    /// Insert or overwrite a tab (last-write-wins on `id`).
    pub fn put_tab(&self, tab: &Tab) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO tabs
             (id, position, window_id, url, title, favicon_url, last_visited)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                tab.id,
                tab.index,
                tab.window_id,
                tab.url,
                tab.title,
                tab.favicon_url,
                tab.last_visited,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_tab(&self, tab_id: i64) -> Result<Option<Tab>> {
        let db = self.db.lock().unwrap();
        let tab = db
            .query_row(
                "SELECT id, position, window_id, url, title, favicon_url, last_visited
                 FROM tabs WHERE id = ?1",
                rusqlite::params![tab_id],
                row_to_tab,
            )
            .optional()?;
        Ok(tab)
    }

    pub fn all_tabs(&self) -> Result<Vec<Tab>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, position, window_id, url, title, favicon_url, last_visited FROM tabs",
        )?;
        let rows = stmt.query_map([], row_to_tab)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// All tabs of one window, ordered by their position within it.
    pub fn tabs_by_window(&self, window_id: i64) -> Result<Vec<Tab>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, position, window_id, url, title, favicon_url, last_visited
             FROM tabs WHERE window_id = ?1
             ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![window_id], row_to_tab)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// Most-recently-visited tabs, newest first. Tabs that were never
    /// activated carry no timestamp and are excluded — mirrors the original
    /// index cursor, which skips unset keys.
    pub fn most_recent_tabs(&self, limit: usize) -> Result<Vec<Tab>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, position, window_id, url, title, favicon_url, last_visited
             FROM tabs WHERE last_visited IS NOT NULL
             ORDER BY last_visited DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_tab)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    pub fn count_tabs(&self) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n: i64 = db.query_row("SELECT COUNT(*) FROM tabs", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Delete a tab, returning the removed record (`None` if absent).
    pub fn delete_tab(&self, tab_id: i64) -> Result<Option<Tab>> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let tab = tx
            .query_row(
                "SELECT id, position, window_id, url, title, favicon_url, last_visited
                 FROM tabs WHERE id = ?1",
                rusqlite::params![tab_id],
                row_to_tab,
            )
            .optional()?;
        if tab.is_some() {
            tx.execute("DELETE FROM tabs WHERE id = ?1", rusqlite::params![tab_id])?;
        }
        tx.commit()?;
        Ok(tab)
    }

    pub fn clear_tabs(&self) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute("DELETE FROM tabs", [])?;
        tx.commit()?;
        Ok(())
    }

    /*
     * WINDOWS
     */

    pub fn put_window(&self, window: &Window) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO windows (window_id, title, session_id)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![window.window_id, window.title, window.session_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_window(&self, window_id: i64) -> Result<Option<Window>> {
        let db = self.db.lock().unwrap();
        let window = db
            .query_row(
                "SELECT window_id, title, session_id FROM windows WHERE window_id = ?1",
                rusqlite::params![window_id],
                row_to_window,
            )
            .optional()?;
        Ok(window)
    }

    pub fn all_windows(&self) -> Result<Vec<Window>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT window_id, title, session_id FROM windows")?;
        let rows = stmt.query_map([], row_to_window)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    pub fn delete_window(&self, window_id: i64) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "DELETE FROM windows WHERE window_id = ?1",
            rusqlite::params![window_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn clear_windows(&self) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute("DELETE FROM windows", [])?;
        tx.commit()?;
        Ok(())
    }

    /*
     * CLOSED TABS
     */

    /// Archive a tab. Returns the new entry's auto-increment key.
    pub fn append_closed_tab(&self, tab: &Tab, reason: CloseReason) -> Result<i64> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO closed_tabs
             (tab_id, window_id, url, title, favicon_url, last_visited, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                tab.id,
                tab.window_id,
                tab.url,
                tab.title,
                tab.favicon_url,
                tab.last_visited,
                reason.to_string(),
            ],
        )?;
        let idx = tx.last_insert_rowid();
        tx.commit()?;
        debug!(tab_id = tab.id, idx, %reason, "tab archived");
        Ok(idx)
    }

    pub fn all_closed_tabs(&self) -> Result<Vec<ClosedTab>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT idx, tab_id, window_id, url, title, favicon_url, last_visited, reason
             FROM closed_tabs ORDER BY idx ASC",
        )?;
        let rows = stmt.query_map([], row_to_closed_tab)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// All archive entries retaining a given originating tab id.
    pub fn closed_tabs_by_tab_id(&self, tab_id: i64) -> Result<Vec<ClosedTab>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT idx, tab_id, window_id, url, title, favicon_url, last_visited, reason
             FROM closed_tabs WHERE tab_id = ?1 ORDER BY idx ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![tab_id], row_to_closed_tab)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    pub fn delete_closed_tab(&self, idx: i64) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let changed = tx.execute(
            "DELETE FROM closed_tabs WHERE idx = ?1",
            rusqlite::params![idx],
        )?;
        tx.commit()?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                collection: "closed_tabs",
                key: idx,
            });
        }
        Ok(())
    }

    /*
     * LAST SESSIONS
     */

    /// Snapshot a window and its tabs. `tabs_length` is fixed here and never
    /// revised. Returns the new record's auto-increment key.
    pub fn append_last_session(
        &self,
        window_id: i64,
        title: Option<&str>,
        tabs: &[Tab],
    ) -> Result<i64> {
        let tabs_json = serde_json::to_string(tabs)?;
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO last_sessions (window_id, title, tabs, tabs_length)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![window_id, title, tabs_json, tabs.len() as i64],
        )?;
        let idx = tx.last_insert_rowid();
        tx.commit()?;
        debug!(window_id, idx, tabs = tabs.len(), "last session recorded");
        Ok(idx)
    }

    pub fn all_last_sessions(&self) -> Result<Vec<LastSession>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT idx, window_id, title, tabs, tabs_length
             FROM last_sessions ORDER BY idx ASC",
        )?;
        let rows = stmt.query_map([], row_to_session_parts)?;
        collect_last_sessions(rows)
    }

    /// Candidate lookup for reconciliation: exact tab-count match only,
    /// ordered by `idx` ascending (lower = drained earlier) so evaluation
    /// order is deterministic.
    pub fn last_sessions_by_tabs_length(&self, tabs_length: i64) -> Result<Vec<LastSession>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT idx, window_id, title, tabs, tabs_length
             FROM last_sessions WHERE tabs_length = ?1
             ORDER BY idx ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![tabs_length], row_to_session_parts)?;
        collect_last_sessions(rows)
    }

    pub fn delete_last_session(&self, idx: i64) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let changed = tx.execute(
            "DELETE FROM last_sessions WHERE idx = ?1",
            rusqlite::params![idx],
        )?;
        tx.commit()?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                collection: "last_sessions",
                key: idx,
            });
        }
        Ok(())
    }

    /*
     * OLD SESSIONS
     */

    /// Demote a last session into the history archive under a date label.
    pub fn append_old_session(&self, session: &LastSession, name: &str) -> Result<i64> {
        let tabs_json = serde_json::to_string(&session.tabs)?;
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO old_sessions (window_id, title, tabs, tabs_length, name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                session.window_id,
                session.title,
                tabs_json,
                session.tabs_length,
                name,
            ],
        )?;
        let idx = tx.last_insert_rowid();
        tx.commit()?;
        Ok(idx)
    }

    pub fn all_old_sessions(&self) -> Result<Vec<OldSession>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT idx, window_id, title, tabs, tabs_length, name
             FROM old_sessions ORDER BY idx ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (idx, window_id, title, tabs_json, tabs_length, name) = row?;
            sessions.push(OldSession {
                index: idx,
                window_id,
                title,
                tabs: serde_json::from_str(&tabs_json)?,
                tabs_length,
                name,
            });
        }
        Ok(sessions)
    }

    /*
     * SYSTEM SETTINGS
     */

    pub fn get_setting(&self, key: SettingKey) -> Result<Option<SettingValue>> {
        let db = self.db.lock().unwrap();
        let raw: Option<String> = db
            .query_row(
                "SELECT value FROM system_settings WHERE key = ?1",
                rusqlite::params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn put_setting(&self, key: SettingKey, value: &SettingValue) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO system_settings (key, value) VALUES (?1, ?2)",
            rusqlite::params![key.as_str(), json],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/*
 * ROW MAPPERS
 */

fn row_to_tab(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tab> {
    Ok(Tab {
        id: row.get(0)?,
        index: row.get(1)?,
        window_id: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        favicon_url: row.get(5)?,
        last_visited: row.get(6)?,
    })
}

fn row_to_window(row: &rusqlite::Row<'_>) -> rusqlite::Result<Window> {
    Ok(Window {
        window_id: row.get(0)?,
        title: row.get(1)?,
        session_id: row.get(2)?,
    })
}

fn row_to_closed_tab(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClosedTab> {
    let reason_str: String = row.get(7)?;
    Ok(ClosedTab {
        index: row.get(0)?,
        tab_id: row.get(1)?,
        window_id: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        favicon_url: row.get(5)?,
        last_visited: row.get(6)?,
        reason: CloseReason::from_str(&reason_str).unwrap_or(CloseReason::Manual),
    })
}

type SessionParts = (i64, i64, Option<String>, String, i64);

fn row_to_session_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn collect_last_sessions(
    rows: impl Iterator<Item = rusqlite::Result<SessionParts>>,
) -> Result<Vec<LastSession>> {
    let mut sessions = Vec::new();
    for row in rows {
        let (idx, window_id, title, tabs_json, tabs_length) = row?;
        sessions.push(LastSession {
            index: idx,
            window_id,
            title,
            tabs: serde_json::from_str(&tabs_json)?,
            tabs_length,
        });
    }
    Ok(sessions)
}
