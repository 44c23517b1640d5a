use rusqlite::{Connection, Result};

/// Schema version — bump whenever a collection or index is added.
/// Stored via `PRAGMA user_version` so upgrades can be detected.
pub const SCHEMA_VERSION: i64 = 1;

/// Initialise all collections. Safe to call on every startup (idempotent):
/// `IF NOT EXISTS` throughout, never destructive to existing data.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_tabs_table(conn)?;
    create_windows_table(conn)?;
    create_closed_tabs_table(conn)?;
    create_last_sessions_table(conn)?;
    create_old_sessions_table(conn)?;
    create_settings_table(conn)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

fn create_tabs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tabs (
            id           INTEGER PRIMARY KEY,
            position     INTEGER NOT NULL DEFAULT 0,
            window_id    INTEGER NOT NULL,
            url          TEXT NOT NULL,
            title        TEXT NOT NULL DEFAULT '',
            favicon_url  TEXT,
            last_visited INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_tabs_window
            ON tabs(window_id, position);
        CREATE INDEX IF NOT EXISTS idx_tabs_last_visited
            ON tabs(last_visited DESC);",
    )
}

fn create_windows_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS windows (
            window_id  INTEGER PRIMARY KEY,
            title      TEXT,
            session_id TEXT
        );",
    )
}

/// Append-only archive. `idx` is the record's own key — the originating
/// browser tab id repeats across entries for reopened URLs.
fn create_closed_tabs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS closed_tabs (
            idx          INTEGER PRIMARY KEY AUTOINCREMENT,
            tab_id       INTEGER NOT NULL,
            window_id    INTEGER NOT NULL,
            url          TEXT NOT NULL,
            title        TEXT NOT NULL DEFAULT '',
            favicon_url  TEXT,
            last_visited INTEGER,
            reason       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_closed_tabs_tab
            ON closed_tabs(tab_id);",
    )
}

/// Drained window snapshots awaiting reconciliation. The embedded tab list
/// is stored as JSON — this is an object store, not a relational split.
/// `tabs_length` is the exact-length join key for candidate lookup.
fn create_last_sessions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS last_sessions (
            idx         INTEGER PRIMARY KEY AUTOINCREMENT,
            window_id   INTEGER NOT NULL,
            title       TEXT,
            tabs        TEXT NOT NULL,
            tabs_length INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_last_sessions_length
            ON last_sessions(tabs_length);",
    )
}

fn create_old_sessions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS old_sessions (
            idx         INTEGER PRIMARY KEY AUTOINCREMENT,
            window_id   INTEGER NOT NULL,
            title       TEXT,
            tabs        TEXT NOT NULL,
            tabs_length INTEGER NOT NULL,
            name        TEXT NOT NULL
        );",
    )
}

fn create_settings_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS system_settings (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}
