use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing::{error, info, warn};

mod protocol;
mod router;

use protocol::BrowserEvent;
use router::EventRouter;
use tabsentry_core::TabsentryConfig;
use tabsentry_registry::{SystemFlags, TabRegistry};
use tabsentry_sessions::SessionMatcher;
use tabsentry_store::Store;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // stdout is the command channel — everything human-readable goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabsentry_bridge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // TabsentryConfig::load resolves TABSENTRY_CONFIG when no path is given.
    let config = TabsentryConfig::load(None).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        TabsentryConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    // Store::new runs the idempotent schema upgrade.
    let store = Arc::new(Store::new(conn)?);
    let registry = Arc::new(TabRegistry::new(Arc::clone(&store)));
    let flags = SystemFlags::new(Arc::clone(&store));
    let matcher = SessionMatcher::new(Arc::clone(&store), Arc::clone(&registry), flags.clone());
    let mut router = EventRouter::new(registry, flags, matcher, &config.bridge);

    info!("bridge ready, reading events from stdin");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: BrowserEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "undecodable event line, skipping");
                continue;
            }
        };

        // A failing handler surfaces as a stale badge, never a dead bridge.
        match router.dispatch(event) {
            Ok(commands) => {
                for command in commands {
                    let mut json = serde_json::to_vec(&command)?;
                    json.push(b'\n');
                    stdout.write_all(&json).await?;
                }
                stdout.flush().await?;
            }
            Err(e) => error!(error = %e, "event handler failed"),
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(error = %e, "could not create database directory");
        }
    }
}
