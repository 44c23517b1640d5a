use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Tab-created events arriving within this many milliseconds of a
/// window-created event are treated as session-restore population.
pub const DEFAULT_RESTORE_SUPPRESS_MS: u64 = 100;

/// Top-level config (tabsentry.toml + TABSENTRY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabsentryConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Default for TabsentryConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Stdio bridge behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Emit a set-badge host command whenever the live tab count changes.
    #[serde(default = "bool_true")]
    pub badge_updates: bool,
    /// Restored-tab suppression window in milliseconds.
    #[serde(default = "default_restore_suppress_ms")]
    pub restore_suppress_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            badge_updates: true,
            restore_suppress_ms: DEFAULT_RESTORE_SUPPRESS_MS,
        }
    }
}

fn bool_true() -> bool {
    true
}

fn default_restore_suppress_ms() -> u64 {
    DEFAULT_RESTORE_SUPPRESS_MS
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tabsentry/tabsentry.db", home)
}

impl TabsentryConfig {
    /// Load config from a TOML file with TABSENTRY_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. TABSENTRY_CONFIG env var
    ///   3. ~/.tabsentry/tabsentry.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: TabsentryConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TABSENTRY_").split("_"))
            .extract()
            .map_err(|e| crate::error::TabsentryError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    if let Ok(path) = std::env::var("TABSENTRY_CONFIG") {
        return path;
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tabsentry/tabsentry.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = TabsentryConfig::default();
        assert!(config.database.path.ends_with("tabsentry.db"));
        assert!(config.bridge.badge_updates);
        assert_eq!(config.bridge.restore_suppress_ms, 100);
    }

    #[test]
    fn explicit_path_overrides_env_lookup() {
        let path = std::env::temp_dir().join("tabsentry-explicit.toml");
        std::fs::write(&path, "[bridge]\nrestore_suppress_ms = 250\n").unwrap();
        let config = TabsentryConfig::load(path.to_str()).unwrap();
        assert_eq!(config.bridge.restore_suppress_ms, 250);
    }

    #[test]
    fn malformed_config_file_is_a_config_error() {
        let path = std::env::temp_dir().join("tabsentry-malformed.toml");
        std::fs::write(&path, "[bridge\nrestore_suppress_ms = ").unwrap();
        let err = TabsentryConfig::load(path.to_str()).unwrap_err();
        assert!(matches!(err, crate::error::TabsentryError::Config(_)));
    }
}
