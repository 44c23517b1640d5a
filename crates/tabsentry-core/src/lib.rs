pub mod config;
pub mod error;
pub mod types;

pub use config::TabsentryConfig;
pub use error::TabsentryError;
pub use types::{
    CloseReason, ClosedTab, LastSession, OldSession, SettingKey, SettingValue, Tab, TabOverrides,
    TabPatch, Window, WindowPatch,
};
