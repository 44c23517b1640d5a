//! `tabsentry-store` — transactional SQLite persistence for tab tracking.
//!
//! Six collections live in one database file: `tabs`, `windows`,
//! `closed_tabs`, `last_sessions`, `old_sessions` and the `system_settings`
//! map. [`db::init_db`] creates whatever is missing and is safe to re-run;
//! [`store::Store`] exposes one atomic operation per logical mutation.

pub mod db;
pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::Store;
