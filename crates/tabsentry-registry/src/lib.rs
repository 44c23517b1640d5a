//! `tabsentry-registry` — live tab/window state and system flags.
//!
//! [`TabRegistry`] is the CRUD façade every event handler goes through during
//! normal operation; [`SystemFlags`] wraps the settings map with toggle
//! semantics. Both are thin over [`tabsentry_store::Store`] and hold no
//! in-memory state of their own.

pub mod error;
pub mod flags;
pub mod manager;

pub use error::{RegistryError, Result};
pub use flags::SystemFlags;
pub use manager::TabRegistry;
