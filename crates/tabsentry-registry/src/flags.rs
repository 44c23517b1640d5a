use std::sync::Arc;

use tracing::debug;

use tabsentry_core::types::{SettingKey, SettingValue};
use tabsentry_store::Store;

use crate::error::Result;

/// Typed accessor over the process-wide settings map.
///
/// `update` with no explicit value is a read-then-negate-then-write toggle.
/// There is no compare-and-swap — concurrent togglers can race, which is
/// accepted under the single-process cooperative execution model.
#[derive(Clone)]
pub struct SystemFlags {
    store: Arc<Store>,
}

impl SystemFlags {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Current value, `Bool(false)` when the key was never written.
    pub fn get(&self, key: SettingKey) -> Result<SettingValue> {
        Ok(self
            .store
            .get_setting(key)?
            .unwrap_or(SettingValue::Bool(false)))
    }

    /// Boolean view of a flag (strings are truthy when non-empty).
    pub fn is_set(&self, key: SettingKey) -> Result<bool> {
        Ok(self.get(key)?.truthy())
    }

    /// Set the key to `value` when given, otherwise toggle the stored value.
    /// Returns the resulting value either way.
    pub fn update(&self, key: SettingKey, value: Option<SettingValue>) -> Result<SettingValue> {
        let next = match value {
            Some(v) => v,
            None => self.get(key)?.negated(),
        };
        self.store.put_setting(key, &next)?;
        debug!(key = %key, value = ?next, "setting updated");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn flags() -> SystemFlags {
        let store = Arc::new(Store::new(Connection::open_in_memory().unwrap()).unwrap());
        SystemFlags::new(store)
    }

    #[test]
    fn unset_flag_reads_false() {
        let flags = flags();
        assert_eq!(
            flags.get(SettingKey::GroupByWindow).unwrap(),
            SettingValue::Bool(false)
        );
        assert!(!flags.is_set(SettingKey::GroupByWindow).unwrap());
    }

    #[test]
    fn toggle_flips_stored_true_to_false() {
        let flags = flags();
        flags
            .update(SettingKey::GroupByWindow, Some(SettingValue::Bool(true)))
            .unwrap();
        let result = flags.update(SettingKey::GroupByWindow, None).unwrap();
        assert_eq!(result, SettingValue::Bool(false));
        assert!(!flags.is_set(SettingKey::GroupByWindow).unwrap());
    }

    #[test]
    fn toggle_of_unset_key_yields_true() {
        let flags = flags();
        let result = flags.update(SettingKey::DetailedRows, None).unwrap();
        assert_eq!(result, SettingValue::Bool(true));
    }

    #[test]
    fn explicit_value_is_stored_verbatim() {
        let flags = flags();
        let result = flags
            .update(
                SettingKey::HistoryView,
                Some(SettingValue::Text("grouped".into())),
            )
            .unwrap();
        assert_eq!(result, SettingValue::Text("grouped".into()));
        assert_eq!(
            flags.get(SettingKey::HistoryView).unwrap(),
            SettingValue::Text("grouped".into())
        );
    }
}
