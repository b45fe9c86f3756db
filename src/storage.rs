/// Helper-state handoff through the login window's session storage
///
/// Storage is a cache, not a source of truth: every failure is logged and
/// treated as a miss.
use log::warn;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

pub const HELPER_STATE_KEY: &str = "underpar_helper_state_v1";
pub const LEGACY_HELPER_STATE_KEY: &str = "mincloudlogin_helper_state_v1";
pub const HELPER_RESULT_PREFIX: &str = "underpar_helper_result_v1:";
pub const LEGACY_HELPER_RESULT_PREFIX: &str = "mincloudlogin_helper_result_v1:";

/// What the helper remembers across the identity-provider redirect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperState {
    pub request_id: String,
    pub request_state: String,
    pub created_at: f64,
}

/// Synchronous string store shaped like `window.sessionStorage`.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove_item(&self, key: &str) -> Result<(), String>;
}

impl KeyValueStore for web_sys::Storage {
    fn get_item(&self, key: &str) -> Option<String> {
        web_sys::Storage::get_item(self, key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        web_sys::Storage::set_item(self, key, value).map_err(|e| format!("{:?}", e))
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        web_sys::Storage::remove_item(self, key).map_err(|e| format!("{:?}", e))
    }
}

/// In-memory store, used when the browser denies session storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// Read the helper state, falling back to the legacy key.
pub fn read_helper_state(store: &dyn KeyValueStore) -> Option<HelperState> {
    let raw = store
        .get_item(HELPER_STATE_KEY)
        .filter(|raw| !raw.is_empty())
        .or_else(|| store.get_item(LEGACY_HELPER_STATE_KEY))
        .filter(|raw| !raw.is_empty())?;

    match serde_json::from_str::<HelperState>(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("Discarding unreadable helper state: {}", e);
            None
        }
    }
}

/// Store the helper state under the primary key and drop the legacy copy.
pub fn write_helper_state(store: &dyn KeyValueStore, state: &HelperState) {
    let raw = match serde_json::to_string(state) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to serialize helper state: {}", e);
            return;
        }
    };
    if let Err(e) = store.set_item(HELPER_STATE_KEY, &raw) {
        warn!("Failed to save helper state: {}", e);
        return;
    }
    if let Err(e) = store.remove_item(LEGACY_HELPER_STATE_KEY) {
        warn!("Failed to remove legacy helper state: {}", e);
    }
}

pub fn clear_helper_state(store: &dyn KeyValueStore) {
    for key in [HELPER_STATE_KEY, LEGACY_HELPER_STATE_KEY] {
        if let Err(e) = store.remove_item(key) {
            warn!("Failed to clear {}: {}", key, e);
        }
    }
}

/// Extension-storage keys the login result is cached under.
pub fn result_storage_keys(request_id: &str) -> Vec<String> {
    let request_id = request_id.trim();
    if request_id.is_empty() {
        return Vec::new();
    }
    vec![
        format!("{}{}", HELPER_RESULT_PREFIX, request_id),
        format!("{}{}", LEGACY_HELPER_RESULT_PREFIX, request_id),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store whose writes always fail.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get_item(&self, _key: &str) -> Option<String> {
            None
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), String> {
            Err("QuotaExceededError".to_string())
        }

        fn remove_item(&self, _key: &str) -> Result<(), String> {
            Err("SecurityError".to_string())
        }
    }

    fn create_test_state() -> HelperState {
        HelperState {
            request_id: "req-1".to_string(),
            request_state: "state-1".to_string(),
            created_at: 1_700_000_000_000.0,
        }
    }

    #[test]
    fn test_write_then_read() {
        let store = MemoryStore::new();
        store.set_item(LEGACY_HELPER_STATE_KEY, "{}").unwrap();

        write_helper_state(&store, &create_test_state());

        assert_eq!(read_helper_state(&store), Some(create_test_state()));
        assert_eq!(store.get_item(LEGACY_HELPER_STATE_KEY), None);
        assert!(store.get_item(HELPER_STATE_KEY).unwrap().contains("\"requestState\":\"state-1\""));
    }

    #[test]
    fn test_read_falls_back_to_legacy_key() {
        let store = MemoryStore::new();
        store
            .set_item(LEGACY_HELPER_STATE_KEY, r#"{"requestId": "old", "requestState": "s"}"#)
            .unwrap();

        let state = read_helper_state(&store).unwrap();
        assert_eq!(state.request_id, "old");
        assert_eq!(state.created_at, 0.0);
    }

    #[test]
    fn test_unreadable_state_is_a_miss() {
        let store = MemoryStore::new();
        store.set_item(HELPER_STATE_KEY, "not json").unwrap();
        assert_eq!(read_helper_state(&store), None);
        assert_eq!(read_helper_state(&MemoryStore::new()), None);
    }

    #[test]
    fn test_clear_removes_both_keys() {
        let store = MemoryStore::new();
        store.set_item(HELPER_STATE_KEY, "{}").unwrap();
        store.set_item(LEGACY_HELPER_STATE_KEY, "{}").unwrap();
        clear_helper_state(&store);
        assert_eq!(store.get_item(HELPER_STATE_KEY), None);
        assert_eq!(store.get_item(LEGACY_HELPER_STATE_KEY), None);
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        write_helper_state(&BrokenStore, &create_test_state());
        clear_helper_state(&BrokenStore);
        assert_eq!(read_helper_state(&BrokenStore), None);
    }

    #[test]
    fn test_result_storage_keys() {
        assert_eq!(
            result_storage_keys(" abc "),
            vec![
                "underpar_helper_result_v1:abc".to_string(),
                "mincloudlogin_helper_result_v1:abc".to_string()
            ]
        );
        assert!(result_storage_keys("").is_empty());
    }
}
