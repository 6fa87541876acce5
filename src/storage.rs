//! Persistent key-value store boundary.
//!
//! The session reads its configuration here at startup and reacts to
//! pushed change notifications. The backing store is an external
//! collaborator; [`MemoryStore`] is the in-process implementation used by
//! the session runtime and the tests.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::trace;

/// Hotkey mapping, as [`tubedeck_core_types::HotkeyMap`].
pub const KEY_HOTKEYS: &str = "hotkeys";

/// Custom shortcuts, as [`tubedeck_core_types::CustomShortcuts`].
pub const KEY_CUSTOM_SHORTCUTS: &str = "customShortcuts";

/// Feature flags, as [`tubedeck_core_types::Settings`].
pub const KEY_SETTINGS: &str = "settings";

/// Last completed pick, as [`tubedeck_core_types::PickedElement`].
pub const KEY_PICKED_ELEMENT: &str = "pickedElement";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("value for key {key} does not deserialize: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend: {0}")]
    Backend(String),
}

/// One changed key, pushed to subscribers after the write lands.
#[derive(Clone, Debug)]
pub struct StoreChange {
    pub key: String,
    pub value: Value,
}

/// Async key-value store with change notifications.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Deserialize a stored value, or fall back to the type's default when
/// the key has never been written.
pub async fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value).map_err(|source| StorageError::Codec {
            key: key.to_string(),
            source,
        }),
        None => Ok(T::default()),
    }
}

/// Serialize and store a value under `key`.
pub async fn save<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value).map_err(|source| StorageError::Codec {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value).await
}

/// In-process store. Writes are visible immediately and fan out to every
/// subscriber; a lagging subscriber drops old notifications rather than
/// blocking writers.
pub struct MemoryStore {
    entries: DashMap<String, Value>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            entries: DashMap::new(),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        trace!(key, "storage write");
        self.entries.insert(key.to_string(), value.clone());
        // No subscribers is fine; the write already landed.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubedeck_core_types::Settings;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        save(&store, KEY_SETTINGS, &Settings::default()).await.unwrap();
        let settings: Settings = load_or_default(&store, KEY_SETTINGS).await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn missing_key_falls_back_to_default() {
        let store = MemoryStore::new();
        let settings: Settings = load_or_default(&store, KEY_SETTINGS).await.unwrap();
        assert!(settings.relocate_info);
    }

    #[tokio::test]
    async fn writes_notify_subscribers() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();
        store
            .set(KEY_HOTKEYS, serde_json::json!({ "l": "like" }))
            .await
            .unwrap();
        let change = changes.recv().await.unwrap();
        assert_eq!(change.key, KEY_HOTKEYS);
        assert_eq!(change.value["l"], "like");
    }

    #[tokio::test]
    async fn malformed_value_is_a_codec_error() {
        let store = MemoryStore::new();
        store
            .set(KEY_SETTINGS, serde_json::json!("not an object"))
            .await
            .unwrap();
        let result: Result<Settings, _> = load_or_default(&store, KEY_SETTINGS).await;
        assert!(matches!(result, Err(StorageError::Codec { .. })));
    }
}
