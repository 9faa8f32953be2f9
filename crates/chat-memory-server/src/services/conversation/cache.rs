use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::store::{HistoryStore, StoreError};

/// Value held under a key. Only lists are written through the store contract;
/// scalars appear when something else wrote the key.
#[derive(Debug, Clone)]
enum Entry {
    List(Vec<String>),
    #[cfg_attr(not(test), allow(dead_code))]
    Scalar(String),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::List(_) => "list",
            Entry::Scalar(_) => "string",
        }
    }
}

/// In-process history store used for local development and tests.
/// Uses DashMap for lock-free concurrent access across keys.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    storage: Arc<DashMap<String, Entry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        debug!("Initializing in-memory history store");
        Self::default()
    }

    /// Overwrite `key` with a plain string value, like a foreign `SET` would.
    #[cfg(test)]
    pub fn put_value(&self, key: &str, value: &str) {
        self.storage
            .insert(key.to_string(), Entry::Scalar(value.to_string()));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn push(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        let mut entry = self
            .storage
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(Vec::new()));

        match entry.value_mut() {
            Entry::List(items) => {
                items.extend(values.iter().cloned());
                Ok(())
            }
            other => Err(StoreError::ShapeConflict {
                key: key.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.push(key, &[value.to_string()])
    }

    async fn append_all(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        self.push(key, values)
    }

    async fn read_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.storage.get(key) {
            None => Ok(Vec::new()),
            Some(entry) => match entry.value() {
                Entry::List(items) => Ok(items.clone()),
                other => Err(StoreError::ShapeConflict {
                    key: key.to_string(),
                    found: other.kind().to_string(),
                }),
            },
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.storage.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.storage.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_basic_operations() {
        let store = InMemoryHistoryStore::new();

        store.append("u1:messages", "first").await.unwrap();
        store.append("u1:messages", "second").await.unwrap();
        assert!(store.exists("u1:messages").await.unwrap());
        assert_eq!(
            store.read_all("u1:messages").await.unwrap(),
            vec!["first", "second"]
        );

        store.delete("u1:messages").await.unwrap();
        assert!(store.is_empty());
        // idempotent
        store.delete("u1:messages").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_absent_key_is_empty() {
        let store = InMemoryHistoryStore::new();
        assert!(store.read_all("nobody:messages").await.unwrap().is_empty());
        assert!(!store.exists("nobody:messages").await.unwrap());
    }

    #[tokio::test]
    async fn test_scalar_key_reports_shape_conflict() {
        let store = InMemoryHistoryStore::new();
        store.put_value("u1:messages", "oops");

        let err = store.append("u1:messages", "hi").await.unwrap_err();
        assert!(matches!(err, StoreError::ShapeConflict { ref found, .. } if found == "string"));

        let err = store.read_all("u1:messages").await.unwrap_err();
        assert!(matches!(err, StoreError::ShapeConflict { .. }));
    }

    #[tokio::test]
    async fn test_append_all_keeps_order() {
        let store = InMemoryHistoryStore::new();
        store.append("k", "a").await.unwrap();
        store
            .append_all("k", &["b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(store.read_all("k").await.unwrap(), vec!["a", "b", "c"]);
    }
}
