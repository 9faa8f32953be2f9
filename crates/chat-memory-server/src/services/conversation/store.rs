use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Key exists but does not hold a list.
    #[error("key {key} holds a {found} value, expected list")]
    ShapeConflict { key: String, found: String },

    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Durable keyed append-only list store.
///
/// Any ordered-list service satisfies this contract; conversation memory is the
/// only caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Push `value` to the end of the list at `key`, creating it if absent.
    async fn append(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Push every value in one step. Stores that can do this atomically should
    /// override the default.
    async fn append_all(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        for value in values {
            self.append(key, value).await?;
        }
        Ok(())
    }

    /// All elements in insertion order, empty when the key is absent.
    async fn read_all(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Remove the key. No error when absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
