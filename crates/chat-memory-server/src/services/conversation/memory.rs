use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::logging::{ActivityLog, ActivityLogger, ActivityStatus, ActivityType};
use crate::models::chat::ConversationId;

use super::store::{HistoryStore, StoreError};

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("conversation memory unavailable: {0}")]
    Unavailable(String),

    #[error("no history for conversation {0}")]
    HistoryNotFound(ConversationId),
}

impl From<StoreError> for MemoryError {
    fn from(e: StoreError) -> Self {
        MemoryError::Unavailable(e.to_string())
    }
}

/// Per-conversation view over the history store.
///
/// Owns key derivation and the list-shape invariant: a key that turns out to
/// hold anything but a list is destroyed and recreated on the next write.
#[derive(Clone)]
pub struct ConversationMemory {
    store: Arc<dyn HistoryStore>,
    activity: ActivityLogger,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn HistoryStore>, activity: ActivityLogger) -> Self {
        Self { store, activity }
    }

    pub async fn append_to_memory(
        &self,
        conversation: &ConversationId,
        text: &str,
    ) -> Result<(), MemoryError> {
        self.append_turns(conversation, &[text.to_string()]).await
    }

    /// Append several turns in one store write, with the same recovery policy.
    pub async fn append_turns(
        &self,
        conversation: &ConversationId,
        turns: &[String],
    ) -> Result<(), MemoryError> {
        let key = conversation.history_key();
        debug!("Appending {} turn(s) to {}", turns.len(), key);

        match self.store.append_all(&key, turns).await {
            Ok(()) => Ok(()),
            Err(StoreError::ShapeConflict { found, .. }) => {
                warn!("Key {} holds a {} value, not a list. Deleting and recreating it.", key, found);
                self.activity.log(
                    ActivityLog::builder(conversation, ActivityType::ShapeConflictRecovered)
                        .status(ActivityStatus::Warning)
                        .message(format!("discarded {} value", found))
                        .build(),
                );

                self.store.delete(&key).await?;
                self.store.append_all(&key, turns).await.map_err(|e| {
                    error!("Retry append to {} failed: {}", key, e);
                    MemoryError::Unavailable(e.to_string())
                })
            }
            Err(e) => {
                error!("Append to {} failed: {}", key, e);
                Err(e.into())
            }
        }
    }

    /// Turns in insertion order; empty when nothing was recorded yet.
    pub async fn get_memory(&self, conversation: &ConversationId) -> Result<Vec<String>, MemoryError> {
        let key = conversation.history_key();

        match self.store.read_all(&key).await {
            Ok(turns) => {
                debug!("Retrieved {} turn(s) from {}", turns.len(), key);
                Ok(turns)
            }
            Err(StoreError::ShapeConflict { found, .. }) => {
                // healed by the next append
                warn!("Key {} holds a {} value, not a list. Reading as empty.", key, found);
                Ok(Vec::new())
            }
            Err(e) => {
                error!("Reading {} failed: {}", key, e);
                Err(e.into())
            }
        }
    }

    pub async fn clear_memory(&self, conversation: &ConversationId) -> Result<(), MemoryError> {
        let key = conversation.history_key();

        if !self.store.exists(&key).await? {
            debug!("Nothing to clear at {}", key);
            return Err(MemoryError::HistoryNotFound(conversation.clone()));
        }

        self.store.delete(&key).await?;
        debug!("Memory cleared for conversation {}", conversation);
        Ok(())
    }

    pub async fn is_available(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::conversation::InMemoryHistoryStore;

    fn memory_with_store() -> (ConversationMemory, InMemoryHistoryStore) {
        let store = InMemoryHistoryStore::new();
        let memory = ConversationMemory::new(Arc::new(store.clone()), ActivityLogger::noop());
        (memory, store)
    }

    #[tokio::test]
    async fn test_appends_read_back_in_call_order() {
        let (memory, _) = memory_with_store();
        let id = ConversationId::new("user-1");

        for text in ["one", "two", "three"] {
            memory.append_to_memory(&id, text).await.unwrap();
        }

        assert_eq!(memory.get_memory(&id).await.unwrap(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_order_survives_shape_recovery() {
        let (memory, store) = memory_with_store();
        let id = ConversationId::new("user-1");

        store.put_value(&id.history_key(), "clobbered");
        memory.append_to_memory(&id, "one").await.unwrap();
        memory.append_to_memory(&id, "two").await.unwrap();

        assert_eq!(memory.get_memory(&id).await.unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_shape_conflict_discards_old_value() {
        let (memory, store) = memory_with_store();
        let id = ConversationId::new("user-2");

        memory.append_to_memory(&id, "lost").await.unwrap();
        store.put_value(&id.history_key(), "{\"not\":\"a list\"}");

        memory.append_to_memory(&id, "fresh").await.unwrap();
        assert_eq!(memory.get_memory(&id).await.unwrap(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_wrong_shape_reads_as_empty() {
        let (memory, store) = memory_with_store();
        let id = ConversationId::new("user-3");
        store.put_value(&id.history_key(), "scalar");

        assert!(memory.get_memory(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_twice() {
        let (memory, _) = memory_with_store();
        let id = ConversationId::new("user-4");
        memory.append_to_memory(&id, "hello").await.unwrap();

        memory.clear_memory(&id).await.unwrap();
        assert!(memory.get_memory(&id).await.unwrap().is_empty());

        let err = memory.clear_memory(&id).await.unwrap_err();
        assert!(matches!(err, MemoryError::HistoryNotFound(ref c) if c == &id));
        assert!(memory.get_memory(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_conflict_is_unavailable() {
        use crate::services::conversation::store::MockHistoryStore;

        let mut store = MockHistoryStore::new();
        store.expect_append_all().times(2).returning(|key, _| {
            Err(StoreError::ShapeConflict {
                key: key.to_string(),
                found: "hash".to_string(),
            })
        });
        store.expect_delete().times(1).returning(|_| Ok(()));

        let memory = ConversationMemory::new(Arc::new(store), ActivityLogger::noop());
        let err = memory
            .append_to_memory(&ConversationId::new("user-5"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_store_surfaces_on_read() {
        use crate::services::conversation::store::MockHistoryStore;

        let mut store = MockHistoryStore::new();
        store
            .expect_read_all()
            .returning(|_| Err(StoreError::Unavailable("connection refused".into())));

        let memory = ConversationMemory::new(Arc::new(store), ActivityLogger::noop());
        let err = memory.get_memory(&ConversationId::new("user-6")).await.unwrap_err();
        assert!(matches!(err, MemoryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_conversations_are_namespaced() {
        let (memory, store) = memory_with_store();
        memory.append_to_memory(&ConversationId::new("a"), "for a").await.unwrap();
        memory.append_to_memory(&ConversationId::new("b"), "for b").await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(
            memory.get_memory(&ConversationId::new("a")).await.unwrap(),
            vec!["for a"]
        );
    }
}
