//! Keyed persistence for logout transaction state
//!
//! The engine only depends on this trait; durable backends live with the
//! host application. An in-memory implementation is provided for tests and
//! single-process deployments.

use super::types::StoredState;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque keyed store for transaction and dispatch state.
///
/// Backends must offer read-your-writes consistency per key and serialize
/// save/update/load on the same key. Keys are store-assigned and opaque to
/// the engine; dispatch-state keys travel to SPs as RelayState tokens.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist new state, returning its store-assigned key.
    async fn save(&self, state: StoredState) -> Result<String, StoreError>;

    /// Load state by key. With `destroy`, the record is removed atomically
    /// with the read; a second load of the same key finds nothing.
    async fn load(&self, id: &str, destroy: bool) -> Result<Option<StoredState>, StoreError>;

    /// Replace existing state. Fails if the key is unknown.
    async fn update(&self, id: &str, state: StoredState) -> Result<(), StoreError>;
}

/// In-memory transaction store.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    entries: RwLock<HashMap<String, StoredState>>,
}

impl InMemoryTransactionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn save(&self, state: StoredState) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let mut entries = self.entries.write().await;
        entries.insert(id.clone(), state);
        tracing::debug!(id = %id, "Stored logout state");
        Ok(id)
    }

    async fn load(&self, id: &str, destroy: bool) -> Result<Option<StoredState>, StoreError> {
        let mut entries = self.entries.write().await;
        let state = if destroy {
            entries.remove(id)
        } else {
            entries.get(id).cloned()
        };
        Ok(state)
    }

    async fn update(&self, id: &str, state: StoredState) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(existing) => {
                *existing = state;
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{DispatchState, GlobalTransaction};

    fn dispatch_state() -> StoredState {
        StoredState::Dispatch(DispatchState {
            transaction_id: "tx1".to_string(),
            session_index: "i1".to_string(),
            issuer: Some("sp1".to_string()),
            name_id: "u1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryTransactionStore::new();
        let id = store.save(dispatch_state()).await.unwrap();

        let loaded = store.load(&id, false).await.unwrap();
        assert!(loaded.is_some());

        // Non-destructive load leaves the record in place
        assert!(store.load(&id, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_destroy_on_load_consumes_exactly_once() {
        let store = InMemoryTransactionStore::new();
        let id = store.save(dispatch_state()).await.unwrap();

        assert!(store.load(&id, true).await.unwrap().is_some());
        assert!(store.load(&id, true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_existing() {
        let store = InMemoryTransactionStore::new();
        let id = store
            .save(StoredState::Transaction(GlobalTransaction::default()))
            .await
            .unwrap();

        let mut tx = store
            .load(&id, false)
            .await
            .unwrap()
            .unwrap()
            .into_transaction()
            .unwrap();
        tx.mark_failed();
        store
            .update(&id, StoredState::Transaction(tx))
            .await
            .unwrap();

        let reloaded = store
            .load(&id, false)
            .await
            .unwrap()
            .unwrap()
            .into_transaction()
            .unwrap();
        assert!(reloaded.failed);
    }

    #[tokio::test]
    async fn test_update_unknown_key_fails() {
        let store = InMemoryTransactionStore::new();
        let result = store
            .update("nope", StoredState::Transaction(GlobalTransaction::default()))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_keys_are_distinct() {
        let store = InMemoryTransactionStore::new();
        let a = store.save(dispatch_state()).await.unwrap();
        let b = store.save(dispatch_state()).await.unwrap();
        assert_ne!(a, b);
    }
}
