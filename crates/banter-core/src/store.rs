//! Persistence gateway contract.
//!
//! The dispatch core persists users and messages through this narrow
//! interface and never sees the backing schema. Implementations live outside
//! this crate; `banter-store` ships the SQLite one. Every call site treats a
//! store failure as best-effort: log it and carry on — persistence never
//! blocks or cancels a broadcast.

use thiserror::Error;

use crate::types::ChatMessage;

/// Error surfaced by a persistence gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    #[error("store backend: {0}")]
    Backend(String),
}

/// Durable storage consumed by the dispatch core.
pub trait ChatStore: Send + Sync {
    /// Upsert a user record. A conflicting username refreshes its
    /// last-active time instead of failing.
    fn save_user(&self, id: &str, username: &str, is_anonymous: bool) -> Result<(), StoreError>;

    /// Insert a chat message. The store stamps its own arrival time.
    fn save_message(
        &self,
        id: &str,
        username: &str,
        content: &str,
        is_anonymous: bool,
    ) -> Result<(), StoreError>;

    /// The most recent `limit` messages, oldest first.
    fn recent_messages(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::Backend("disk full".into());
        assert_eq!(err.to_string(), "store backend: disk full");
    }

    #[test]
    fn trait_is_object_safe() {
        struct NullStore;
        impl ChatStore for NullStore {
            fn save_user(&self, _: &str, _: &str, _: bool) -> Result<(), StoreError> {
                Ok(())
            }
            fn save_message(&self, _: &str, _: &str, _: &str, _: bool) -> Result<(), StoreError> {
                Ok(())
            }
            fn recent_messages(&self, _: usize) -> Result<Vec<ChatMessage>, StoreError> {
                Ok(Vec::new())
            }
        }
        let store: std::sync::Arc<dyn ChatStore> = std::sync::Arc::new(NullStore);
        assert!(store.recent_messages(10).unwrap().is_empty());
    }
}
