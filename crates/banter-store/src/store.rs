//! [`SqliteChatStore`] — the persistence gateway over a pooled database.

use banter_core::{ChatMessage, ChatStore, StoreError};
use tracing::info;

use crate::connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
use crate::errors::{Result, StorageError};
use crate::messages::MessageRepo;
use crate::migrations::run_migrations;
use crate::users::{UserRepo, UserRow};

/// SQLite-backed implementation of the relay's persistence contract.
pub struct SqliteChatStore {
    pool: ConnectionPool,
}

impl SqliteChatStore {
    /// Open (or create) a file-backed store and bring its schema up to date.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = new_file(path, config)?;
        Self::migrate(&pool)?;
        info!(path, "chat store opened");
        Ok(Self { pool })
    }

    /// Create an in-memory store; data lives for the process only.
    pub fn in_memory() -> Result<Self> {
        let pool = new_in_memory(&ConnectionConfig::default())?;
        Self::migrate(&pool)?;
        Ok(Self { pool })
    }

    fn migrate(pool: &ConnectionPool) -> Result<()> {
        let conn = pool.get().map_err(StorageError::Pool)?;
        let _ = run_migrations(&conn)?;
        Ok(())
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Users active within the last `minutes`, most recent first.
    pub fn active_users(&self, minutes: i64) -> Result<Vec<UserRow>> {
        let conn = self.pool.get().map_err(StorageError::Pool)?;
        UserRepo::active_since(&conn, minutes)
    }

    /// Delete messages older than `days`. Returns the number deleted.
    pub fn prune_messages(&self, days: i64) -> Result<usize> {
        let conn = self.pool.get().map_err(StorageError::Pool)?;
        MessageRepo::prune_older_than(&conn, days)
    }
}

impl ChatStore for SqliteChatStore {
    fn save_user(
        &self,
        id: &str,
        username: &str,
        is_anonymous: bool,
    ) -> std::result::Result<(), StoreError> {
        let conn = self.pool.get().map_err(StorageError::Pool)?;
        UserRepo::upsert(&conn, id, username, is_anonymous)?;
        Ok(())
    }

    fn save_message(
        &self,
        id: &str,
        username: &str,
        content: &str,
        is_anonymous: bool,
    ) -> std::result::Result<(), StoreError> {
        let conn = self.pool.get().map_err(StorageError::Pool)?;
        MessageRepo::insert(&conn, id, username, content, is_anonymous)?;
        Ok(())
    }

    fn recent_messages(
        &self,
        limit: usize,
    ) -> std::result::Result<Vec<ChatMessage>, StoreError> {
        let conn = self.pool.get().map_err(StorageError::Pool)?;
        let messages = MessageRepo::recent(&conn, limit)?;
        Ok(messages)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
