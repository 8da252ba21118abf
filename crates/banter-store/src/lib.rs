//! # banter-store
//!
//! SQLite persistence gateway for the banter relay.
//!
//! - **Connection pool**: `r2d2` over `rusqlite` with WAL pragmas
//! - **Migrations**: version-tracked, transactional, idempotent
//! - **Repositories**: stateless `users`/`messages` access taking `&Connection`
//! - **[`SqliteChatStore`]**: the [`banter_core::ChatStore`] implementation
//!
//! Every relay-facing operation is best-effort from the caller's point of
//! view — the dispatch core logs failures and keeps broadcasting.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod messages;
pub mod migrations;
pub mod store;
pub mod users;

pub use connection::{ConnectionConfig, ConnectionPool};
pub use errors::{Result, StorageError};
pub use store::SqliteChatStore;
