//! # banter-server
//!
//! Axum HTTP + `WebSocket` relay server.
//!
//! - **Connection registry**: concurrent add/remove/broadcast over live connections
//! - **Presence directory**: the ordered roster embedded in join/leave broadcasts
//! - **Dispatcher**: routes each inbound envelope to its handler
//! - **Session lifecycle**: upgrade → joined → idempotent leave on any exit path
//! - **HTTP surface**: health check, message history, `WebSocket` upgrade
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;
