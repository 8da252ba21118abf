//! # banter-relay
//!
//! Relay server binary — opens the SQLite store, builds the relay server,
//! and serves HTTP + WebSocket until interrupted.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use banter_core::ChatStore;
use banter_server::config::ServerConfig;
use banter_server::server::RelayServer;
use banter_store::{ConnectionConfig, SqliteChatStore};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Banter relay server.
#[derive(Parser, Debug)]
#[command(name = "banter-relay", about = "Single-room chat relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "4000")]
    port: u16,

    /// Path to the SQLite database (":memory:" keeps everything in RAM).
    #[arg(long, default_value = "banter.db")]
    db_path: String,

    /// Recent messages replayed to a joining client.
    #[arg(long, default_value = "50")]
    history_limit: usize,

    /// Days of message history to keep (0 disables pruning).
    #[arg(long, default_value = "30")]
    retention_days: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let store = Arc::new(open_store(&cli.db_path)?);

    let config = ServerConfig {
        host: cli.host.clone(),
        port: cli.port,
        history_limit: cli.history_limit,
        ..ServerConfig::default()
    };
    let gateway: Arc<dyn ChatStore> = store.clone();
    let server = RelayServer::new(config, gateway);

    let prune_handle = if cli.retention_days > 0 {
        Some(tokio::spawn(prune_loop(
            store,
            cli.retention_days,
            server.shutdown().token(),
        )))
    } else {
        None
    };

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cli.host, cli.port))?;
    info!(addr = %listener.local_addr()?, "relay listening");

    let coordinator = server.shutdown().clone();
    let shutdown_signal = async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => warn!(error = %e, "failed to listen for shutdown signal"),
        }
        coordinator.trigger();
    };

    axum::serve(listener, server.router())
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("server error")?;

    if let Some(handle) = prune_handle {
        server.shutdown().drain(vec![handle], None).await;
    }
    info!("relay stopped");
    Ok(())
}

fn open_store(db_path: &str) -> Result<SqliteChatStore> {
    let store = if db_path == ":memory:" {
        SqliteChatStore::in_memory().context("failed to open in-memory store")?
    } else {
        SqliteChatStore::open(db_path, &ConnectionConfig::default())
            .with_context(|| format!("failed to open store at {db_path}"))?
    };
    Ok(store)
}

/// Prune expired messages once at startup and then daily.
async fn prune_loop(store: Arc<SqliteChatStore>, retention_days: i64, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(Duration::from_secs(60 * 60 * 24));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                match store.prune_messages(retention_days) {
                    Ok(0) => {}
                    Ok(deleted) => info!(deleted, retention_days, "pruned expired messages"),
                    Err(e) => warn!(error = %e, "message pruning failed"),
                }
            }
            () = cancel.cancelled() => break,
        }
    }
}
