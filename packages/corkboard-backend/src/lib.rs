/// Corkboard backend: config loading, storage init, HTTP server.
pub mod api;
pub mod auth;
pub mod config;
pub mod server;
pub mod state;

use std::sync::Arc;

use corkboard_core::SqliteStorage;

use crate::auth::HeaderIdentity;
use crate::state::AppState;

/// Load config, open the store and serve until Ctrl-C.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config::default_config_path();
    let config = config::load_config(&config_path);

    let store_config = config.store.clone();
    let storage = tokio::task::spawn_blocking(move || SqliteStorage::open(&store_config)).await??;
    let identity = HeaderIdentity::new(&config.identity_header)?;
    log::info!(
        target: "corkboard.server",
        "Reading user identity from header {}",
        identity.header()
    );

    let state = AppState {
        storage: Arc::new(storage),
        identity: Arc::new(identity),
        port: config.port,
        bind_address: config.bind_address.clone(),
    };

    let (port, server) = server::spawn_server(state).await?;
    log::info!(target: "corkboard.server", "Server started on port {}", port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!(target: "corkboard.server", "Shutdown signal received");
        }
        result = server => {
            if let Err(e) = result {
                log::error!(target: "corkboard.server", "Server task failed: {}", e);
            }
        }
    }
    Ok(())
}
