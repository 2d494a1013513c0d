/// Corkboard client: cached board view, optimistic reordering and the
/// exclusive edit session, talking to the backend over HTTP.
pub mod api;
pub mod cache;
pub mod config;
pub mod controller;
pub mod drag;
pub mod error;
pub mod events;
pub mod pending;
pub mod session;

#[cfg(test)]
mod testing;

pub use api::{BoardApi, Fetched, HttpBoardApi};
pub use cache::{BoardCache, CachedBoard, LocalStore};
pub use config::ClientConfig;
pub use controller::{BoardController, LoadHandle, RefreshOutcome};
pub use error::{ClientError, ClientResult};
pub use events::{BoardEvent, EventBus};
pub use session::EditSession;

use std::path::Path;

/// Controller for the configured backend, with its durable cache.
pub fn connect(config: &ClientConfig) -> ClientResult<BoardController<HttpBoardApi>> {
    let api = HttpBoardApi::from_config(config)?;
    let store = LocalStore::new(config.cache_path());
    log::info!(
        target: "corkboard.client",
        "Using {} as {} (cache {})",
        api.base_url(),
        config.user_id,
        store.path().display()
    );
    Ok(BoardController::with_store(api, store))
}

/// Like `connect`, reading the configuration from `config_path` or, when
/// none is given, from the default `client.json`.
pub fn connect_from(config_path: Option<&Path>) -> ClientResult<BoardController<HttpBoardApi>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path);
    connect(&config::load_config(&path))
}
