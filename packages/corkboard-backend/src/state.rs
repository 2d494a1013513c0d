/// Shared application state passed to axum handlers.
use std::sync::Arc;

use corkboard_core::BoardStorage;

use crate::auth::IdentityProvider;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn BoardStorage>,
    pub identity: Arc<dyn IdentityProvider>,
    pub port: u16,
    pub bind_address: String,
}
