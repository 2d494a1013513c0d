/// Request identity: who is calling. Authentication itself happens upstream;
/// the backend only reads the user id the identity provider forwarded.
use axum::extract::FromRequestParts;
use axum::http::header::{HeaderName, InvalidHeaderName};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use corkboard_core::types::UserId;

use crate::api::ApiError;
use crate::state::AppState;

/// Resolves the authenticated user of a request.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self, headers: &HeaderMap) -> Option<UserId>;
}

/// Reads the user id from a trusted request header.
pub struct HeaderIdentity {
    header: HeaderName,
}

impl HeaderIdentity {
    pub fn new(header: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::try_from(header.to_ascii_lowercase())?,
        })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl IdentityProvider for HeaderIdentity {
    fn current_user(&self, headers: &HeaderMap) -> Option<UserId> {
        let value = headers.get(&self.header)?.to_str().ok()?.trim();
        if value.is_empty() {
            return None;
        }
        Some(UserId::new(value))
    }
}

/// Extractor for the authenticated owner; rejects with 401 when absent.
pub struct CurrentUser(pub UserId);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .identity
            .current_user(&parts.headers)
            .map(CurrentUser)
            .ok_or(ApiError::Unauthenticated)
    }
}
