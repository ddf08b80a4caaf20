//! Per-request data attached by the middleware chain.

use std::future::Future;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use secrecy::SecretString;
use uuid::Uuid;

use crate::error::RestError;

tokio::task_local! {
    static CURRENT_REQUEST: Uuid;
}

/// Runs `fut` with `id` as the current request id.
pub async fn with_request_id<F: Future>(id: Uuid, fut: F) -> F::Output {
    CURRENT_REQUEST.scope(id, fut).await
}

/// Id assigned by [`crate::middleware::enrich`], when called below it.
#[must_use]
pub fn current_request_id() -> Option<Uuid> {
    CURRENT_REQUEST.try_with(|id| *id).ok()
}

/// Request id, URI and peer of the HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub id: Uuid,
    pub uri: String,
    pub remote_addr: String,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| RestError::Internal("request metadata missing".to_owned()))
    }
}

/// Identity confirmed by basic authentication.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: String,
    pub token: SecretString,
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(RestError::Unauthenticated)
    }
}
