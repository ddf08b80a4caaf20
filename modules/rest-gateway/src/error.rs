use std::time::Duration;

use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use soma_msg::{Action, RegistryError, ReplyError, Section, codes};

use crate::send;

/// Failures raised by the REST boundary itself, before or instead of a
/// handler reply.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("{0}")]
    Invalid(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("permission denied")]
    Forbidden,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("no handler implements {section}::{action}")]
    NotImplemented { section: Section, action: Action },

    #[error("{0}")]
    Unavailable(String),

    #[error("service is in {0} mode")]
    ModeRefused(&'static str),

    #[error("handler did not reply within {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RestError {
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Malformed(_) | Self::Invalid(_) => codes::BAD_REQUEST,
            Self::Unauthenticated => codes::UNAUTHORIZED,
            Self::Forbidden => codes::FORBIDDEN,
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::NotImplemented { .. } => codes::NOT_IMPLEMENTED,
            Self::Unavailable(_) | Self::ModeRefused(_) | Self::Timeout(_) => codes::UNAVAILABLE,
            Self::Internal(_) => codes::SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<RegistryError> for RestError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotImplemented { section, action } => {
                Self::NotImplemented { section, action }
            }
            RegistryError::Unavailable(_) => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<ReplyError> for RestError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::Timeout(deadline) => Self::Timeout(deadline),
            ReplyError::Dropped => Self::Internal(err.to_string()),
        }
    }
}

impl From<soma_msg::ParseNameError> for RestError {
    fn from(err: soma_msg::ParseNameError) -> Self {
        Self::Invalid(err.to_string())
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        match &self {
            Self::Forbidden => send::failure(self.code(), None),
            Self::Unauthenticated => {
                let mut resp = send::failure(self.code(), Some(self.to_string()));
                resp.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Basic realm=Restricted"),
                );
                resp
            }
            _ => send::failure(self.code(), Some(self.to_string())),
        }
    }
}
