use perm_cache::CacheError;
use soma_msg::{Action, Section, codes};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IamError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("payload does not match {section}::{action}")]
    Mismatch { section: Section, action: Action },

    #[error("section {section} does not implement action {action}")]
    Unhandled { section: Section, action: Action },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl IamError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::Invalid(_) | Self::Mismatch { .. } => codes::BAD_REQUEST,
            Self::Conflict(_) => codes::CONFLICT,
            Self::Unhandled { .. } => codes::NOT_IMPLEMENTED,
            Self::Cache(err) => err.code(),
        }
    }
}
