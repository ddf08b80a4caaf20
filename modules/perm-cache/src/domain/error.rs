//! Errors raised while applying cache mutations.

use soma_msg::{Action, Section, codes};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("permission cache does not handle {section}::{action}")]
    Unhandled { section: Section, action: Action },

    #[error("invalid payload for {section}::{action}: {reason}")]
    InvalidPayload {
        section: Section,
        action: Action,
        reason: String,
    },

    #[error("unknown subject kind '{0}'")]
    UnknownSubjectKind(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
}

impl CacheError {
    pub(crate) fn invalid(section: Section, action: Action, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            section,
            action,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Result code reported back to the requester.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Unhandled { .. } => codes::NOT_IMPLEMENTED,
            Self::InvalidPayload { .. } | Self::UnknownSubjectKind(_) => codes::BAD_REQUEST,
            Self::NotFound { .. } => codes::NOT_FOUND,
        }
    }
}
