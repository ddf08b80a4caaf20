use soma_msg::codes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unknown key exchange: {0}")]
    UnknownKex(String),

    #[error("key exchange {0} has expired")]
    KexExpired(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("account {0} is not pending activation")]
    NotPending(String),

    /// Policy rule the submitted credential violates.
    #[error("{0}")]
    Policy(String),

    #[error("token is not active")]
    UnknownToken,

    #[error("supervisor task missing")]
    MissingTask,
}

impl SupervisorError {
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidCredentials | Self::KexExpired(_) => codes::UNAUTHORIZED,
            Self::UnknownKex(_) | Self::UnknownToken => codes::NOT_FOUND,
            Self::Malformed(_) | Self::MissingTask => codes::BAD_REQUEST,
            Self::NotPending(_) => codes::CONFLICT,
            Self::Policy(_) => codes::NOT_ACCEPTABLE,
        }
    }
}
