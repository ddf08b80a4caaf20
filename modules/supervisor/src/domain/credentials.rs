//! Decrypted payloads of the token, password and activation tasks.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::error::SupervisorError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenRequest {
    pub user: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PasswordChange {
    pub user: String,
    pub password: SecretString,
    pub new_password: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Activation {
    pub user: String,
    pub password: SecretString,
}

/// Answer to token and activation tasks.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub user: String,
    pub token: String,
}

/// Answer to a password change.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Changed {
    pub user: String,
    pub changed: bool,
}

pub(crate) fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, SupervisorError> {
    let text = std::str::from_utf8(data).map_err(|e| SupervisorError::Malformed(e.to_string()))?;
    serde_json::from_str(text).map_err(|e| SupervisorError::Malformed(e.to_string()))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SupervisorError> {
    serde_json::to_vec(value).map_err(|e| SupervisorError::Malformed(e.to_string()))
}

/// Compares secrets in constant time.
pub(crate) fn secrets_match(left: &SecretString, right: &SecretString) -> bool {
    left.expose_secret()
        .as_bytes()
        .ct_eq(right.expose_secret().as_bytes())
        .into()
}
