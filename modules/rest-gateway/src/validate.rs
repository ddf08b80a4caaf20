//! Name checks applied before a request reaches a handler.

use crate::error::RestError;

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_USER_NAME_LEN: usize = 256;

/// Rejects empty names and names longer than `max` characters.
///
/// # Errors
/// [`RestError::Invalid`] naming the offending field.
pub fn name(kind: &str, value: &str, max: usize) -> Result<(), RestError> {
    if value.trim().is_empty() {
        return Err(RestError::Invalid(format!("{kind} name must not be empty")));
    }
    let len = value.chars().count();
    if len > max {
        return Err(RestError::Invalid(format!(
            "{kind} name is {len} characters long, at most {max} are allowed"
        )));
    }
    Ok(())
}

/// Login names separate from the token with `:` in the Basic header, so
/// they must not contain one.
///
/// # Errors
/// [`RestError::Invalid`] for illegal login names.
pub fn user_name(value: &str) -> Result<(), RestError> {
    name("user", value, MAX_USER_NAME_LEN)?;
    if value.contains(':') {
        return Err(RestError::Invalid(
            "user name must not contain ':'".to_owned(),
        ));
    }
    Ok(())
}

/// Monitoring system names are used as dotted path components downstream.
///
/// # Errors
/// [`RestError::Invalid`] for illegal monitoring names.
pub fn monitoring_name(value: &str) -> Result<(), RestError> {
    name("monitoring", value, MAX_NAME_LEN)?;
    if value.contains('.') {
        return Err(RestError::Invalid(
            "monitoring name must not contain '.'".to_owned(),
        ));
    }
    Ok(())
}
