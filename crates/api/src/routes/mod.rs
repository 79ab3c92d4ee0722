//! HTTP route handlers.

pub mod catalog;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod purchases;
pub mod users;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path or body id, rejecting malformed values with 400.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} id: {e}")))
}
