//! Caller identity extractors.
//!
//! The caller is identified by the internal user id in the `x-user-id`
//! header, as set by the messaging front-end after it upserts the user.
//! The front-end is the only trusted client: `POST /users` hands out
//! internal ids, so when `FRONTEND_TOKEN` is configured that route requires
//! the same value in the `x-frontend-token` header.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use domain::DomainError;
use store::{Store, User};

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const FRONTEND_TOKEN_HEADER: &str = "x-frontend-token";

/// The messaging front-end, authenticated by the shared token if one is set.
#[derive(Debug, Clone, Copy)]
pub struct Frontend;

/// Any known user.
#[derive(Debug, Clone)]
pub struct Caller(pub User);

/// A user with the admin flag set.
#[derive(Debug, Clone)]
pub struct AdminCaller(pub User);

impl<S> FromRequestParts<Arc<AppState<S>>> for Caller
where
    S: Store + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("Malformed {USER_ID_HEADER} header")))?;

        let user_id: UserId = raw
            .trim()
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("Malformed {USER_ID_HEADER} header")))?;

        match state.users.get(user_id).await {
            Ok(user) => Ok(Caller(user)),
            Err(DomainError::NotFound { .. }) => {
                Err(ApiError::Unauthorized(format!("Unknown user {user_id}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<S> FromRequestParts<Arc<AppState<S>>> for AdminCaller
where
    S: Store + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Caller(user) = Caller::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::Forbidden("Admin rights required".to_string()));
        }
        Ok(AdminCaller(user))
    }
}

impl<S> FromRequestParts<Arc<AppState<S>>> for Frontend
where
    S: Store + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.frontend_token.as_deref() else {
            return Ok(Frontend);
        };

        let presented = parts
            .headers
            .get(FRONTEND_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(token) if token == expected => Ok(Frontend),
            _ => Err(ApiError::Unauthorized(format!(
                "Missing or invalid {FRONTEND_TOKEN_HEADER} header"
            ))),
        }
    }
}
