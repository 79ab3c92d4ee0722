//! User upsert endpoint used by the messaging front-end on every contact.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::ExternalId;
use serde::{Deserialize, Serialize};
use store::{Store, User, UserProfile};

use crate::auth::Frontend;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpsertUserRequest {
    pub external_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub external_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub display_name: String,
    pub is_admin: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            external_id: user.external_id.as_i64(),
            display_name: user.display_name(),
            username: user.username,
            full_name: user.full_name,
            is_admin: user.is_admin,
        }
    }
}

/// POST /users — create or refresh a user by external identity.
#[tracing::instrument(skip(state, _frontend, req), fields(external_id = req.external_id))]
pub async fn upsert<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _frontend: Frontend,
    Json(req): Json<UpsertUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let external_id = ExternalId::new(req.external_id);
    let profile = UserProfile::new(external_id, req.username, req.full_name)
        .with_admin(state.is_bootstrap_admin(external_id));

    let user = state.users.upsert(profile).await?;
    Ok(Json(user.into()))
}
