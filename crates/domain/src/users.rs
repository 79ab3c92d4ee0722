//! User directory: maps messaging platform identities to internal users.

use common::{ExternalId, UserId};
use store::{Store, User, UserProfile};

use crate::error::{DomainError, Result};

/// Service for creating and looking up users.
pub struct UserDirectory<S: Store> {
    store: S,
}

impl<S: Store> UserDirectory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates the user on first contact, otherwise refreshes its name fields.
    ///
    /// Calling twice with the same profile leaves one record with an unchanged id.
    /// An existing admin is never demoted.
    #[tracing::instrument(skip(self, profile), fields(external_id = %profile.external_id))]
    pub async fn upsert(&self, profile: UserProfile) -> Result<User> {
        let user = self.store.upsert_user(profile).await?;
        tracing::debug!(user_id = %user.id, is_admin = user.is_admin, "user upserted");
        Ok(user)
    }

    /// Loads a user, failing with `NotFound` if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    pub async fn find_by_external_id(&self, external_id: ExternalId) -> Result<Option<User>> {
        Ok(self.store.find_user_by_external_id(external_id).await?)
    }

    /// Grants or revokes admin rights.
    #[tracing::instrument(skip(self))]
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<User> {
        let user = self.store.set_user_admin(id, is_admin).await?;
        tracing::info!(user_id = %id, is_admin, "admin flag changed");
        Ok(user)
    }
}
