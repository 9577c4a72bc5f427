use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::Catalog;
use crate::auth::{Actor, Role};
use crate::error::{ServiceError, ServiceResult};
use crate::integrity::MAX_NAME_LEN;
use crate::models::{NewUser, User, UserPatch};
use crate::policy::{authorize, Action, Entity, Resource};

/// Profile received from the identity provider on first login.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = MAX_NAME_LEN))]
    pub external_id: Option<String>,
    #[validate(length(min = 1, max = MAX_NAME_LEN, message = "username must be between 1 and 255 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = MAX_NAME_LEN))]
    pub display_name: Option<String>,
    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar_url: Option<String>,
}

impl Catalog {
    /// Creates the row for `id`. Only that user or the system may do so,
    /// and the role always starts as `user`.
    pub fn register_user(
        &self,
        actor: &Actor,
        id: Uuid,
        mut registration: Registration,
    ) -> ServiceResult<User> {
        authorize(actor, Entity::User, &Resource::owned_by(id), Action::Create)?;
        registration.username = registration.username.trim().to_string();
        registration.validate()?;

        let user = self.store.insert_user(NewUser {
            id,
            external_id: registration.external_id,
            username: registration.username,
            email: registration.email,
            display_name: registration.display_name,
            avatar_url: registration.avatar_url,
            role: Role::User,
        })?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    pub fn get_user(&self, actor: &Actor, id: Uuid) -> ServiceResult<User> {
        authorize(actor, Entity::User, &Resource::owned_by(id), Action::Read)?;
        self.store
            .get_user(id)?
            .ok_or(ServiceError::NotFound("User"))
    }

    /// Profile fields and, optionally, the role. A role change the actor is
    /// not allowed to make rejects the whole patch.
    pub fn update_user(&self, actor: &Actor, id: Uuid, mut patch: UserPatch) -> ServiceResult<User> {
        authorize(actor, Entity::User, &Resource::owned_by(id), Action::Write)?;
        let current = self
            .store
            .get_user(id)?
            .ok_or(ServiceError::NotFound("User"))?;

        if let Some(username) = &patch.username {
            patch.username = Some(username.trim().to_string());
        }
        patch.validate()?;
        if patch.is_empty() {
            return Ok(current);
        }

        self.store.update_user_guarded(actor, id, &patch)
    }

    pub fn set_user_role(&self, actor: &Actor, id: Uuid, role: Role) -> ServiceResult<User> {
        self.update_user(actor, id, UserPatch::role_only(role))
    }

    /// Removes the user, their ratings, discussions, collections, activity
    /// and requests, and detaches them from audit fields elsewhere.
    pub fn delete_user(&self, actor: &Actor, id: Uuid) -> ServiceResult<()> {
        authorize(actor, Entity::User, &Resource::owned_by(id), Action::Delete)?;
        if !self.store.delete_user(id)? {
            return Err(ServiceError::NotFound("User"));
        }
        info!(user_id = %id, actor = %actor.label(), "User deleted");
        Ok(())
    }
}
