use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::Catalog;
use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{ActivityKind, NewUserActivity, UserActivity};
use crate::pagination::MAX_PER_PAGE;
use crate::policy::{authorize, Action, Entity, Resource};

impl Catalog {
    /// Explicit append by the back-office process. Catalog operations log
    /// their own activity.
    pub fn record_activity(
        &self,
        actor: &Actor,
        user_id: Uuid,
        kind: ActivityKind,
        product_id: Option<Uuid>,
        metadata: Value,
    ) -> ServiceResult<UserActivity> {
        authorize(
            actor,
            Entity::UserActivity,
            &Resource::owned_by(user_id),
            Action::Create,
        )?;
        self.store.insert_activity(NewUserActivity {
            id: Uuid::new_v4(),
            user_id,
            activity_type: kind,
            product_id,
            metadata,
        })
    }

    /// Newest first, at most `limit` entries (capped at the page maximum).
    pub fn activities_of(
        &self,
        actor: &Actor,
        user_id: Uuid,
        limit: i64,
    ) -> ServiceResult<Vec<UserActivity>> {
        authorize(
            actor,
            Entity::UserActivity,
            &Resource::owned_by(user_id),
            Action::Read,
        )?;
        if self.store.get_user(user_id)?.is_none() {
            return Err(ServiceError::NotFound("User"));
        }
        self.store
            .activities_of(user_id, limit.clamp(1, MAX_PER_PAGE))
    }

    pub fn purge_activities_before(
        &self,
        actor: &Actor,
        cutoff: NaiveDateTime,
    ) -> ServiceResult<usize> {
        authorize(actor, Entity::UserActivity, &Resource::unowned(), Action::Delete)?;
        let purged = self.store.purge_activities_before(cutoff)?;
        info!(purged, cutoff = %cutoff, "Activity log purged");
        Ok(purged)
    }
}
