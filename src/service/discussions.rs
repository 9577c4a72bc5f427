use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{acting_user, Catalog};
use crate::auth::Actor;
use crate::error::{ForbiddenReason, ServiceError, ServiceResult};
use crate::integrity::validate_content;
use crate::models::{now, ActivityKind, BlockChange, Discussion, NewDiscussion};
use crate::policy::{authorize, require_elevated, Action, Entity, Grant, Resource};

impl Catalog {
    fn load_discussion(&self, id: Uuid) -> ServiceResult<Discussion> {
        self.store
            .get_discussion(id)?
            .ok_or(ServiceError::NotFound("Discussion"))
    }

    pub fn post_discussion(
        &self,
        actor: &Actor,
        product_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<Discussion> {
        let user_id = acting_user(actor)?;
        authorize(
            actor,
            Entity::Discussion,
            &Resource::owned_by(user_id),
            Action::Create,
        )?;
        let content = validate_content(content)?;
        self.load_product(product_id)?;

        if let Some(parent_id) = parent_id {
            let parent = self
                .store
                .get_discussion(parent_id)?
                .ok_or_else(|| ServiceError::validation("parent discussion does not exist"))?;
            if parent.product_id != product_id {
                return Err(ServiceError::validation(
                    "a reply must belong to the same product as its parent",
                ));
            }
        }

        let discussion = self.store.insert_discussion(NewDiscussion {
            id: Uuid::new_v4(),
            product_id,
            user_id,
            parent_id,
            content,
        })?;
        self.log_activity(
            actor,
            ActivityKind::Discussion,
            Some(product_id),
            json!({ "discussion_id": discussion.id, "reply": parent_id.is_some() }),
        );
        Ok(discussion)
    }

    /// Content belongs to the author. Moderators may block or delete a
    /// discussion but not rewrite it.
    pub fn edit_discussion(&self, actor: &Actor, id: Uuid, content: &str) -> ServiceResult<Discussion> {
        let discussion = self.load_discussion(id)?;
        let grant = authorize(
            actor,
            Entity::Discussion,
            &Resource::owned_by(discussion.user_id),
            Action::Write,
        )?;
        if !matches!(grant, Grant::Owner | Grant::System) {
            return Err(ServiceError::Forbidden(ForbiddenReason::ModerationFieldsOnly));
        }
        let content = validate_content(content)?;
        self.store.update_discussion_content(id, &content)
    }

    pub fn block_discussion(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> ServiceResult<Discussion> {
        require_elevated(actor)?;
        self.load_discussion(id)?;
        let discussion = self.store.set_discussion_block(
            id,
            &BlockChange {
                blocked: true,
                blocked_by: actor.id(),
                blocked_reason: reason,
                blocked_at: Some(now()),
            },
        )?;
        info!(discussion_id = %id, actor = %actor.label(), "Discussion blocked");
        Ok(discussion)
    }

    pub fn unblock_discussion(&self, actor: &Actor, id: Uuid) -> ServiceResult<Discussion> {
        require_elevated(actor)?;
        self.load_discussion(id)?;
        let discussion = self.store.set_discussion_block(
            id,
            &BlockChange {
                blocked: false,
                blocked_by: None,
                blocked_reason: None,
                blocked_at: None,
            },
        )?;
        info!(discussion_id = %id, actor = %actor.label(), "Discussion unblocked");
        Ok(discussion)
    }

    /// Replies are removed with their parent.
    pub fn delete_discussion(&self, actor: &Actor, id: Uuid) -> ServiceResult<()> {
        let discussion = self.load_discussion(id)?;
        authorize(
            actor,
            Entity::Discussion,
            &Resource::owned_by(discussion.user_id),
            Action::Delete,
        )?;
        if !self.store.delete_discussion(id)? {
            return Err(ServiceError::NotFound("Discussion"));
        }
        info!(discussion_id = %id, actor = %actor.label(), "Discussion deleted");
        Ok(())
    }

    /// Oldest first, replies included.
    pub fn product_discussions(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> ServiceResult<Vec<Discussion>> {
        self.load_product(product_id)?;
        authorize(actor, Entity::Discussion, &Resource::unowned(), Action::Read)?;
        self.store.product_discussions(product_id)
    }
}
