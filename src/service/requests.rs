use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{acting_user, Catalog};
use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::integrity::{normalize_domain, parse_domain_line};
use crate::models::{
    now, ApprovalEffect, NewUserRequest, RequestKind, RequestReview, RequestStatus, UserRequest,
};
use crate::policy::{authorize, Action, Entity, Resource};

#[derive(Debug, Clone, Deserialize)]
pub struct RequestDraft {
    pub request_type: RequestKind,
    pub product_id: Option<Uuid>,
    pub reason: Option<String>,
}

fn request_resource(request: &UserRequest) -> Resource {
    Resource::owned_by(request.user_id)
}

/// The normalized domain named by a source-domain request.
fn requested_domain(reason: Option<&str>) -> ServiceResult<String> {
    let raw = reason.and_then(parse_domain_line).ok_or_else(|| {
        ServiceError::validation("source-domain requests need a 'Domain: example.com' line")
    })?;
    normalize_domain(&raw)
}

/// What approving `request` changes.
fn approval_effect(request: &UserRequest) -> ServiceResult<ApprovalEffect> {
    match request.request_type {
        RequestKind::ProductOwnership => {
            let product_id = request.product_id.ok_or_else(|| {
                ServiceError::validation("product-ownership request has no product")
            })?;
            Ok(ApprovalEffect::AddEditor {
                product_id,
                user_id: request.user_id,
            })
        }
        RequestKind::Moderator | RequestKind::Admin => {
            let role = request
                .request_type
                .granted_role()
                .ok_or_else(|| ServiceError::validation("request grants no role"))?;
            Ok(ApprovalEffect::GrantRole {
                user_id: request.user_id,
                role,
            })
        }
        RequestKind::SourceDomain => Ok(ApprovalEffect::AddSource {
            domain: requested_domain(request.reason.as_deref())?,
        }),
    }
}

impl Catalog {
    fn load_request(&self, id: Uuid) -> ServiceResult<UserRequest> {
        self.store
            .get_request(id)?
            .ok_or(ServiceError::NotFound("Request"))
    }

    /// One pending request per user, kind and product.
    pub fn submit_request(&self, actor: &Actor, draft: RequestDraft) -> ServiceResult<UserRequest> {
        let user_id = acting_user(actor)?;
        authorize(
            actor,
            Entity::UserRequest,
            &Resource::owned_by(user_id),
            Action::Create,
        )?;

        match draft.request_type {
            RequestKind::ProductOwnership => {
                let product_id = draft.product_id.ok_or_else(|| {
                    ServiceError::validation("product-ownership requests need a product_id")
                })?;
                self.load_product(product_id)?;
            }
            RequestKind::SourceDomain => {
                requested_domain(draft.reason.as_deref())?;
            }
            RequestKind::Moderator | RequestKind::Admin => {
                if draft.request_type.granted_role() == actor.role() {
                    return Err(ServiceError::validation("you already have this role"));
                }
            }
        }

        let request = self.store.insert_request(NewUserRequest {
            id: Uuid::new_v4(),
            user_id,
            request_type: draft.request_type,
            product_id: draft.product_id,
            reason: draft.reason,
        })?;
        info!(request_id = %request.id, kind = %request.request_type, user_id = %user_id, "Request submitted");
        Ok(request)
    }

    pub fn get_request(&self, actor: &Actor, id: Uuid) -> ServiceResult<UserRequest> {
        let request = self.load_request(id)?;
        authorize(actor, Entity::UserRequest, &request_resource(&request), Action::Read)?;
        Ok(request)
    }

    /// Every request for moderators and admins, the caller's own otherwise.
    pub fn list_requests(&self, actor: &Actor) -> ServiceResult<Vec<UserRequest>> {
        match actor {
            Actor::Anonymous => Err(ServiceError::Unauthenticated),
            Actor::System => self.store.list_requests(None),
            Actor::User(caller) if caller.role.is_elevated() => self.store.list_requests(None),
            Actor::User(caller) => self.store.list_requests(Some(caller.id)),
        }
    }

    /// Moves a pending request to `decision` and, on approval, applies what
    /// was asked for in the same transaction. Only the first review of a
    /// request succeeds; a failed approval leaves it pending.
    pub fn review_request(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: RequestStatus,
        note: Option<String>,
    ) -> ServiceResult<UserRequest> {
        let request = self.load_request(id)?;
        authorize(actor, Entity::UserRequest, &request_resource(&request), Action::Write)?;
        if decision == RequestStatus::Pending {
            return Err(ServiceError::validation(
                "review decision must be approved or rejected",
            ));
        }

        let effect = match decision {
            RequestStatus::Approved => Some(approval_effect(&request)?),
            _ => None,
        };
        let review = RequestReview {
            status: decision,
            reviewed_by: actor.id(),
            reviewed_at: Some(now()),
            reviewer_note: note,
        };

        let reviewed = self
            .store
            .review_request(actor, id, &review, effect.as_ref())
            .inspect_err(|e| {
                warn!(request_id = %id, error = %e, actor = %actor.label(), "Request review failed");
            })?;
        info!(
            request_id = %id,
            kind = %reviewed.request_type,
            status = %reviewed.status,
            actor = %actor.label(),
            "Request reviewed"
        );
        Ok(reviewed)
    }

    pub fn delete_request(&self, actor: &Actor, id: Uuid) -> ServiceResult<()> {
        let request = self.load_request(id)?;
        authorize(actor, Entity::UserRequest, &request_resource(&request), Action::Delete)?;
        if !self.store.delete_request(id)? {
            return Err(ServiceError::NotFound("Request"));
        }
        Ok(())
    }
}
