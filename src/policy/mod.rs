//! Access predicates for every catalog entity.
//!
//! Every data-access path in [`crate::service`] calls [`authorize`] with the
//! resource's freshly loaded owner set and visibility before touching it.
//! [`evaluate`] itself is pure and may run on any thread.

pub mod rules;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{Actor, Role};
use crate::error::{ForbiddenReason, ServiceError, ServiceResult};
use crate::telemetry::record_policy_decision;

pub use rules::{rule_for, Access, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    User,
    Product,
    ProductEditor,
    ProductUrl,
    Rating,
    Discussion,
    BlogPost,
    Collection,
    Tag,
    UserActivity,
    ScrapingLog,
    OAuthConfig,
    ScraperSearchTerms,
    UserRequest,
    /// Valid categories and supported sources.
    ReferenceData,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::User => "user",
            Entity::Product => "product",
            Entity::ProductEditor => "product_editor",
            Entity::ProductUrl => "product_url",
            Entity::Rating => "rating",
            Entity::Discussion => "discussion",
            Entity::BlogPost => "blog_post",
            Entity::Collection => "collection",
            Entity::Tag => "tag",
            Entity::UserActivity => "user_activity",
            Entity::ScrapingLog => "scraping_log",
            Entity::OAuthConfig => "oauth_config",
            Entity::ScraperSearchTerms => "scraper_search_terms",
            Entity::UserRequest => "user_request",
            Entity::ReferenceData => "reference_data",
        }
    }

    /// Name used in not-found errors.
    pub fn display_name(&self) -> &'static str {
        match self {
            Entity::User => "User",
            Entity::Product => "Product",
            Entity::ProductEditor => "Product editor",
            Entity::ProductUrl => "Product URL",
            Entity::Rating => "Rating",
            Entity::Discussion => "Discussion",
            Entity::BlogPost => "Blog post",
            Entity::Collection => "Collection",
            Entity::Tag => "Tag",
            Entity::UserActivity => "Activity",
            Entity::ScrapingLog => "Scraping log",
            Entity::OAuthConfig => "OAuth config",
            Entity::ScraperSearchTerms => "Search terms",
            Entity::UserRequest => "Request",
            Entity::ReferenceData => "Reference data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Write,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
        }
    }
}

/// The persisted facts a decision depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    owners: Vec<Uuid>,
    public: bool,
}

impl Default for Resource {
    fn default() -> Self {
        Self::unowned()
    }
}

impl Resource {
    pub fn unowned() -> Self {
        Self {
            owners: Vec::new(),
            public: true,
        }
    }

    pub fn owned_by(owner: Uuid) -> Self {
        Self::owned_by_any([owner])
    }

    pub fn owned_by_any(owners: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            owners: owners.into_iter().collect(),
            public: true,
        }
    }

    /// Published flag for blog posts, `is_public` for collections.
    pub fn with_visibility(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn is_owner(&self, id: Uuid) -> bool {
        self.owners.contains(&id)
    }

    pub fn is_public(&self) -> bool {
        self.public
    }
}

/// How an allowed caller got in. Field-level rules look at this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Public,
    Owner,
    Elevated(Role),
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    NotPermitted,
    /// Indistinguishable from a missing row.
    Concealed,
}

impl Denial {
    pub fn into_error(self, entity: Entity) -> ServiceError {
        match self {
            Denial::Unauthenticated => ServiceError::Unauthenticated,
            Denial::NotPermitted => ServiceError::Forbidden(ForbiddenReason::NotPermitted),
            Denial::Concealed => ServiceError::NotFound(entity.display_name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Grant),
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

pub fn evaluate(actor: &Actor, entity: Entity, resource: &Resource, action: Action) -> Decision {
    if actor.is_system() {
        return Decision::Allow(Grant::System);
    }

    let rule = rule_for(entity);
    let access = rule.access(action);

    if access.everyone || (access.when_public && resource.public) {
        return Decision::Allow(Grant::Public);
    }

    let concealed = action == Action::Read && rule.conceal_when_private && !resource.public;

    let Some(caller) = actor.caller() else {
        return Decision::Deny(if concealed {
            Denial::Concealed
        } else {
            Denial::Unauthenticated
        });
    };

    if access.owner && resource.is_owner(caller.id) {
        return Decision::Allow(Grant::Owner);
    }

    if access.roles.contains(&caller.role) {
        return Decision::Allow(Grant::Elevated(caller.role));
    }

    Decision::Deny(if concealed {
        Denial::Concealed
    } else {
        Denial::NotPermitted
    })
}

/// Side-effect free check, used to filter listings.
pub fn permits(actor: &Actor, entity: Entity, resource: &Resource, action: Action) -> bool {
    evaluate(actor, entity, resource, action).is_allowed()
}

/// Evaluates and records the decision, turning a denial into an error.
pub fn authorize(
    actor: &Actor,
    entity: Entity,
    resource: &Resource,
    action: Action,
) -> ServiceResult<Grant> {
    let decision = evaluate(actor, entity, resource, action);
    record_policy_decision(entity.as_str(), action.as_str(), decision.is_allowed());
    debug!(
        entity = entity.as_str(),
        action = action.as_str(),
        actor = %actor.label(),
        decision = ?decision,
        "Policy decision"
    );

    match decision {
        Decision::Allow(grant) => Ok(grant),
        Decision::Deny(denial) => {
            if action != Action::Read {
                warn!(
                    entity = entity.as_str(),
                    action = action.as_str(),
                    actor = %actor.label(),
                    denial = ?denial,
                    "Mutation denied"
                );
            }
            Err(denial.into_error(entity))
        }
    }
}

/// Moderator, admin, or the system process.
pub fn require_elevated(actor: &Actor) -> ServiceResult<()> {
    match actor {
        Actor::System => Ok(()),
        Actor::Anonymous => Err(ServiceError::Unauthenticated),
        Actor::User(caller) if caller.role.is_elevated() => Ok(()),
        Actor::User(_) => Err(ServiceError::Forbidden(
            ForbiddenReason::ElevatedRoleRequired,
        )),
    }
}

pub fn require_admin(actor: &Actor) -> ServiceResult<()> {
    match actor {
        Actor::System => Ok(()),
        Actor::Anonymous => Err(ServiceError::Unauthenticated),
        Actor::User(caller) if caller.role == Role::Admin => Ok(()),
        Actor::User(_) => Err(ServiceError::Forbidden(ForbiddenReason::AdminRequired)),
    }
}

pub fn require_system(actor: &Actor) -> ServiceResult<()> {
    match actor {
        Actor::System => Ok(()),
        Actor::Anonymous => Err(ServiceError::Unauthenticated),
        Actor::User(_) => Err(ServiceError::forbidden()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_owner_set_is_union() {
        let creator = Uuid::new_v4();
        let editor = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let resource = Resource::owned_by_any([creator, editor]);

        for id in [creator, editor] {
            assert_eq!(
                evaluate(
                    &Actor::user(id, Role::User),
                    Entity::Product,
                    &resource,
                    Action::Write
                ),
                Decision::Allow(Grant::Owner)
            );
        }
        assert!(!permits(
            &Actor::user(stranger, Role::User),
            Entity::Product,
            &resource,
            Action::Write
        ));
    }

    #[test]
    fn test_concealed_maps_to_not_found() {
        let err = authorize(
            &Actor::user(Uuid::new_v4(), Role::Admin),
            Entity::Collection,
            &Resource::owned_by(Uuid::new_v4()).with_visibility(false),
            Action::Read,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Collection")));
    }

    #[test]
    fn test_denials_map_to_error_kinds() {
        assert!(matches!(
            Denial::Unauthenticated.into_error(Entity::Product),
            ServiceError::Unauthenticated
        ));
        assert!(matches!(
            Denial::NotPermitted.into_error(Entity::Product),
            ServiceError::Forbidden(ForbiddenReason::NotPermitted)
        ));
    }

    #[test]
    fn test_role_requirements() {
        let user = Actor::user(Uuid::new_v4(), Role::User);
        let moderator = Actor::user(Uuid::new_v4(), Role::Moderator);
        let admin = Actor::user(Uuid::new_v4(), Role::Admin);

        assert!(require_elevated(&moderator).is_ok());
        assert!(require_elevated(&admin).is_ok());
        assert!(require_elevated(&Actor::System).is_ok());
        assert!(matches!(
            require_elevated(&user),
            Err(ServiceError::Forbidden(ForbiddenReason::ElevatedRoleRequired))
        ));
        assert!(matches!(
            require_elevated(&Actor::Anonymous),
            Err(ServiceError::Unauthenticated)
        ));

        assert!(require_admin(&admin).is_ok());
        assert!(require_admin(&moderator).is_err());
        assert!(require_system(&Actor::System).is_ok());
        assert!(require_system(&admin).is_err());
    }
}
