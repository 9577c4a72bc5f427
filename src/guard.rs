//! Role & identity guard.
//!
//! Only an admin (or the system process) may change a user's role. The check
//! runs inside the store's update transaction, against the acting user's role
//! as re-read in that transaction, so a concurrent demotion of the actor
//! cannot slip past it. A rejection aborts the whole update.

use tracing::{info, warn};

use crate::auth::{Actor, Role};
use crate::error::{ForbiddenReason, ServiceError, ServiceResult};
use crate::telemetry::{record_role_change, RoleChangeOutcome};

/// `actor_role_now` is the actor's persisted role at check time, `None` for
/// anonymous, system, or deleted actors.
pub fn check_role_change(
    actor: &Actor,
    actor_role_now: Option<Role>,
    current: Role,
    requested: Role,
) -> ServiceResult<()> {
    if requested == current {
        return Ok(());
    }

    match actor {
        Actor::System => Ok(()),
        Actor::Anonymous => Err(ServiceError::Unauthenticated),
        Actor::User(_) if actor_role_now == Some(Role::Admin) => Ok(()),
        Actor::User(_) => Err(ServiceError::Forbidden(
            ForbiddenReason::RoleChangeRequiresAdmin,
        )),
    }
}

/// [`check_role_change`] plus logging and counters. Stores call this from
/// inside their update transaction.
pub fn enforce_role_change(
    actor: &Actor,
    actor_role_now: Option<Role>,
    target: uuid::Uuid,
    current: Role,
    requested: Role,
) -> ServiceResult<()> {
    let result = check_role_change(actor, actor_role_now, current, requested);
    if requested == current {
        return result;
    }

    match &result {
        Ok(()) => {
            record_role_change(current, requested, RoleChangeOutcome::Applied);
            info!(
                actor = %actor.label(),
                target = %target,
                from = %current,
                to = %requested,
                "Role changed"
            );
        }
        Err(_) => {
            record_role_change(current, requested, RoleChangeOutcome::Rejected);
            warn!(
                actor = %actor.label(),
                actor_role = ?actor_role_now,
                target = %target,
                from = %current,
                to = %requested,
                "Role change rejected"
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: Role) -> Actor {
        Actor::user(Uuid::new_v4(), role)
    }

    #[test]
    fn test_non_admins_cannot_change_roles() {
        for role in [Role::User, Role::Moderator] {
            let actor = user(role);
            for (current, requested) in [
                (Role::User, Role::Admin),
                (Role::User, Role::Moderator),
                (Role::Moderator, Role::User),
                (Role::Admin, Role::User),
            ] {
                assert!(matches!(
                    check_role_change(&actor, Some(role), current, requested),
                    Err(ServiceError::Forbidden(
                        ForbiddenReason::RoleChangeRequiresAdmin
                    ))
                ));
            }
        }
    }

    #[test]
    fn test_self_promotion_is_rejected() {
        let actor = user(Role::User);
        assert!(check_role_change(&actor, Some(Role::User), Role::User, Role::Admin).is_err());
    }

    #[test]
    fn test_admin_can_change_any_role() {
        let actor = user(Role::Admin);
        for current in Role::ALL {
            for requested in Role::ALL {
                assert!(check_role_change(&actor, Some(Role::Admin), current, requested).is_ok());
            }
        }
    }

    #[test]
    fn test_admin_self_demotion_is_allowed() {
        // No last-admin safeguard: an admin may demote themselves even if
        // that leaves no admin behind.
        let actor = user(Role::Admin);
        assert!(check_role_change(&actor, Some(Role::Admin), Role::Admin, Role::User).is_ok());
    }

    #[test]
    fn test_unchanged_role_needs_no_privilege() {
        let actor = user(Role::User);
        assert!(check_role_change(&actor, Some(Role::User), Role::User, Role::User).is_ok());
        assert!(
            check_role_change(&Actor::Anonymous, None, Role::Admin, Role::Admin).is_ok()
        );
    }

    #[test]
    fn test_stale_actor_role_is_not_trusted() {
        // Caller context says admin, persisted role says user.
        let actor = user(Role::Admin);
        assert!(check_role_change(&actor, Some(Role::User), Role::User, Role::Admin).is_err());
        assert!(check_role_change(&actor, None, Role::User, Role::Admin).is_err());
    }

    #[test]
    fn test_system_and_anonymous() {
        assert!(check_role_change(&Actor::System, None, Role::User, Role::Admin).is_ok());
        assert!(matches!(
            check_role_change(&Actor::Anonymous, None, Role::User, Role::Admin),
            Err(ServiceError::Unauthenticated)
        ));
    }

    #[test]
    fn test_enforce_reports_same_result() {
        let target = Uuid::new_v4();
        let actor = user(Role::Moderator);
        assert!(enforce_role_change(
            &actor,
            Some(Role::Moderator),
            target,
            Role::User,
            Role::Moderator
        )
        .is_err());
        assert!(
            enforce_role_change(&Actor::System, None, target, Role::User, Role::Admin).is_ok()
        );
    }
}
