//! User profiles and role changes.

mod common;

use common::{id, TestCatalog};
use curator::error::ForbiddenReason;
use curator::integrity::UniqueKey;
use curator::models::UserPatch;
use curator::service::Registration;
use curator::{Actor, Role, ServiceError};
use uuid::Uuid;

#[test]
fn registration_always_starts_as_user() {
    let t = TestCatalog::new();
    let new_id = Uuid::new_v4();
    let newcomer = Actor::user(new_id, Role::User);

    let user = t
        .catalog
        .register_user(
            &newcomer,
            new_id,
            Registration {
                username: "carol".to_string(),
                external_id: Some("gh-42".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(user.role, Role::User);

    let result = t.catalog.register_user(
        &newcomer,
        Uuid::new_v4(),
        Registration {
            username: "someone-else".to_string(),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[test]
fn usernames_are_unique() {
    let t = TestCatalog::new();
    let new_id = Uuid::new_v4();

    let result = t.catalog.register_user(
        &Actor::System,
        new_id,
        Registration {
            username: "alice".to_string(),
            ..Default::default()
        },
    );
    assert!(matches!(
        result,
        Err(ServiceError::Conflict(UniqueKey::UserUsername))
    ));
}

#[test]
fn users_edit_their_own_profile_only() {
    let t = TestCatalog::new();
    let patch = UserPatch {
        bio: Some("Maker".to_string()),
        ..Default::default()
    };

    let updated = t.catalog.update_user(&t.alice, id(&t.alice), patch.clone()).unwrap();
    assert_eq!(updated.bio.as_deref(), Some("Maker"));

    assert!(matches!(
        t.catalog.update_user(&t.bob, id(&t.alice), patch.clone()),
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        t.catalog.update_user(&t.moderator, id(&t.alice), patch),
        Err(ServiceError::Forbidden(_))
    ));
}

#[test]
fn non_admin_cannot_change_roles_even_their_own() {
    let t = TestCatalog::new();

    for (actor, target) in [
        (&t.alice, id(&t.alice)),
        (&t.moderator, id(&t.moderator)),
        (&t.moderator, id(&t.alice)),
    ] {
        let result = t.catalog.set_user_role(actor, target, Role::Admin);
        assert!(
            matches!(
                result,
                Err(ServiceError::Forbidden(ForbiddenReason::RoleChangeRequiresAdmin))
                    | Err(ServiceError::Forbidden(ForbiddenReason::NotPermitted))
            ),
            "{result:?}"
        );
    }
    assert_eq!(t.refreshed(&t.alice).role(), Some(Role::User));
    assert_eq!(t.refreshed(&t.moderator).role(), Some(Role::Moderator));
}

#[test]
fn rejected_role_change_aborts_the_whole_patch() {
    let t = TestCatalog::new();
    let patch = UserPatch {
        display_name: Some("Alice A.".to_string()),
        role: Some(Role::Moderator),
        ..Default::default()
    };

    let result = t.catalog.update_user(&t.alice, id(&t.alice), patch);
    assert!(matches!(
        result,
        Err(ServiceError::Forbidden(ForbiddenReason::RoleChangeRequiresAdmin))
    ));

    let user = t.catalog.get_user(&t.alice, id(&t.alice)).unwrap();
    assert_eq!(user.display_name, None);
    assert_eq!(user.role, Role::User);
}

#[test]
fn resubmitting_the_current_role_is_not_a_change() {
    let t = TestCatalog::new();
    let patch = UserPatch {
        display_name: Some("Alice".to_string()),
        role: Some(Role::User),
        ..Default::default()
    };

    let user = t.catalog.update_user(&t.alice, id(&t.alice), patch).unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Alice"));
}

#[test]
fn admin_promotes_and_demotes() {
    let t = TestCatalog::new();

    let promoted = t.catalog.set_user_role(&t.admin, id(&t.alice), Role::Moderator).unwrap();
    assert_eq!(promoted.role, Role::Moderator);

    let demoted = t.catalog.set_user_role(&t.admin, id(&t.moderator), Role::User).unwrap();
    assert_eq!(demoted.role, Role::User);
}

#[test]
fn sole_admin_may_demote_themselves() {
    let t = TestCatalog::new();

    let user = t.catalog.set_user_role(&t.admin, id(&t.admin), Role::User).unwrap();
    assert_eq!(user.role, Role::User);

    // The stale token still says admin; the store does not.
    let result = t.catalog.set_user_role(&t.admin, id(&t.alice), Role::Admin);
    assert!(matches!(
        result,
        Err(ServiceError::Forbidden(ForbiddenReason::RoleChangeRequiresAdmin))
    ));
}

#[test]
fn demoted_admin_loses_access_on_next_request() {
    let t = TestCatalog::new();
    let second_admin = common::seed_user(&t.store, "root2", Role::Admin);
    t.catalog.set_user_role(&t.admin, id(&second_admin), Role::User).unwrap();

    let refreshed = t.refreshed(&second_admin);
    assert!(matches!(
        t.catalog.set_user_role(&refreshed, id(&t.alice), Role::Moderator),
        Err(ServiceError::Forbidden(_))
    ));
}

#[test]
fn system_changes_any_role() {
    let t = TestCatalog::new();
    let user = t.catalog.set_user_role(&Actor::System, id(&t.bob), Role::Admin).unwrap();
    assert_eq!(user.role, Role::Admin);
}

#[test]
fn anonymous_cannot_touch_users() {
    let t = TestCatalog::new();
    assert!(matches!(
        t.catalog.set_user_role(&Actor::Anonymous, id(&t.alice), Role::Admin),
        Err(ServiceError::Unauthenticated)
    ));
    assert!(matches!(
        t.catalog.get_user(&Actor::Anonymous, id(&t.alice)),
        Err(ServiceError::Unauthenticated)
    ));
}

#[test]
fn deleting_a_user_takes_their_content_and_keeps_products() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    t.catalog.rate_product(&t.alice, product.id, 5).unwrap();

    assert!(t.catalog.delete_user(&t.admin, id(&t.alice)).is_err());
    t.catalog.delete_user(&Actor::System, id(&t.alice)).unwrap();

    let product = t.catalog.get_product(&Actor::Anonymous, product.id).unwrap();
    assert_eq!(product.created_by, None);
    assert!(t.catalog.product_ratings(&Actor::Anonymous, product.id).unwrap().is_empty());
    assert!(matches!(
        t.catalog.get_user(&Actor::System, id(&t.alice)),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn strangers_cannot_tell_missing_users_from_hidden_ones() {
    let t = TestCatalog::new();
    let missing = Uuid::new_v4();

    for target in [missing, id(&t.bob)] {
        assert!(matches!(
            t.catalog.get_user(&t.alice, target),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            t.catalog.activities_of(&t.alice, target, 10),
            Err(ServiceError::Forbidden(_))
        ));
    }

    assert!(matches!(
        t.catalog.get_user(&t.admin, missing),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        t.catalog.activities_of(&t.moderator, missing, 10),
        Err(ServiceError::NotFound(_))
    ));
}
