//! Product submission, ownership and moderation.

mod common;

use std::sync::Arc;
use std::thread;

use common::{id, TestCatalog};
use curator::error::ForbiddenReason;
use curator::integrity::UniqueKey;
use curator::models::ProductPatch;
use curator::pagination::PaginationParams;
use curator::service::ProductSubmission;
use curator::{Actor, ServiceError};

fn rename(name: &str) -> ProductPatch {
    ProductPatch {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

#[test]
fn submit_resolves_source_from_url() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Switch Adapter", "https://www.github.com/acme/switch");

    assert_eq!(product.source, "GitHub");
    assert_eq!(product.slug, "switch-adapter");
    assert_eq!(product.created_by, Some(id(&t.alice)));
}

#[test]
fn submit_rejects_unsupported_source() {
    let t = TestCatalog::new();
    let result = t.catalog.submit_product(
        &t.alice,
        ProductSubmission {
            name: "Thing".to_string(),
            url: "https://example.org/thing".to_string(),
            ..Default::default()
        },
    );

    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[test]
fn submit_rejects_unknown_category() {
    let t = TestCatalog::new();
    let result = t.catalog.submit_product(
        &t.alice,
        ProductSubmission {
            name: "Thing".to_string(),
            url: "https://github.com/acme/thing".to_string(),
            category: Some("Gardening".to_string()),
            ..Default::default()
        },
    );

    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[test]
fn submission_fields_are_validated() {
    let t = TestCatalog::new();
    let cases = [
        ProductSubmission {
            name: "   ".to_string(),
            url: "https://github.com/acme/blank".to_string(),
            ..Default::default()
        },
        ProductSubmission {
            name: "x".repeat(256),
            url: "https://github.com/acme/long".to_string(),
            ..Default::default()
        },
        ProductSubmission {
            name: "Spaced".to_string(),
            url: "https://git hub.com/acme/spaced".to_string(),
            ..Default::default()
        },
        ProductSubmission {
            name: "Pictured".to_string(),
            url: "https://github.com/acme/pictured".to_string(),
            image_url: Some("cover.png".to_string()),
            ..Default::default()
        },
    ];

    for submission in cases {
        assert!(matches!(
            t.catalog.submit_product(&t.alice, submission),
            Err(ServiceError::Validation(_))
        ));
    }
}

#[test]
fn anonymous_cannot_submit() {
    let t = TestCatalog::new();
    let result = t.catalog.submit_product(
        &Actor::Anonymous,
        ProductSubmission {
            name: "Thing".to_string(),
            url: "https://github.com/acme/thing".to_string(),
            ..Default::default()
        },
    );

    assert!(matches!(result, Err(ServiceError::Unauthenticated)));
}

#[test]
fn same_name_gets_numbered_slugs() {
    let t = TestCatalog::new();
    let first = t.submit(&t.alice, "Big Button", "https://github.com/a/button");
    let second = t.submit(&t.bob, "Big Button", "https://github.com/b/button");
    let third = t.submit(&t.bob, "big button!", "https://github.com/c/button");

    assert_eq!(first.slug, "big-button");
    assert_eq!(second.slug, "big-button-2");
    assert_eq!(third.slug, "big-button-3");
}

#[test]
fn duplicate_url_is_a_conflict() {
    let t = TestCatalog::new();
    t.submit(&t.alice, "Big Button", "https://github.com/a/button");
    let result = t.catalog.submit_product(
        &t.bob,
        ProductSubmission {
            name: "Other Button".to_string(),
            url: "https://github.com/a/button".to_string(),
            ..Default::default()
        },
    );

    assert!(matches!(
        result,
        Err(ServiceError::Conflict(UniqueKey::ProductUrl))
    ));
}

#[test]
fn creator_editor_and_moderator_may_edit() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    t.catalog
        .update_product(&t.alice, product.id, rename("Reader v2"))
        .expect("creator edit");

    t.catalog
        .add_product_editor(&t.moderator, product.id, id(&t.bob))
        .expect("add editor");
    let edited = t
        .catalog
        .update_product(&t.bob, product.id, rename("Reader v3"))
        .expect("editor edit");
    assert_eq!(edited.last_edited_by, Some(id(&t.bob)));

    t.catalog
        .update_product(&t.moderator, product.id, rename("Reader v4"))
        .expect("moderator edit");
}

#[test]
fn stranger_cannot_edit() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    let result = t.catalog.update_product(&t.bob, product.id, rename("Mine now"));
    assert!(matches!(
        result,
        Err(ServiceError::Forbidden(ForbiddenReason::NotPermitted))
    ));

    let result = t
        .catalog
        .update_product(&Actor::Anonymous, product.id, rename("Mine now"));
    assert!(matches!(result, Err(ServiceError::Unauthenticated)));
}

#[test]
fn removed_editor_loses_access_but_creator_keeps_it() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    t.catalog
        .add_product_editor(&t.admin, product.id, id(&t.bob))
        .unwrap();
    t.catalog
        .remove_product_editor(&t.admin, product.id, id(&t.bob))
        .unwrap();

    assert!(t
        .catalog
        .update_product(&t.bob, product.id, rename("x"))
        .is_err());
    assert!(t
        .catalog
        .update_product(&t.alice, product.id, rename("Still mine"))
        .is_ok());
}

#[test]
fn plain_users_cannot_manage_editors() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    let result = t.catalog.add_product_editor(&t.alice, product.id, id(&t.bob));
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[test]
fn adding_an_editor_twice_is_idempotent() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    assert!(t.catalog.add_product_editor(&t.admin, product.id, id(&t.bob)).unwrap());
    assert!(!t.catalog.add_product_editor(&t.admin, product.id, id(&t.bob)).unwrap());
    assert_eq!(
        t.catalog.product_editors(&t.alice, product.id).unwrap().len(),
        1
    );
}

#[test]
fn concurrent_editor_additions_are_both_kept() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    let catalog = Arc::new(t.catalog.clone());
    let editors: Vec<_> = (0..8).map(|i| id(&t.user(&format!("editor{i}")))).collect();

    let handles: Vec<_> = editors
        .iter()
        .map(|&editor| {
            let catalog = Arc::clone(&catalog);
            let admin = t.admin;
            let product_id = product.id;
            thread::spawn(move || catalog.add_product_editor(&admin, product_id, editor))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().unwrap());
    }

    let stored: Vec<_> = t
        .catalog
        .product_editors(&t.admin, product.id)
        .unwrap()
        .into_iter()
        .map(|e| e.user_id)
        .collect();
    assert_eq!(stored.len(), editors.len());
    for editor in editors {
        assert!(stored.contains(&editor));
    }
}

#[test]
fn banned_product_is_frozen_for_everyone_but_system() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    let banned = t
        .catalog
        .ban_product(&t.moderator, product.id, Some("spam".to_string()))
        .unwrap();
    assert!(banned.banned);
    assert_eq!(banned.banned_by, Some(id(&t.moderator)));
    assert_eq!(banned.banned_reason.as_deref(), Some("spam"));

    for actor in [&t.alice, &t.moderator, &t.admin] {
        let result = t.catalog.update_product(actor, product.id, rename("x"));
        assert!(matches!(
            result,
            Err(ServiceError::Forbidden(ForbiddenReason::ProductBanned))
        ));
    }
    assert!(t
        .catalog
        .update_product(&Actor::System, product.id, rename("Fixed"))
        .is_ok());

    let unbanned = t.catalog.unban_product(&t.admin, product.id).unwrap();
    assert!(!unbanned.banned);
    assert_eq!(unbanned.banned_by, None);
    assert_eq!(unbanned.banned_reason, None);
}

#[test]
fn only_elevated_roles_ban() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    let result = t.catalog.ban_product(&t.alice, product.id, None);
    assert!(matches!(
        result,
        Err(ServiceError::Forbidden(ForbiddenReason::ElevatedRoleRequired))
    ));
}

#[test]
fn banned_products_are_listed_only_on_request_of_moderators() {
    let t = TestCatalog::new();
    let kept = t.submit(&t.alice, "Kept", "https://github.com/a/kept");
    let banned = t.submit(&t.alice, "Banned", "https://github.com/a/banned");
    t.catalog.ban_product(&t.admin, banned.id, None).unwrap();
    let params = PaginationParams::default();

    let page = t
        .catalog
        .list_products(&Actor::Anonymous, false, &params)
        .unwrap();
    let ids: Vec<_> = page.data.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![kept.id]);

    assert!(t.catalog.list_products(&t.alice, true, &params).is_err());

    let page = t.catalog.list_products(&t.moderator, true, &params).unwrap();
    assert_eq!(page.data.len(), 2);
}

#[test]
fn only_admin_deletes_and_delete_cascades() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    t.catalog.rate_product(&t.bob, product.id, 4).unwrap();
    t.catalog
        .post_discussion(&t.bob, product.id, "Nice", None)
        .unwrap();
    t.catalog.tag_product(&t.alice, product.id, "Braille").unwrap();

    assert!(matches!(
        t.catalog.delete_product(&t.alice, product.id),
        Err(ServiceError::Forbidden(_))
    ));
    t.catalog.delete_product(&t.admin, product.id).unwrap();

    assert!(matches!(
        t.catalog.get_product(&t.alice, product.id),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        t.catalog.product_ratings(&t.alice, product.id),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn tags_are_normalized_and_follow_product_write_rule() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    let tag = t.catalog.tag_product(&t.alice, product.id, "  Low Vision ").unwrap();
    assert_eq!(tag.name, "low vision");
    let again = t.catalog.tag_product(&t.admin, product.id, "LOW VISION").unwrap();
    assert_eq!(again.id, tag.id);
    assert_eq!(t.catalog.product_tags(&Actor::Anonymous, product.id).unwrap().len(), 1);

    assert!(t.catalog.tag_product(&t.bob, product.id, "spam").is_err());

    assert!(t.catalog.untag_product(&t.alice, product.id, "Low Vision").unwrap());
    assert!(!t.catalog.untag_product(&t.alice, product.id, "Low Vision").unwrap());
}

#[test]
fn extra_urls_belong_to_product_owners() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    let url = t
        .catalog
        .add_product_url(&t.alice, product.id, "https://github.com/a/reader/wiki", None)
        .unwrap();
    assert!(t
        .catalog
        .add_product_url(&t.bob, product.id, "https://github.com/b/fork", None)
        .is_err());
    for bad in ["not a url", "https://not a url at all", "ftp://github.com/a/reader"] {
        assert!(matches!(
            t.catalog.add_product_url(&t.alice, product.id, bad, None),
            Err(ServiceError::Validation(_))
        ));
    }

    assert!(t.catalog.remove_product_url(&t.bob, url.id).is_err());
    t.catalog.remove_product_url(&t.moderator, url.id).unwrap();
    assert!(t.catalog.product_urls(&t.alice, product.id).unwrap().is_empty());
}

#[test]
fn submission_is_logged_as_activity() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    let activities = t.catalog.activities_of(&t.alice, id(&t.alice), 10).unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].product_id, Some(product.id));
}
