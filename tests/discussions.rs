//! Discussions: authors own content, moderators block and delete.

mod common;

use common::{id, TestCatalog};
use curator::error::ForbiddenReason;
use curator::{Actor, ServiceError};

#[test]
fn replies_must_stay_on_the_same_product() {
    let t = TestCatalog::new();
    let first = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    let second = t.submit(&t.alice, "Switch", "https://github.com/a/switch");
    let root = t.catalog.post_discussion(&t.bob, first.id, "Question?", None).unwrap();

    let reply = t
        .catalog
        .post_discussion(&t.alice, first.id, "Answer.", Some(root.id))
        .unwrap();
    assert_eq!(reply.parent_id, Some(root.id));

    assert!(matches!(
        t.catalog.post_discussion(&t.alice, second.id, "Wrong thread", Some(root.id)),
        Err(ServiceError::Validation(_))
    ));
}

#[test]
fn blank_content_is_rejected() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    assert!(matches!(
        t.catalog.post_discussion(&t.bob, product.id, "   ", None),
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        t.catalog.post_discussion(&Actor::Anonymous, product.id, "hi", None),
        Err(ServiceError::Unauthenticated)
    ));
}

#[test]
fn moderators_cannot_rewrite_content() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    let post = t.catalog.post_discussion(&t.bob, product.id, "Original", None).unwrap();

    for actor in [&t.moderator, &t.admin] {
        assert!(matches!(
            t.catalog.edit_discussion(actor, post.id, "Rewritten"),
            Err(ServiceError::Forbidden(ForbiddenReason::ModerationFieldsOnly))
        ));
    }
    assert!(matches!(
        t.catalog.edit_discussion(&t.alice, post.id, "Rewritten"),
        Err(ServiceError::Forbidden(ForbiddenReason::NotPermitted))
    ));

    let edited = t.catalog.edit_discussion(&t.bob, post.id, "Edited").unwrap();
    assert_eq!(edited.content, "Edited");
}

#[test]
fn blocking_is_for_moderators() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    let post = t.catalog.post_discussion(&t.bob, product.id, "Spam", None).unwrap();

    assert!(matches!(
        t.catalog.block_discussion(&t.bob, post.id, None),
        Err(ServiceError::Forbidden(ForbiddenReason::ElevatedRoleRequired))
    ));

    let blocked = t
        .catalog
        .block_discussion(&t.moderator, post.id, Some("spam".to_string()))
        .unwrap();
    assert!(blocked.blocked);
    assert_eq!(blocked.blocked_by, Some(id(&t.moderator)));
    assert_eq!(blocked.content, "Spam");

    let unblocked = t.catalog.unblock_discussion(&t.admin, post.id).unwrap();
    assert!(!unblocked.blocked);
    assert_eq!(unblocked.blocked_reason, None);
}

#[test]
fn deleting_a_discussion_removes_its_replies() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    let root = t.catalog.post_discussion(&t.bob, product.id, "Root", None).unwrap();
    let reply = t
        .catalog
        .post_discussion(&t.alice, product.id, "Reply", Some(root.id))
        .unwrap();
    t.catalog
        .post_discussion(&t.bob, product.id, "Nested", Some(reply.id))
        .unwrap();
    let other = t.catalog.post_discussion(&t.alice, product.id, "Other", None).unwrap();

    assert!(t.catalog.delete_discussion(&t.alice, root.id).is_err());
    t.catalog.delete_discussion(&t.moderator, root.id).unwrap();

    let remaining = t.catalog.product_discussions(&Actor::Anonymous, product.id).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, other.id);
}
