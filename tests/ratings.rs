//! Ratings: bounds, one per user and product, author-only changes.

mod common;

use common::{id, TestCatalog};
use curator::integrity::UniqueKey;
use curator::{Actor, ServiceError};

#[test]
fn rating_must_be_between_one_and_five() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    for value in [0, 6, -1] {
        assert!(matches!(
            t.catalog.rate_product(&t.bob, product.id, value),
            Err(ServiceError::Validation(_))
        ));
    }
    let rating = t.catalog.rate_product(&t.bob, product.id, 3).unwrap();
    assert_eq!(rating.rating, 3);
    assert_eq!(rating.user_id, id(&t.bob));
}

#[test]
fn second_rating_by_same_user_conflicts() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    t.catalog.rate_product(&t.bob, product.id, 5).unwrap();

    assert!(matches!(
        t.catalog.rate_product(&t.bob, product.id, 1),
        Err(ServiceError::Conflict(UniqueKey::RatingProductUser))
    ));
    // Other users are unaffected.
    t.catalog.rate_product(&t.alice, product.id, 2).unwrap();
    assert_eq!(t.catalog.product_ratings(&Actor::Anonymous, product.id).unwrap().len(), 2);
}

#[test]
fn anonymous_cannot_rate() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");

    assert!(matches!(
        t.catalog.rate_product(&Actor::Anonymous, product.id, 4),
        Err(ServiceError::Unauthenticated)
    ));
}

#[test]
fn rating_a_missing_product_is_not_found() {
    let t = TestCatalog::new();
    assert!(matches!(
        t.catalog.rate_product(&t.bob, uuid::Uuid::new_v4(), 4),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn only_the_author_changes_a_rating() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    let rating = t.catalog.rate_product(&t.bob, product.id, 2).unwrap();

    for actor in [&t.alice, &t.moderator, &t.admin] {
        assert!(matches!(
            t.catalog.update_rating(actor, rating.id, 5),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            t.catalog.delete_rating(actor, rating.id),
            Err(ServiceError::Forbidden(_))
        ));
    }

    let updated = t.catalog.update_rating(&t.bob, rating.id, 4).unwrap();
    assert_eq!(updated.rating, 4);
    assert!(t.catalog.update_rating(&t.bob, rating.id, 9).is_err());

    t.catalog.delete_rating(&t.bob, rating.id).unwrap();
    assert!(matches!(
        t.catalog.get_rating(&t.bob, rating.id),
        Err(ServiceError::NotFound(_))
    ));
}
