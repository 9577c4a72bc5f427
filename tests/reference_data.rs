//! Allow-lists, scraper records and the activity log.

mod common;

use chrono::Duration;
use serde_json::json;

use common::{id, TestCatalog};
use curator::integrity::UniqueKey;
use curator::models::{now, ActivityKind, NewOAuthConfig, ReferenceKind};
use curator::service::ScrapingReport;
use curator::{Actor, ServiceError};

#[test]
fn admins_maintain_sources_and_bump_the_version() {
    let t = TestCatalog::new();
    let before = t
        .catalog
        .reference_version(&Actor::Anonymous, ReferenceKind::SupportedSources)
        .unwrap();

    let source = t
        .catalog
        .add_supported_source(&t.admin, "https://www.Printables.com/", "Printables")
        .unwrap();
    assert_eq!(source.domain, "printables.com");
    assert!(matches!(
        t.catalog.add_supported_source(&t.admin, "printables.com", "Again"),
        Err(ServiceError::Conflict(UniqueKey::SupportedSourceDomain))
    ));
    assert!(t.catalog.add_supported_source(&t.moderator, "x.org", "X").is_err());

    let after = t
        .catalog
        .reference_version(&Actor::Anonymous, ReferenceKind::SupportedSources)
        .unwrap();
    assert!(after > before);

    // The new source is usable straight away.
    let product = t.submit(&t.alice, "Clip", "https://printables.com/model/1");
    assert_eq!(product.source, "Printables");

    t.catalog.remove_supported_source(&t.admin, "printables.com").unwrap();
    assert!(matches!(
        t.catalog.remove_supported_source(&t.admin, "printables.com"),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn categories_are_admin_managed() {
    let t = TestCatalog::new();

    t.catalog.add_valid_category(&t.admin, "Sewing").unwrap();
    assert!(t.catalog.add_valid_category(&t.alice, "Spam").is_err());
    assert!(t
        .catalog
        .valid_categories(&Actor::Anonymous)
        .unwrap()
        .iter()
        .any(|c| c.name == "Sewing"));

    t.catalog.remove_valid_category(&t.admin, "Sewing").unwrap();
    assert!(matches!(
        t.catalog.remove_valid_category(&t.admin, "Sewing"),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn scraping_logs_are_written_by_the_system_and_read_by_staff() {
    let t = TestCatalog::new();
    let report = ScrapingReport {
        source: "GitHub".to_string(),
        products_found: 10,
        products_added: 3,
        status: "success".to_string(),
        ..Default::default()
    };

    assert!(t.catalog.record_scraping_log(&t.admin, report.clone()).is_err());
    t.catalog.record_scraping_log(&Actor::System, report.clone()).unwrap();
    assert!(t
        .catalog
        .record_scraping_log(
            &Actor::System,
            ScrapingReport {
                products_found: -1,
                ..report
            }
        )
        .is_err());

    assert_eq!(t.catalog.scraping_logs(&t.moderator, 10).unwrap().len(), 1);
    assert!(t.catalog.scraping_logs(&t.alice, 10).is_err());
}

#[test]
fn oauth_config_is_replaced_per_platform() {
    let t = TestCatalog::new();
    let config = |token: &str| NewOAuthConfig {
        platform: "Thingiverse".to_string(),
        client_id: Some("client".to_string()),
        client_secret: None,
        redirect_uri: None,
        access_token: Some(token.to_string()),
        refresh_token: None,
        token_expires_at: None,
    };

    assert!(t.catalog.put_oauth_config(&t.admin, config("a")).is_err());
    t.catalog.put_oauth_config(&Actor::System, config("first")).unwrap();
    let stored = t.catalog.put_oauth_config(&Actor::System, config("second")).unwrap();
    assert_eq!(stored.platform, "thingiverse");

    let loaded = t.catalog.oauth_config(&t.admin, "THINGIVERSE").unwrap();
    assert_eq!(loaded.id, stored.id);
    assert_eq!(loaded.access_token.as_deref(), Some("second"));
}

#[test]
fn search_terms_are_cleaned() {
    let t = TestCatalog::new();
    let terms = vec![
        "switch".to_string(),
        " ".to_string(),
        "Switch".to_string(),
        " one-handed ".to_string(),
    ];

    assert!(t.catalog.put_search_terms(&t.moderator, "github", terms.clone()).is_err());
    let stored = t.catalog.put_search_terms(&t.admin, "GitHub", terms).unwrap();
    assert_eq!(stored.search_terms, vec!["switch", "one-handed"]);
    assert_eq!(
        t.catalog.search_terms(&t.moderator, "github").unwrap().search_terms.len(),
        2
    );
}

#[test]
fn activity_log_is_private_to_owner_and_staff() {
    let t = TestCatalog::new();
    let product = t.submit(&t.alice, "Reader", "https://github.com/a/reader");
    t.catalog.rate_product(&t.alice, product.id, 5).unwrap();

    assert!(t
        .catalog
        .record_activity(&t.alice, id(&t.alice), ActivityKind::Tag, None, json!({}))
        .is_err());
    t.catalog
        .record_activity(&Actor::System, id(&t.alice), ActivityKind::Tag, None, json!({}))
        .unwrap();

    assert_eq!(t.catalog.activities_of(&t.alice, id(&t.alice), 50).unwrap().len(), 3);
    assert_eq!(t.catalog.activities_of(&t.moderator, id(&t.alice), 2).unwrap().len(), 2);
    assert!(t.catalog.activities_of(&t.bob, id(&t.alice), 10).is_err());

    let purged = t
        .catalog
        .purge_activities_before(&Actor::System, now() + Duration::seconds(1))
        .unwrap();
    assert_eq!(purged, 3);
    assert!(t.catalog.activities_of(&t.alice, id(&t.alice), 10).unwrap().is_empty());
}
