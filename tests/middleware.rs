//! Caller extraction middleware.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
    Extension, Router,
};
use jwt_simple::prelude::Ed25519KeyPair;
use tower::ServiceExt;
use uuid::Uuid;

use common::{id, TestCatalog};
use curator::auth::IdentityVerifier;
use curator::middleware::{optional_caller, require_caller, AuthState};
use curator::{Actor, Role};

async fn whoami(Extension(actor): Extension<Actor>) -> String {
    match actor {
        Actor::Anonymous => "anonymous".to_string(),
        Actor::System => "system".to_string(),
        Actor::User(caller) => format!("{}:{}", caller.id, caller.role),
    }
}

struct Harness {
    t: TestCatalog,
    verifier: Arc<IdentityVerifier>,
    router: Router,
}

fn harness() -> Harness {
    let t = TestCatalog::new();
    let verifier = Arc::new(IdentityVerifier::from_key_pair(Ed25519KeyPair::generate()));
    let state = AuthState::new(verifier.clone(), t.catalog.store().clone());

    let router = Router::new()
        .route(
            "/private",
            get(whoami).layer(from_fn_with_state(state.clone(), require_caller)),
        )
        .route(
            "/public",
            get(whoami).layer(from_fn_with_state(state, optional_caller)),
        );

    Harness { t, verifier, router }
}

async fn send(router: &Router, path: &str, auth: Option<&str>) -> (StatusCode, String) {
    let mut request = Request::builder().uri(path);
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn missing_header_is_rejected_on_private_routes() {
    let h = harness();
    let (status, body) = send(&h.router, "/private", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("MISSING_AUTH_HEADER"));
}

#[tokio::test]
async fn missing_header_is_anonymous_on_public_routes() {
    let h = harness();
    let (status, body) = send(&h.router, "/public", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "anonymous");
}

#[tokio::test]
async fn malformed_header_is_rejected_everywhere() {
    let h = harness();
    for path in ["/private", "/public"] {
        let (status, body) = send(&h.router, path, Some("Token abc")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("INVALID_AUTH_FORMAT"));
    }
}

#[tokio::test]
async fn token_from_another_key_is_rejected() {
    let h = harness();
    let foreign = IdentityVerifier::from_key_pair(Ed25519KeyPair::generate());
    let token = foreign.issue(id(&h.t.alice), Some("alice")).unwrap();

    let (status, body) = send(&h.router, "/public", Some(&format!("Bearer {token}"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("INVALID_TOKEN"));
}

#[tokio::test]
async fn token_for_unknown_user_is_rejected() {
    let h = harness();
    let token = h.verifier.issue(Uuid::new_v4(), None).unwrap();

    let (status, body) = send(&h.router, "/private", Some(&format!("Bearer {token}"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("UNKNOWN_USER"));
}

#[tokio::test]
async fn role_comes_from_the_store() {
    let h = harness();
    let alice = id(&h.t.alice);
    let token = h.verifier.issue(alice, Some("alice")).unwrap();
    let bearer = format!("Bearer {token}");

    let (status, body) = send(&h.router, "/private", Some(&bearer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!("{alice}:user"));

    h.t.catalog
        .set_user_role(&h.t.admin, alice, Role::Moderator)
        .unwrap();
    let (_, body) = send(&h.router, "/private", Some(&bearer)).await;
    assert_eq!(body, format!("{alice}:moderator"));
}
