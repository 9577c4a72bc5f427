//! Shared fixtures for the integration tests.
//!
//! Each test builds its own [`TestCatalog`] over a fresh in-memory store, so
//! tests do not share state and need no database.

#![allow(dead_code)]

use std::sync::Arc;

use curator::models::{NewUser, Product};
use curator::service::ProductSubmission;
use curator::{Actor, Catalog, MemoryStore, Role, Store};
use uuid::Uuid;

pub struct TestCatalog {
    pub catalog: Catalog,
    pub store: Arc<MemoryStore>,
    pub admin: Actor,
    pub moderator: Actor,
    pub alice: Actor,
    pub bob: Actor,
}

impl TestCatalog {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::new(store.clone());

        let admin = seed_user(&store, "admin", Role::Admin);
        let moderator = seed_user(&store, "moderator", Role::Moderator);
        let alice = seed_user(&store, "alice", Role::User);
        let bob = seed_user(&store, "bob", Role::User);

        for (domain, name) in [
            ("github.com", "GitHub"),
            ("thingiverse.com", "Thingiverse"),
            ("ravelry.com", "Ravelry"),
        ] {
            store
                .add_supported_source(domain, name)
                .expect("Failed to seed source");
        }
        for category in ["Software", "Hardware", "Knitting"] {
            store
                .add_valid_category(category)
                .expect("Failed to seed category");
        }

        Self {
            catalog,
            store,
            admin,
            moderator,
            alice,
            bob,
        }
    }

    /// Registers another plain user.
    pub fn user(&self, username: &str) -> Actor {
        seed_user(&self.store, username, Role::User)
    }

    /// The actor as the middleware would build it right now.
    pub fn refreshed(&self, actor: &Actor) -> Actor {
        let id = actor.id().expect("actor has no id");
        let role = self
            .store
            .user_role(id)
            .expect("role lookup failed")
            .expect("user is gone");
        Actor::user(id, role)
    }

    pub fn submit(&self, actor: &Actor, name: &str, url: &str) -> Product {
        self.catalog
            .submit_product(
                actor,
                ProductSubmission {
                    name: name.to_string(),
                    url: url.to_string(),
                    category: Some("Software".to_string()),
                    ..Default::default()
                },
            )
            .expect("Failed to submit product")
    }
}

pub fn seed_user(store: &MemoryStore, username: &str, role: Role) -> Actor {
    let id = Uuid::new_v4();
    store
        .insert_user(NewUser {
            id,
            external_id: None,
            username: username.to_string(),
            email: Some(format!("{username}@example.com")),
            display_name: None,
            avatar_url: None,
            role,
        })
        .expect("Failed to seed user");
    Actor::user(id, role)
}

pub fn id(actor: &Actor) -> Uuid {
    actor.id().expect("actor has no id")
}
