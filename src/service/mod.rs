//! Catalog operations.
//!
//! Each operation loads the rows it needs, asks [`crate::policy`] whether the
//! actor may proceed, validates input, and only then touches the store.
//! Nothing here caches ownership or roles between calls.

mod activities;
mod blog_posts;
mod collections;
mod discussions;
mod operational;
mod products;
mod ratings;
mod reference;
mod requests;
mod users;

use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{ActivityKind, NewUserActivity, Product};
use crate::policy::Resource;
use crate::store::Store;

pub use blog_posts::BlogPostDraft;
pub use collections::CollectionDraft;
pub use operational::ScrapingReport;
pub use products::ProductSubmission;
pub use requests::RequestDraft;
pub use users::Registration;

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn load_product(&self, id: Uuid) -> ServiceResult<Product> {
        self.store
            .get_product(id)?
            .ok_or(ServiceError::NotFound("Product"))
    }

    /// Creator plus current editors, read fresh from the store.
    fn product_owners(&self, product: &Product) -> ServiceResult<Resource> {
        let editors = self.store.product_editors(product.id)?;
        Ok(Resource::owned_by_any(
            product
                .created_by
                .into_iter()
                .chain(editors.into_iter().map(|e| e.user_id)),
        ))
    }

    /// Appends to the user's activity log. A failure here is logged and
    /// does not fail the operation that triggered it.
    fn log_activity(
        &self,
        actor: &Actor,
        kind: ActivityKind,
        product_id: Option<Uuid>,
        metadata: Value,
    ) {
        let Some(user_id) = actor.id() else {
            return;
        };
        let result = self.store.insert_activity(NewUserActivity {
            id: Uuid::new_v4(),
            user_id,
            activity_type: kind,
            product_id,
            metadata,
        });
        if let Err(e) = result {
            warn!(user_id = %user_id, kind = %kind, error = %e, "Failed to record activity");
        }
    }
}

/// The user an authored row is attributed to.
fn acting_user(actor: &Actor) -> ServiceResult<Uuid> {
    match actor {
        Actor::User(caller) => Ok(caller.id),
        Actor::Anonymous => Err(ServiceError::Unauthenticated),
        Actor::System => Err(ServiceError::validation(
            "this operation must be performed on behalf of a user",
        )),
    }
}
