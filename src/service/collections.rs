use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{acting_user, Catalog};
use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::integrity::{MAX_COLLECTION_DESCRIPTION_LEN, MAX_NAME_LEN};
use crate::models::{Collection, CollectionPatch, CollectionWithProducts, NewCollection};
use crate::pagination::{PaginatedResponse, PaginationParams};
use crate::policy::{authorize, permits, Action, Entity, Resource};

fn default_public() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CollectionDraft {
    #[validate(length(min = 1, max = MAX_NAME_LEN, message = "name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(length(max = MAX_COLLECTION_DESCRIPTION_LEN, message = "description must be 1000 characters or less"))]
    pub description: Option<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn collection_resource(collection: &Collection) -> Resource {
    Resource::owned_by(collection.user_id).with_visibility(collection.is_public)
}

impl Catalog {
    /// Loads a collection the actor may see. A private collection of
    /// someone else is reported as missing.
    fn visible_collection(&self, actor: &Actor, id: Uuid) -> ServiceResult<Collection> {
        let collection = self
            .store
            .get_collection(id)?
            .ok_or(ServiceError::NotFound("Collection"))?;
        authorize(
            actor,
            Entity::Collection,
            &collection_resource(&collection),
            Action::Read,
        )?;
        Ok(collection)
    }

    fn writable_collection(&self, actor: &Actor, id: Uuid, action: Action) -> ServiceResult<Collection> {
        let collection = self.visible_collection(actor, id)?;
        authorize(actor, Entity::Collection, &collection_resource(&collection), action)?;
        Ok(collection)
    }

    pub fn create_collection(
        &self,
        actor: &Actor,
        mut draft: CollectionDraft,
    ) -> ServiceResult<Collection> {
        let user_id = acting_user(actor)?;
        authorize(
            actor,
            Entity::Collection,
            &Resource::owned_by(user_id),
            Action::Create,
        )?;
        draft.name = draft.name.trim().to_string();
        draft.validate()?;

        self.store.insert_collection(NewCollection {
            id: Uuid::new_v4(),
            user_id,
            name: draft.name,
            description: draft.description,
            is_public: draft.is_public,
        })
    }

    pub fn get_collection(&self, actor: &Actor, id: Uuid) -> ServiceResult<CollectionWithProducts> {
        let collection = self.visible_collection(actor, id)?;
        let product_ids = self.store.collection_product_ids(id)?;
        Ok(CollectionWithProducts {
            collection,
            product_ids,
        })
    }

    pub fn update_collection(
        &self,
        actor: &Actor,
        id: Uuid,
        mut patch: CollectionPatch,
    ) -> ServiceResult<Collection> {
        self.writable_collection(actor, id, Action::Write)?;
        if let Some(name) = &patch.name {
            patch.name = Some(name.trim().to_string());
        }
        patch.validate()?;
        self.store.update_collection(id, &patch)
    }

    pub fn delete_collection(&self, actor: &Actor, id: Uuid) -> ServiceResult<()> {
        self.writable_collection(actor, id, Action::Delete)?;
        if !self.store.delete_collection(id)? {
            return Err(ServiceError::NotFound("Collection"));
        }
        Ok(())
    }

    /// Returns false when the product already was in the collection.
    pub fn add_collection_product(
        &self,
        actor: &Actor,
        collection_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<bool> {
        self.writable_collection(actor, collection_id, Action::Write)?;
        self.load_product(product_id)?;
        self.store.add_collection_product(collection_id, product_id)
    }

    pub fn remove_collection_product(
        &self,
        actor: &Actor,
        collection_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<bool> {
        self.writable_collection(actor, collection_id, Action::Write)?;
        self.store.remove_collection_product(collection_id, product_id)
    }

    /// All of `owner`'s collections for the owner, public ones for others.
    pub fn collections_of(&self, actor: &Actor, owner: Uuid) -> ServiceResult<Vec<Collection>> {
        Ok(self
            .store
            .collections_of(owner)?
            .into_iter()
            .filter(|c| permits(actor, Entity::Collection, &collection_resource(c), Action::Read))
            .collect())
    }

    pub fn public_collections(
        &self,
        actor: &Actor,
        params: &PaginationParams,
    ) -> ServiceResult<PaginatedResponse<Collection>> {
        authorize(actor, Entity::Collection, &Resource::unowned(), Action::Read)?;
        let (rows, total) = self.store.public_collections(params)?;
        Ok(PaginatedResponse::from_params(rows, params, total))
    }
}
