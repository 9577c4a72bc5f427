use serde_json::json;
use uuid::Uuid;

use super::{acting_user, Catalog};
use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::integrity::validate_rating;
use crate::models::{ActivityKind, NewRating, Rating};
use crate::policy::{authorize, Action, Entity, Resource};

impl Catalog {
    fn load_rating(&self, id: Uuid) -> ServiceResult<Rating> {
        self.store
            .get_rating(id)?
            .ok_or(ServiceError::NotFound("Rating"))
    }

    /// One rating per user and product; a second one is a conflict.
    pub fn rate_product(&self, actor: &Actor, product_id: Uuid, value: i32) -> ServiceResult<Rating> {
        let user_id = acting_user(actor)?;
        authorize(actor, Entity::Rating, &Resource::owned_by(user_id), Action::Create)?;
        let value = validate_rating(value)?;
        self.load_product(product_id)?;

        let rating = self.store.insert_rating(NewRating {
            id: Uuid::new_v4(),
            product_id,
            user_id,
            rating: value,
        })?;
        self.log_activity(
            actor,
            ActivityKind::Rating,
            Some(product_id),
            json!({ "rating": value }),
        );
        Ok(rating)
    }

    pub fn get_rating(&self, actor: &Actor, id: Uuid) -> ServiceResult<Rating> {
        let rating = self.load_rating(id)?;
        authorize(
            actor,
            Entity::Rating,
            &Resource::owned_by(rating.user_id),
            Action::Read,
        )?;
        Ok(rating)
    }

    /// Only the author may change a rating, whatever their role.
    pub fn update_rating(&self, actor: &Actor, id: Uuid, value: i32) -> ServiceResult<Rating> {
        let rating = self.load_rating(id)?;
        authorize(
            actor,
            Entity::Rating,
            &Resource::owned_by(rating.user_id),
            Action::Write,
        )?;
        let value = validate_rating(value)?;
        self.store.update_rating(id, value)
    }

    pub fn delete_rating(&self, actor: &Actor, id: Uuid) -> ServiceResult<()> {
        let rating = self.load_rating(id)?;
        authorize(
            actor,
            Entity::Rating,
            &Resource::owned_by(rating.user_id),
            Action::Delete,
        )?;
        if !self.store.delete_rating(id)? {
            return Err(ServiceError::NotFound("Rating"));
        }
        Ok(())
    }

    pub fn product_ratings(&self, actor: &Actor, product_id: Uuid) -> ServiceResult<Vec<Rating>> {
        self.load_product(product_id)?;
        authorize(actor, Entity::Rating, &Resource::unowned(), Action::Read)?;
        self.store.product_ratings(product_id)
    }
}
