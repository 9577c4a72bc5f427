use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::Catalog;
use crate::auth::Actor;
use crate::error::{ForbiddenReason, ServiceError, ServiceResult};
use crate::integrity::{
    extract_domain, slug_candidate, slugify, validate_allowed, validate_name, validate_url,
    UniqueKey, MAX_NAME_LEN,
};
use crate::models::{
    now, ActivityKind, BanChange, NewProduct, NewProductUrl, Product, ProductEditor, ProductPatch,
    ProductUrl, Tag,
};
use crate::pagination::{PaginatedResponse, PaginationParams};
use crate::policy::{authorize, require_elevated, Action, Entity, Resource};

const MAX_SLUG_ATTEMPTS: u32 = 50;
const MAX_TAG_LEN: u64 = 50;

/// A product as submitted by a user or a scraper.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProductSubmission {
    #[validate(length(min = 1, max = MAX_NAME_LEN, message = "name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(url(message = "Invalid product URL"))]
    pub url: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
    /// Identifier on the originating platform, set by scrapers.
    #[validate(length(min = 1, max = MAX_NAME_LEN))]
    pub external_id: Option<String>,
}

impl Catalog {
    fn resolve_source(&self, url: &str) -> ServiceResult<String> {
        let domain = extract_domain(url)
            .ok_or_else(|| ServiceError::validation(format!("invalid URL: {url}")))?;
        self.store
            .supported_sources()?
            .into_iter()
            .find(|s| s.domain.eq_ignore_ascii_case(&domain))
            .map(|s| s.name)
            .ok_or_else(|| ServiceError::validation(format!("unsupported source domain: {domain}")))
    }

    fn check_category(&self, category: &str) -> ServiceResult<()> {
        let allowed: Vec<String> = self
            .store
            .valid_categories()?
            .into_iter()
            .map(|c| c.name)
            .collect();
        validate_allowed("category", category, &allowed)
    }

    pub fn submit_product(
        &self,
        actor: &Actor,
        mut submission: ProductSubmission,
    ) -> ServiceResult<Product> {
        authorize(
            actor,
            Entity::Product,
            &Resource::owned_by_any(actor.id()),
            Action::Create,
        )?;

        submission.name = submission.name.trim().to_string();
        submission.url = submission.url.trim().to_string();
        submission.validate()?;
        let name = submission.name.clone();
        let url = validate_url(&submission.url)?;
        let source = self.resolve_source(&url)?;
        if let Some(category) = &submission.category {
            self.check_category(category)?;
        }

        let base = slugify(&name);
        if base.is_empty() {
            return Err(ServiceError::validation(
                "name must contain at least one letter or digit",
            ));
        }

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = slug_candidate(&base, attempt);
            if self.store.product_slug_exists(&slug)? {
                continue;
            }

            let result = self.store.insert_product(NewProduct {
                id: Uuid::new_v4(),
                name: name.clone(),
                slug,
                description: submission.description.clone(),
                category: submission.category.clone(),
                source: source.clone(),
                external_id: submission.external_id.clone(),
                url: url.clone(),
                image_url: submission.image_url.clone(),
                created_by: actor.id(),
            });

            match result {
                Ok(product) => {
                    info!(
                        product_id = %product.id,
                        slug = %product.slug,
                        source = %product.source,
                        actor = %actor.label(),
                        "Product submitted"
                    );
                    self.log_activity(
                        actor,
                        ActivityKind::ProductSubmit,
                        Some(product.id),
                        json!({ "name": product.name }),
                    );
                    return Ok(product);
                }
                // Lost a race for this slug; try the next suffix.
                Err(ServiceError::Conflict(UniqueKey::ProductSlug)) => {
                    debug!(attempt, "Slug taken concurrently");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ServiceError::Conflict(UniqueKey::ProductSlug))
    }

    pub fn get_product(&self, actor: &Actor, id: Uuid) -> ServiceResult<Product> {
        let product = self.load_product(id)?;
        authorize(actor, Entity::Product, &Resource::unowned(), Action::Read)?;
        Ok(product)
    }

    pub fn get_product_by_slug(&self, actor: &Actor, slug: &str) -> ServiceResult<Product> {
        let product = self
            .store
            .get_product_by_slug(slug)?
            .ok_or(ServiceError::NotFound("Product"))?;
        authorize(actor, Entity::Product, &Resource::unowned(), Action::Read)?;
        Ok(product)
    }

    /// Newest first. Banned products are listed only for moderators and
    /// admins who ask for them.
    pub fn list_products(
        &self,
        actor: &Actor,
        include_banned: bool,
        params: &PaginationParams,
    ) -> ServiceResult<PaginatedResponse<Product>> {
        authorize(actor, Entity::Product, &Resource::unowned(), Action::Read)?;
        if include_banned {
            require_elevated(actor)?;
        }
        let (rows, total) = self.store.list_products(include_banned, params)?;
        Ok(PaginatedResponse::from_params(rows, params, total))
    }

    pub fn update_product(
        &self,
        actor: &Actor,
        id: Uuid,
        mut patch: ProductPatch,
    ) -> ServiceResult<Product> {
        let product = self.load_product(id)?;
        authorize(
            actor,
            Entity::Product,
            &self.product_owners(&product)?,
            Action::Write,
        )?;
        if product.banned && !actor.is_system() {
            return Err(ServiceError::Forbidden(ForbiddenReason::ProductBanned));
        }

        if let Some(name) = &patch.name {
            patch.name = Some(name.trim().to_string());
        }
        patch.validate()?;
        if let Some(category) = &patch.category {
            self.check_category(category)?;
        }

        let updated = self.store.update_product(id, &patch, actor.id())?;
        info!(product_id = %id, actor = %actor.label(), "Product updated");
        Ok(updated)
    }

    pub fn ban_product(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> ServiceResult<Product> {
        require_elevated(actor)?;
        self.load_product(id)?;
        let product = self.store.set_product_ban(
            id,
            &BanChange {
                banned: true,
                banned_by: actor.id(),
                banned_at: Some(now()),
                banned_reason: reason,
            },
        )?;
        info!(product_id = %id, actor = %actor.label(), reason = ?product.banned_reason, "Product banned");
        Ok(product)
    }

    pub fn unban_product(&self, actor: &Actor, id: Uuid) -> ServiceResult<Product> {
        require_elevated(actor)?;
        self.load_product(id)?;
        let product = self.store.set_product_ban(
            id,
            &BanChange {
                banned: false,
                banned_by: None,
                banned_at: None,
                banned_reason: None,
            },
        )?;
        info!(product_id = %id, actor = %actor.label(), "Product unbanned");
        Ok(product)
    }

    /// Takes ratings, discussions, editors, URLs and tag links with it.
    pub fn delete_product(&self, actor: &Actor, id: Uuid) -> ServiceResult<()> {
        let product = self.load_product(id)?;
        authorize(
            actor,
            Entity::Product,
            &self.product_owners(&product)?,
            Action::Delete,
        )?;
        if !self.store.delete_product(id)? {
            return Err(ServiceError::NotFound("Product"));
        }
        info!(product_id = %id, slug = %product.slug, actor = %actor.label(), "Product deleted");
        Ok(())
    }

    /// Returns false when the user already was an editor.
    pub fn add_product_editor(
        &self,
        actor: &Actor,
        product_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<bool> {
        self.load_product(product_id)?;
        authorize(actor, Entity::ProductEditor, &Resource::unowned(), Action::Create)?;
        if self.store.get_user(user_id)?.is_none() {
            return Err(ServiceError::NotFound("User"));
        }

        let added = self.store.add_product_editor(product_id, user_id)?;
        if added {
            info!(product_id = %product_id, user_id = %user_id, actor = %actor.label(), "Product editor added");
        }
        Ok(added)
    }

    pub fn remove_product_editor(
        &self,
        actor: &Actor,
        product_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<bool> {
        self.load_product(product_id)?;
        authorize(actor, Entity::ProductEditor, &Resource::unowned(), Action::Delete)?;

        let removed = self.store.remove_product_editor(product_id, user_id)?;
        if removed {
            info!(product_id = %product_id, user_id = %user_id, actor = %actor.label(), "Product editor removed");
        }
        Ok(removed)
    }

    pub fn product_editors(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> ServiceResult<Vec<ProductEditor>> {
        self.load_product(product_id)?;
        authorize(actor, Entity::ProductEditor, &Resource::unowned(), Action::Read)?;
        self.store.product_editors(product_id)
    }

    pub fn add_product_url(
        &self,
        actor: &Actor,
        product_id: Uuid,
        url: &str,
        description: Option<String>,
    ) -> ServiceResult<ProductUrl> {
        let product = self.load_product(product_id)?;
        authorize(
            actor,
            Entity::ProductUrl,
            &self.product_owners(&product)?,
            Action::Create,
        )?;
        let url = validate_url(url)?;

        self.store.insert_product_url(NewProductUrl {
            id: Uuid::new_v4(),
            product_id,
            url,
            description,
            created_by: actor.id(),
        })
    }

    pub fn remove_product_url(&self, actor: &Actor, url_id: Uuid) -> ServiceResult<()> {
        let url = self
            .store
            .get_product_url(url_id)?
            .ok_or(ServiceError::NotFound("Product URL"))?;
        let product = self.load_product(url.product_id)?;
        authorize(
            actor,
            Entity::ProductUrl,
            &self.product_owners(&product)?,
            Action::Delete,
        )?;
        if !self.store.delete_product_url(url_id)? {
            return Err(ServiceError::NotFound("Product URL"));
        }
        Ok(())
    }

    pub fn product_urls(&self, actor: &Actor, product_id: Uuid) -> ServiceResult<Vec<ProductUrl>> {
        self.load_product(product_id)?;
        authorize(actor, Entity::ProductUrl, &Resource::unowned(), Action::Read)?;
        self.store.product_urls(product_id)
    }

    /// Attaches a tag, creating it in the vocabulary if needed. Attaching
    /// follows the product's write rule.
    pub fn tag_product(&self, actor: &Actor, product_id: Uuid, name: &str) -> ServiceResult<Tag> {
        let product = self.load_product(product_id)?;
        authorize(
            actor,
            Entity::Product,
            &self.product_owners(&product)?,
            Action::Write,
        )?;
        let name = validate_name("tag", name, MAX_TAG_LEN)?.to_lowercase();

        let tag = match self.store.find_tag(&name)? {
            Some(tag) => tag,
            None => {
                authorize(
                    actor,
                    Entity::Tag,
                    &Resource::owned_by_any(actor.id()),
                    Action::Create,
                )?;
                self.store.ensure_tag(&name)?
            }
        };

        if self.store.tag_product(product_id, tag.id)? {
            self.log_activity(
                actor,
                ActivityKind::Tag,
                Some(product_id),
                json!({ "tag": tag.name }),
            );
        }
        Ok(tag)
    }

    pub fn untag_product(&self, actor: &Actor, product_id: Uuid, name: &str) -> ServiceResult<bool> {
        let product = self.load_product(product_id)?;
        authorize(
            actor,
            Entity::Product,
            &self.product_owners(&product)?,
            Action::Write,
        )?;
        match self.store.find_tag(&name.trim().to_lowercase())? {
            Some(tag) => self.store.untag_product(product_id, tag.id),
            None => Ok(false),
        }
    }

    pub fn product_tags(&self, actor: &Actor, product_id: Uuid) -> ServiceResult<Vec<Tag>> {
        self.load_product(product_id)?;
        authorize(actor, Entity::Tag, &Resource::unowned(), Action::Read)?;
        self.store.product_tags(product_id)
    }
}
