//! Allow-lists for product categories and source platforms.

use tracing::info;

use super::Catalog;
use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::integrity::{normalize_domain, validate_name, MAX_NAME_LEN};
use crate::models::{ReferenceKind, SupportedSource, ValidCategory};
use crate::policy::{authorize, Action, Entity, Resource};

impl Catalog {
    pub fn supported_sources(&self, actor: &Actor) -> ServiceResult<Vec<SupportedSource>> {
        authorize(actor, Entity::ReferenceData, &Resource::unowned(), Action::Read)?;
        self.store.supported_sources()
    }

    pub fn add_supported_source(
        &self,
        actor: &Actor,
        domain: &str,
        name: &str,
    ) -> ServiceResult<SupportedSource> {
        authorize(actor, Entity::ReferenceData, &Resource::unowned(), Action::Create)?;
        let domain = normalize_domain(domain)?;
        let name = validate_name("name", name, MAX_NAME_LEN)?;
        let source = self.store.add_supported_source(&domain, &name)?;
        info!(domain = %source.domain, name = %source.name, actor = %actor.label(), "Supported source added");
        Ok(source)
    }

    pub fn remove_supported_source(&self, actor: &Actor, domain: &str) -> ServiceResult<()> {
        authorize(actor, Entity::ReferenceData, &Resource::unowned(), Action::Delete)?;
        let domain = normalize_domain(domain)?;
        if !self.store.remove_supported_source(&domain)? {
            return Err(ServiceError::NotFound("Supported source"));
        }
        info!(domain = %domain, actor = %actor.label(), "Supported source removed");
        Ok(())
    }

    pub fn valid_categories(&self, actor: &Actor) -> ServiceResult<Vec<ValidCategory>> {
        authorize(actor, Entity::ReferenceData, &Resource::unowned(), Action::Read)?;
        self.store.valid_categories()
    }

    pub fn add_valid_category(&self, actor: &Actor, name: &str) -> ServiceResult<ValidCategory> {
        authorize(actor, Entity::ReferenceData, &Resource::unowned(), Action::Create)?;
        let name = validate_name("category", name, MAX_NAME_LEN)?;
        let category = self.store.add_valid_category(&name)?;
        info!(category = %category.name, actor = %actor.label(), "Category added");
        Ok(category)
    }

    pub fn remove_valid_category(&self, actor: &Actor, name: &str) -> ServiceResult<()> {
        authorize(actor, Entity::ReferenceData, &Resource::unowned(), Action::Delete)?;
        if !self.store.remove_valid_category(name.trim())? {
            return Err(ServiceError::NotFound("Category"));
        }
        info!(category = %name.trim(), actor = %actor.label(), "Category removed");
        Ok(())
    }

    /// Changes whenever the list changes; other processes compare it to
    /// decide whether to reload.
    pub fn reference_version(&self, actor: &Actor, kind: ReferenceKind) -> ServiceResult<i64> {
        authorize(actor, Entity::ReferenceData, &Resource::unowned(), Action::Read)?;
        self.store.reference_version(kind)
    }
}
