//! Records owned by the scraping pipeline: run logs, OAuth credentials and
//! per-platform search terms.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::Catalog;
use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::integrity::{validate_name, MAX_NAME_LEN};
use crate::models::{NewOAuthConfig, NewScrapingLog, OAuthConfig, ScraperSearchTerms, ScrapingLog};
use crate::pagination::MAX_PER_PAGE;
use crate::policy::{authorize, Action, Entity, Resource};

/// Summary of one scraper run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapingReport {
    pub user_id: Option<Uuid>,
    pub source: String,
    pub products_found: i32,
    pub products_added: i32,
    pub products_updated: i32,
    pub duration_seconds: Option<f64>,
    pub status: String,
    pub error_message: Option<String>,
}

fn platform_name(platform: &str) -> ServiceResult<String> {
    Ok(validate_name("platform", platform, MAX_NAME_LEN)?.to_lowercase())
}

impl Catalog {
    pub fn record_scraping_log(
        &self,
        actor: &Actor,
        report: ScrapingReport,
    ) -> ServiceResult<ScrapingLog> {
        authorize(actor, Entity::ScrapingLog, &Resource::unowned(), Action::Create)?;
        if report.products_found < 0 || report.products_added < 0 || report.products_updated < 0 {
            return Err(ServiceError::validation("product counts must not be negative"));
        }
        let source = validate_name("source", &report.source, MAX_NAME_LEN)?;
        let status = validate_name("status", &report.status, MAX_NAME_LEN)?;

        let log = self.store.insert_scraping_log(NewScrapingLog {
            id: Uuid::new_v4(),
            user_id: report.user_id,
            source,
            products_found: report.products_found,
            products_added: report.products_added,
            products_updated: report.products_updated,
            duration_seconds: report.duration_seconds,
            status,
            error_message: report.error_message,
        })?;
        info!(
            source = %log.source,
            status = %log.status,
            found = log.products_found,
            added = log.products_added,
            "Scraping run recorded"
        );
        Ok(log)
    }

    /// Newest first.
    pub fn scraping_logs(&self, actor: &Actor, limit: i64) -> ServiceResult<Vec<ScrapingLog>> {
        authorize(actor, Entity::ScrapingLog, &Resource::unowned(), Action::Read)?;
        self.store.scraping_logs(limit.clamp(1, MAX_PER_PAGE))
    }

    /// Creates or replaces the credentials for `config.platform`.
    pub fn put_oauth_config(
        &self,
        actor: &Actor,
        mut config: NewOAuthConfig,
    ) -> ServiceResult<OAuthConfig> {
        authorize(actor, Entity::OAuthConfig, &Resource::unowned(), Action::Create)?;
        config.platform = platform_name(&config.platform)?;
        let stored = self.store.upsert_oauth_config(config)?;
        info!(platform = %stored.platform, "OAuth config stored");
        Ok(stored)
    }

    pub fn oauth_config(&self, actor: &Actor, platform: &str) -> ServiceResult<OAuthConfig> {
        authorize(actor, Entity::OAuthConfig, &Resource::unowned(), Action::Read)?;
        self.store
            .get_oauth_config(&platform_name(platform)?)?
            .ok_or(ServiceError::NotFound("OAuth config"))
    }

    /// Replaces the platform's search terms. Blank and repeated terms are
    /// dropped.
    pub fn put_search_terms(
        &self,
        actor: &Actor,
        platform: &str,
        terms: Vec<String>,
    ) -> ServiceResult<ScraperSearchTerms> {
        authorize(
            actor,
            Entity::ScraperSearchTerms,
            &Resource::unowned(),
            Action::Write,
        )?;
        let platform = platform_name(platform)?;

        let mut cleaned: Vec<String> = Vec::with_capacity(terms.len());
        for term in terms {
            let term = term.trim();
            if !term.is_empty() && !cleaned.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                cleaned.push(term.to_string());
            }
        }

        let stored = self.store.upsert_search_terms(&platform, cleaned)?;
        info!(platform = %platform, count = stored.search_terms.len(), actor = %actor.label(), "Search terms updated");
        Ok(stored)
    }

    pub fn search_terms(&self, actor: &Actor, platform: &str) -> ServiceResult<ScraperSearchTerms> {
        authorize(
            actor,
            Entity::ScraperSearchTerms,
            &Resource::unowned(),
            Action::Read,
        )?;
        self.store
            .get_search_terms(&platform_name(platform)?)?
            .ok_or(ServiceError::NotFound("Search terms"))
    }
}
