use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::Catalog;
use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::integrity::{slugify, validate_content, MAX_BLOG_TITLE_LEN, MAX_NAME_LEN};
use crate::models::{now, BlogPost, BlogPostChanges, BlogPostUpdate, NewBlogPost};
use crate::policy::{authorize, permits, Action, Entity, Resource};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BlogPostDraft {
    #[validate(length(min = 1, max = MAX_BLOG_TITLE_LEN, message = "title must be between 1 and 200 characters"))]
    pub title: String,
    /// Derived from the title when absent.
    #[validate(length(min = 1, max = MAX_NAME_LEN))]
    pub slug: Option<String>,
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    pub excerpt: Option<String>,
    #[validate(url(message = "Invalid header image URL"))]
    pub header_image: Option<String>,
    /// Co-authors. Defaults to the creator.
    #[serde(default)]
    pub author_ids: Vec<Uuid>,
    #[serde(default)]
    pub published: bool,
}

fn post_resource(post: &BlogPost) -> Resource {
    Resource::owned_by_any(post.authors()).with_visibility(post.published)
}

fn post_slug(raw: &str) -> ServiceResult<String> {
    let slug = slugify(raw);
    if slug.is_empty() {
        return Err(ServiceError::validation(
            "slug must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

impl Catalog {
    fn load_blog_post(&self, id: Uuid) -> ServiceResult<BlogPost> {
        self.store
            .get_blog_post(id)?
            .ok_or(ServiceError::NotFound("Blog post"))
    }

    /// Co-authors must be existing users. Duplicates are dropped.
    fn check_authors(&self, author_ids: &mut Vec<Uuid>) -> ServiceResult<()> {
        let mut seen = Vec::with_capacity(author_ids.len());
        author_ids.retain(|id| {
            let first = !seen.contains(id);
            seen.push(*id);
            first
        });
        for id in author_ids.iter() {
            if self.store.get_user(*id)?.is_none() {
                return Err(ServiceError::validation(format!("unknown author: {id}")));
            }
        }
        Ok(())
    }

    pub fn create_blog_post(
        &self,
        actor: &Actor,
        mut draft: BlogPostDraft,
    ) -> ServiceResult<BlogPost> {
        authorize(actor, Entity::BlogPost, &Resource::unowned(), Action::Create)?;

        draft.title = draft.title.trim().to_string();
        draft.validate()?;
        let content = validate_content(&draft.content)?;
        let slug = post_slug(draft.slug.as_deref().unwrap_or(&draft.title))?;

        let mut author_ids = draft.author_ids;
        if author_ids.is_empty() {
            author_ids.extend(actor.id());
        }
        self.check_authors(&mut author_ids)?;

        let post = self.store.insert_blog_post(NewBlogPost {
            id: Uuid::new_v4(),
            title: draft.title,
            slug,
            content,
            excerpt: draft.excerpt,
            header_image: draft.header_image,
            author_id: actor.id(),
            author_ids,
            published: draft.published,
            published_at: draft.published.then(now),
        })?;
        info!(post_id = %post.id, slug = %post.slug, actor = %actor.label(), "Blog post created");
        Ok(post)
    }

    /// Unpublished posts look missing to anyone but their authors and admins.
    pub fn get_blog_post(&self, actor: &Actor, id: Uuid) -> ServiceResult<BlogPost> {
        let post = self.load_blog_post(id)?;
        authorize(actor, Entity::BlogPost, &post_resource(&post), Action::Read)?;
        Ok(post)
    }

    pub fn get_blog_post_by_slug(&self, actor: &Actor, slug: &str) -> ServiceResult<BlogPost> {
        let post = self
            .store
            .get_blog_post_by_slug(slug)?
            .ok_or(ServiceError::NotFound("Blog post"))?;
        authorize(actor, Entity::BlogPost, &post_resource(&post), Action::Read)?;
        Ok(post)
    }

    pub fn list_blog_posts(&self, actor: &Actor) -> ServiceResult<Vec<BlogPost>> {
        Ok(self
            .store
            .list_blog_posts()?
            .into_iter()
            .filter(|post| permits(actor, Entity::BlogPost, &post_resource(post), Action::Read))
            .collect())
    }

    /// Publishing stamps `published_at`; unpublishing clears it.
    pub fn update_blog_post(
        &self,
        actor: &Actor,
        id: Uuid,
        mut update: BlogPostUpdate,
    ) -> ServiceResult<BlogPost> {
        let post = self.load_blog_post(id)?;
        authorize(actor, Entity::BlogPost, &post_resource(&post), Action::Write)?;

        if let Some(title) = &update.title {
            update.title = Some(title.trim().to_string());
        }
        update.validate()?;
        if let Some(author_ids) = update.author_ids.as_mut() {
            self.check_authors(author_ids)?;
        }

        let mut changes = BlogPostChanges {
            excerpt: update.excerpt,
            header_image: update.header_image,
            author_ids: update.author_ids,
            title: update.title,
            published: update.published,
            ..Default::default()
        };
        if let Some(slug) = &update.slug {
            changes.slug = Some(post_slug(slug)?);
        }
        if let Some(content) = &update.content {
            changes.content = Some(validate_content(content)?);
        }
        match update.published {
            Some(true) if !post.published => changes.published_at = Some(Some(now())),
            Some(false) if post.published => changes.published_at = Some(None),
            _ => {}
        }

        self.store.update_blog_post(id, &changes)
    }

    pub fn delete_blog_post(&self, actor: &Actor, id: Uuid) -> ServiceResult<()> {
        let post = self.load_blog_post(id)?;
        authorize(actor, Entity::BlogPost, &post_resource(&post), Action::Delete)?;
        if !self.store.delete_blog_post(id)? {
            return Err(ServiceError::NotFound("Blog post"));
        }
        info!(post_id = %id, actor = %actor.label(), "Blog post deleted");
        Ok(())
    }
}
