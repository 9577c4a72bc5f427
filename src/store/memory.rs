//! In-process backend with the same keys and cascades as the Postgres
//! schema. Every method holds the table lock for its whole duration, which
//! gives each call the same atomicity a single transaction would.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::Store;
use crate::auth::{Actor, Role};
use crate::error::{ServiceError, ServiceResult};
use crate::guard::enforce_role_change;
use crate::integrity::UniqueKey;
use crate::models::*;
use crate::pagination::PaginationParams;
use crate::telemetry::record_unique_conflict;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    product_editors: Vec<ProductEditor>,
    product_urls: Vec<ProductUrl>,
    tags: Vec<Tag>,
    product_tags: Vec<(Uuid, Uuid)>,
    ratings: Vec<Rating>,
    discussions: Vec<Discussion>,
    blog_posts: Vec<BlogPost>,
    collections: Vec<Collection>,
    collection_products: Vec<(Uuid, Uuid)>,
    activities: Vec<UserActivity>,
    scraping_logs: Vec<ScrapingLog>,
    oauth_configs: Vec<OAuthConfig>,
    search_terms: Vec<ScraperSearchTerms>,
    requests: Vec<UserRequest>,
    categories: Vec<ValidCategory>,
    sources: Vec<SupportedSource>,
    versions: HashMap<ReferenceKind, i64>,
}

fn conflict(key: UniqueKey) -> ServiceError {
    record_unique_conflict(key.constraint_name());
    ServiceError::Conflict(key)
}

fn missing_reference(what: &str) -> ServiceError {
    ServiceError::Validation(format!("Referenced {what} does not exist"))
}

impl Tables {
    fn user_exists(&self, id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn product_exists(&self, id: Uuid) -> bool {
        self.products.iter().any(|p| p.id == id)
    }

    fn bump(&mut self, kind: ReferenceKind) {
        *self.versions.entry(kind).or_insert(0) += 1;
    }

    /// `root` and every reply below it.
    fn discussion_subtree(&self, root: Uuid) -> Vec<Uuid> {
        let mut ids = vec![root];
        let mut i = 0;
        while i < ids.len() {
            let parent = ids[i];
            ids.extend(
                self.discussions
                    .iter()
                    .filter(|d| d.parent_id == Some(parent))
                    .map(|d| d.id),
            );
            i += 1;
        }
        ids
    }

    fn remove_discussions(&mut self, roots: Vec<Uuid>) {
        let mut doomed = Vec::new();
        for root in roots {
            doomed.extend(self.discussion_subtree(root));
        }
        self.discussions.retain(|d| !doomed.contains(&d.id));
    }

    fn remove_product(&mut self, id: Uuid) -> bool {
        let before = self.products.len();
        self.products.retain(|p| p.id != id);
        if self.products.len() == before {
            return false;
        }

        self.ratings.retain(|r| r.product_id != id);
        let roots = self
            .discussions
            .iter()
            .filter(|d| d.product_id == id)
            .map(|d| d.id)
            .collect();
        self.remove_discussions(roots);
        self.product_editors.retain(|e| e.product_id != id);
        self.product_urls.retain(|u| u.product_id != id);
        self.product_tags.retain(|(p, _)| *p != id);
        self.collection_products.retain(|(_, p)| *p != id);
        self.requests.retain(|r| r.product_id != Some(id));
        for activity in self.activities.iter_mut() {
            if activity.product_id == Some(id) {
                activity.product_id = None;
            }
        }
        true
    }

    fn update_user_guarded(
        &mut self,
        actor: &Actor,
        target: Uuid,
        patch: &UserPatch,
    ) -> ServiceResult<User> {
        let current_role = self
            .users
            .iter()
            .find(|u| u.id == target)
            .map(|u| u.role)
            .ok_or(ServiceError::NotFound("User"))?;

        if let Some(requested) = patch.role {
            let actor_role_now = actor
                .id()
                .and_then(|id| self.users.iter().find(|u| u.id == id).map(|u| u.role));
            enforce_role_change(actor, actor_role_now, target, current_role, requested)?;
        }

        if let Some(username) = &patch.username {
            if self
                .users
                .iter()
                .any(|u| u.id != target && &u.username == username)
            {
                return Err(conflict(UniqueKey::UserUsername));
            }
        }

        let row = self
            .users
            .iter_mut()
            .find(|u| u.id == target)
            .ok_or(ServiceError::NotFound("User"))?;
        patch.apply(row);
        row.updated_at = now();
        Ok(row.clone())
    }

    fn add_editor(&mut self, product_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        if !self.product_exists(product_id) {
            return Err(missing_reference("product"));
        }
        if !self.user_exists(user_id) {
            return Err(missing_reference("user"));
        }
        if self
            .product_editors
            .iter()
            .any(|e| e.product_id == product_id && e.user_id == user_id)
        {
            return Ok(false);
        }
        self.product_editors.push(ProductEditor {
            id: Uuid::new_v4(),
            product_id,
            user_id,
            created_at: now(),
        });
        Ok(true)
    }

    fn add_source(&mut self, domain: &str, name: &str) -> ServiceResult<SupportedSource> {
        if self.sources.iter().any(|s| s.domain == domain) {
            return Err(conflict(UniqueKey::SupportedSourceDomain));
        }
        let row = SupportedSource {
            id: Uuid::new_v4(),
            domain: domain.to_string(),
            name: name.to_string(),
            created_at: now(),
        };
        self.sources.push(row.clone());
        self.bump(ReferenceKind::SupportedSources);
        Ok(row)
    }

    fn remove_user(&mut self, id: Uuid) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.id != id);
        if self.users.len() == before {
            return false;
        }

        let detach = |field: &mut Option<Uuid>| {
            if *field == Some(id) {
                *field = None;
            }
        };

        for product in self.products.iter_mut() {
            detach(&mut product.created_by);
            detach(&mut product.banned_by);
            detach(&mut product.last_edited_by);
        }
        for url in self.product_urls.iter_mut() {
            detach(&mut url.created_by);
        }
        for discussion in self.discussions.iter_mut() {
            detach(&mut discussion.blocked_by);
        }
        for post in self.blog_posts.iter_mut() {
            detach(&mut post.author_id);
            post.author_ids.retain(|author| *author != id);
        }
        for log in self.scraping_logs.iter_mut() {
            detach(&mut log.user_id);
        }
        for request in self.requests.iter_mut() {
            detach(&mut request.reviewed_by);
        }

        self.ratings.retain(|r| r.user_id != id);
        let roots = self
            .discussions
            .iter()
            .filter(|d| d.user_id == id)
            .map(|d| d.id)
            .collect();
        self.remove_discussions(roots);
        self.product_editors.retain(|e| e.user_id != id);
        let owned: Vec<Uuid> = self
            .collections
            .iter()
            .filter(|c| c.user_id == id)
            .map(|c| c.id)
            .collect();
        self.collections.retain(|c| c.user_id != id);
        self.collection_products
            .retain(|(c, _)| !owned.contains(c));
        self.activities.retain(|a| a.user_id != id);
        self.requests.retain(|r| r.user_id != id);
        true
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| ServiceError::storage("in-memory store lock poisoned"))
    }
}

fn page<T: Clone>(rows: impl Iterator<Item = T>, params: &PaginationParams) -> Vec<T> {
    rows.skip(params.offset() as usize)
        .take(params.limit() as usize)
        .collect()
}

impl Store for MemoryStore {
    fn insert_user(&self, user: NewUser) -> ServiceResult<User> {
        let mut t = self.lock()?;
        if t.users.iter().any(|u| u.username == user.username) {
            return Err(conflict(UniqueKey::UserUsername));
        }
        if user.external_id.is_some()
            && t.users.iter().any(|u| u.external_id == user.external_id)
        {
            return Err(conflict(UniqueKey::UserExternalId));
        }

        let ts = now();
        let row = User {
            id: user.id,
            external_id: user.external_id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bio: None,
            location: None,
            website: None,
            role: user.role,
            created_at: ts,
            updated_at: ts,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    fn get_user(&self, id: Uuid) -> ServiceResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    fn user_role(&self, id: Uuid) -> ServiceResult<Option<Role>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.role))
    }

    fn update_user_guarded(
        &self,
        actor: &Actor,
        target: Uuid,
        patch: &UserPatch,
    ) -> ServiceResult<User> {
        self.lock()?.update_user_guarded(actor, target, patch)
    }

    fn delete_user(&self, id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock()?.remove_user(id))
    }

    fn insert_product(&self, product: NewProduct) -> ServiceResult<Product> {
        let mut t = self.lock()?;
        if t.products.iter().any(|p| p.slug == product.slug) {
            return Err(conflict(UniqueKey::ProductSlug));
        }
        if t.products.iter().any(|p| p.url == product.url) {
            return Err(conflict(UniqueKey::ProductUrl));
        }
        if product.external_id.is_some()
            && t.products
                .iter()
                .any(|p| p.source == product.source && p.external_id == product.external_id)
        {
            return Err(conflict(UniqueKey::ProductSourceExternalId));
        }
        if let Some(creator) = product.created_by {
            if !t.user_exists(creator) {
                return Err(missing_reference("user"));
            }
        }

        let ts = now();
        let row = Product {
            id: product.id,
            name: product.name,
            slug: product.slug,
            description: product.description,
            category: product.category,
            source: product.source,
            external_id: product.external_id,
            url: product.url,
            image_url: product.image_url,
            created_by: product.created_by,
            banned: false,
            banned_by: None,
            banned_at: None,
            banned_reason: None,
            last_edited_by: None,
            last_edited_at: None,
            created_at: ts,
            updated_at: ts,
        };
        t.products.push(row.clone());
        Ok(row)
    }

    fn get_product(&self, id: Uuid) -> ServiceResult<Option<Product>> {
        Ok(self.lock()?.products.iter().find(|p| p.id == id).cloned())
    }

    fn get_product_by_slug(&self, slug: &str) -> ServiceResult<Option<Product>> {
        Ok(self
            .lock()?
            .products
            .iter()
            .find(|p| p.slug == slug)
            .cloned())
    }

    fn product_slug_exists(&self, slug: &str) -> ServiceResult<bool> {
        Ok(self.lock()?.products.iter().any(|p| p.slug == slug))
    }

    fn list_products(
        &self,
        include_banned: bool,
        params: &PaginationParams,
    ) -> ServiceResult<(Vec<Product>, i64)> {
        let t = self.lock()?;
        let visible = || {
            t.products
                .iter()
                .rev()
                .filter(move |p| include_banned || !p.banned)
        };
        let total = visible().count() as i64;
        Ok((page(visible().cloned(), params), total))
    }

    fn update_product(
        &self,
        id: Uuid,
        patch: &ProductPatch,
        edited_by: Option<Uuid>,
    ) -> ServiceResult<Product> {
        let mut t = self.lock()?;
        let row = t
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ServiceError::NotFound("Product"))?;
        patch.apply(row);
        let ts = now();
        row.last_edited_by = edited_by;
        row.last_edited_at = Some(ts);
        row.updated_at = ts;
        Ok(row.clone())
    }

    fn set_product_ban(&self, id: Uuid, change: &BanChange) -> ServiceResult<Product> {
        let mut t = self.lock()?;
        let row = t
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ServiceError::NotFound("Product"))?;
        row.banned = change.banned;
        row.banned_by = change.banned_by;
        row.banned_at = change.banned_at;
        row.banned_reason = change.banned_reason.clone();
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_product(&self, id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock()?.remove_product(id))
    }

    fn add_product_editor(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        self.lock()?.add_editor(product_id, user_id)
    }

    fn remove_product_editor(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.product_editors.len();
        t.product_editors
            .retain(|e| !(e.product_id == product_id && e.user_id == user_id));
        Ok(t.product_editors.len() != before)
    }

    fn product_editors(&self, product_id: Uuid) -> ServiceResult<Vec<ProductEditor>> {
        Ok(self
            .lock()?
            .product_editors
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect())
    }

    fn insert_product_url(&self, url: NewProductUrl) -> ServiceResult<ProductUrl> {
        let mut t = self.lock()?;
        if !t.product_exists(url.product_id) {
            return Err(missing_reference("product"));
        }
        if t.product_urls
            .iter()
            .any(|u| u.product_id == url.product_id && u.url == url.url)
        {
            return Err(conflict(UniqueKey::ProductUrlEntry));
        }
        let row = ProductUrl {
            id: url.id,
            product_id: url.product_id,
            url: url.url,
            description: url.description,
            created_by: url.created_by,
            created_at: now(),
        };
        t.product_urls.push(row.clone());
        Ok(row)
    }

    fn get_product_url(&self, id: Uuid) -> ServiceResult<Option<ProductUrl>> {
        Ok(self
            .lock()?
            .product_urls
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    fn delete_product_url(&self, id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.product_urls.len();
        t.product_urls.retain(|u| u.id != id);
        Ok(t.product_urls.len() != before)
    }

    fn product_urls(&self, product_id: Uuid) -> ServiceResult<Vec<ProductUrl>> {
        Ok(self
            .lock()?
            .product_urls
            .iter()
            .filter(|u| u.product_id == product_id)
            .cloned()
            .collect())
    }

    fn ensure_tag(&self, name: &str) -> ServiceResult<Tag> {
        let mut t = self.lock()?;
        if let Some(tag) = t.tags.iter().find(|tag| tag.name == name) {
            return Ok(tag.clone());
        }
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now(),
        };
        t.tags.push(tag.clone());
        Ok(tag)
    }

    fn find_tag(&self, name: &str) -> ServiceResult<Option<Tag>> {
        Ok(self.lock()?.tags.iter().find(|t| t.name == name).cloned())
    }

    fn tag_product(&self, product_id: Uuid, tag_id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        if !t.product_exists(product_id) {
            return Err(missing_reference("product"));
        }
        if !t.tags.iter().any(|tag| tag.id == tag_id) {
            return Err(missing_reference("tag"));
        }
        if t.product_tags.contains(&(product_id, tag_id)) {
            return Ok(false);
        }
        t.product_tags.push((product_id, tag_id));
        Ok(true)
    }

    fn untag_product(&self, product_id: Uuid, tag_id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.product_tags.len();
        t.product_tags.retain(|pair| *pair != (product_id, tag_id));
        Ok(t.product_tags.len() != before)
    }

    fn product_tags(&self, product_id: Uuid) -> ServiceResult<Vec<Tag>> {
        let t = self.lock()?;
        Ok(t.product_tags
            .iter()
            .filter(|(p, _)| *p == product_id)
            .filter_map(|(_, tag_id)| t.tags.iter().find(|tag| tag.id == *tag_id).cloned())
            .collect())
    }

    fn insert_rating(&self, rating: NewRating) -> ServiceResult<Rating> {
        let mut t = self.lock()?;
        if !t.product_exists(rating.product_id) {
            return Err(missing_reference("product"));
        }
        if !t.user_exists(rating.user_id) {
            return Err(missing_reference("user"));
        }
        if t.ratings
            .iter()
            .any(|r| r.product_id == rating.product_id && r.user_id == rating.user_id)
        {
            return Err(conflict(UniqueKey::RatingProductUser));
        }
        let ts = now();
        let row = Rating {
            id: rating.id,
            product_id: rating.product_id,
            user_id: rating.user_id,
            rating: rating.rating,
            created_at: ts,
            updated_at: ts,
        };
        t.ratings.push(row.clone());
        Ok(row)
    }

    fn get_rating(&self, id: Uuid) -> ServiceResult<Option<Rating>> {
        Ok(self.lock()?.ratings.iter().find(|r| r.id == id).cloned())
    }

    fn find_rating(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<Option<Rating>> {
        Ok(self
            .lock()?
            .ratings
            .iter()
            .find(|r| r.product_id == product_id && r.user_id == user_id)
            .cloned())
    }

    fn update_rating(&self, id: Uuid, value: i32) -> ServiceResult<Rating> {
        let mut t = self.lock()?;
        let row = t
            .ratings
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ServiceError::NotFound("Rating"))?;
        row.rating = value;
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_rating(&self, id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.ratings.len();
        t.ratings.retain(|r| r.id != id);
        Ok(t.ratings.len() != before)
    }

    fn product_ratings(&self, product_id: Uuid) -> ServiceResult<Vec<Rating>> {
        Ok(self
            .lock()?
            .ratings
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }

    fn insert_discussion(&self, discussion: NewDiscussion) -> ServiceResult<Discussion> {
        let mut t = self.lock()?;
        if !t.product_exists(discussion.product_id) {
            return Err(missing_reference("product"));
        }
        if !t.user_exists(discussion.user_id) {
            return Err(missing_reference("user"));
        }
        if let Some(parent) = discussion.parent_id {
            if !t.discussions.iter().any(|d| d.id == parent) {
                return Err(missing_reference("discussion"));
            }
        }
        let ts = now();
        let row = Discussion {
            id: discussion.id,
            product_id: discussion.product_id,
            user_id: discussion.user_id,
            parent_id: discussion.parent_id,
            content: discussion.content,
            blocked: false,
            blocked_by: None,
            blocked_reason: None,
            blocked_at: None,
            created_at: ts,
            updated_at: ts,
        };
        t.discussions.push(row.clone());
        Ok(row)
    }

    fn get_discussion(&self, id: Uuid) -> ServiceResult<Option<Discussion>> {
        Ok(self
            .lock()?
            .discussions
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    fn update_discussion_content(&self, id: Uuid, content: &str) -> ServiceResult<Discussion> {
        let mut t = self.lock()?;
        let row = t
            .discussions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(ServiceError::NotFound("Discussion"))?;
        row.content = content.to_string();
        row.updated_at = now();
        Ok(row.clone())
    }

    fn set_discussion_block(&self, id: Uuid, change: &BlockChange) -> ServiceResult<Discussion> {
        let mut t = self.lock()?;
        let row = t
            .discussions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(ServiceError::NotFound("Discussion"))?;
        row.blocked = change.blocked;
        row.blocked_by = change.blocked_by;
        row.blocked_reason = change.blocked_reason.clone();
        row.blocked_at = change.blocked_at;
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_discussion(&self, id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        if !t.discussions.iter().any(|d| d.id == id) {
            return Ok(false);
        }
        t.remove_discussions(vec![id]);
        Ok(true)
    }

    fn product_discussions(&self, product_id: Uuid) -> ServiceResult<Vec<Discussion>> {
        Ok(self
            .lock()?
            .discussions
            .iter()
            .filter(|d| d.product_id == product_id)
            .cloned()
            .collect())
    }

    fn insert_blog_post(&self, post: NewBlogPost) -> ServiceResult<BlogPost> {
        let mut t = self.lock()?;
        if t.blog_posts.iter().any(|p| p.slug == post.slug) {
            return Err(conflict(UniqueKey::BlogPostSlug));
        }
        let ts = now();
        let row = BlogPost {
            id: post.id,
            title: post.title,
            slug: post.slug,
            content: post.content,
            excerpt: post.excerpt,
            header_image: post.header_image,
            author_id: post.author_id,
            author_ids: post.author_ids,
            published: post.published,
            published_at: post.published_at,
            created_at: ts,
            updated_at: ts,
        };
        t.blog_posts.push(row.clone());
        Ok(row)
    }

    fn get_blog_post(&self, id: Uuid) -> ServiceResult<Option<BlogPost>> {
        Ok(self.lock()?.blog_posts.iter().find(|p| p.id == id).cloned())
    }

    fn get_blog_post_by_slug(&self, slug: &str) -> ServiceResult<Option<BlogPost>> {
        Ok(self
            .lock()?
            .blog_posts
            .iter()
            .find(|p| p.slug == slug)
            .cloned())
    }

    fn list_blog_posts(&self) -> ServiceResult<Vec<BlogPost>> {
        Ok(self.lock()?.blog_posts.iter().rev().cloned().collect())
    }

    fn update_blog_post(&self, id: Uuid, changes: &BlogPostChanges) -> ServiceResult<BlogPost> {
        let mut t = self.lock()?;
        if let Some(slug) = &changes.slug {
            if t.blog_posts.iter().any(|p| p.id != id && &p.slug == slug) {
                return Err(conflict(UniqueKey::BlogPostSlug));
            }
        }
        let row = t
            .blog_posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ServiceError::NotFound("Blog post"))?;
        changes.apply(row);
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_blog_post(&self, id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.blog_posts.len();
        t.blog_posts.retain(|p| p.id != id);
        Ok(t.blog_posts.len() != before)
    }

    fn insert_collection(&self, collection: NewCollection) -> ServiceResult<Collection> {
        let mut t = self.lock()?;
        if !t.user_exists(collection.user_id) {
            return Err(missing_reference("user"));
        }
        let ts = now();
        let row = Collection {
            id: collection.id,
            user_id: collection.user_id,
            name: collection.name,
            description: collection.description,
            is_public: collection.is_public,
            created_at: ts,
            updated_at: ts,
        };
        t.collections.push(row.clone());
        Ok(row)
    }

    fn get_collection(&self, id: Uuid) -> ServiceResult<Option<Collection>> {
        Ok(self
            .lock()?
            .collections
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    fn update_collection(&self, id: Uuid, patch: &CollectionPatch) -> ServiceResult<Collection> {
        let mut t = self.lock()?;
        let row = t
            .collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ServiceError::NotFound("Collection"))?;
        patch.apply(row);
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_collection(&self, id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.collections.len();
        t.collections.retain(|c| c.id != id);
        t.collection_products.retain(|(c, _)| *c != id);
        Ok(t.collections.len() != before)
    }

    fn add_collection_product(
        &self,
        collection_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        if !t.collections.iter().any(|c| c.id == collection_id) {
            return Err(missing_reference("collection"));
        }
        if !t.product_exists(product_id) {
            return Err(missing_reference("product"));
        }
        if t.collection_products.contains(&(collection_id, product_id)) {
            return Ok(false);
        }
        t.collection_products.push((collection_id, product_id));
        if let Some(c) = t.collections.iter_mut().find(|c| c.id == collection_id) {
            c.updated_at = now();
        }
        Ok(true)
    }

    fn remove_collection_product(
        &self,
        collection_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.collection_products.len();
        t.collection_products
            .retain(|pair| *pair != (collection_id, product_id));
        let removed = t.collection_products.len() != before;
        if removed {
            if let Some(c) = t.collections.iter_mut().find(|c| c.id == collection_id) {
                c.updated_at = now();
            }
        }
        Ok(removed)
    }

    fn collection_product_ids(&self, collection_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        Ok(self
            .lock()?
            .collection_products
            .iter()
            .filter(|(c, _)| *c == collection_id)
            .map(|(_, p)| *p)
            .collect())
    }

    fn collections_of(&self, user_id: Uuid) -> ServiceResult<Vec<Collection>> {
        Ok(self
            .lock()?
            .collections
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    fn public_collections(
        &self,
        params: &PaginationParams,
    ) -> ServiceResult<(Vec<Collection>, i64)> {
        let t = self.lock()?;
        let public = || t.collections.iter().rev().filter(|c| c.is_public);
        let total = public().count() as i64;
        Ok((page(public().cloned(), params), total))
    }

    fn insert_activity(&self, activity: NewUserActivity) -> ServiceResult<UserActivity> {
        let mut t = self.lock()?;
        if !t.user_exists(activity.user_id) {
            return Err(missing_reference("user"));
        }
        let row = UserActivity {
            id: activity.id,
            user_id: activity.user_id,
            activity_type: activity.activity_type,
            product_id: activity.product_id,
            metadata: activity.metadata,
            created_at: now(),
        };
        t.activities.push(row.clone());
        Ok(row)
    }

    fn activities_of(&self, user_id: Uuid, limit: i64) -> ServiceResult<Vec<UserActivity>> {
        Ok(self
            .lock()?
            .activities
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn purge_activities_before(&self, cutoff: NaiveDateTime) -> ServiceResult<usize> {
        let mut t = self.lock()?;
        let before = t.activities.len();
        t.activities.retain(|a| a.created_at >= cutoff);
        Ok(before - t.activities.len())
    }

    fn insert_scraping_log(&self, log: NewScrapingLog) -> ServiceResult<ScrapingLog> {
        let mut t = self.lock()?;
        let row = ScrapingLog {
            id: log.id,
            user_id: log.user_id,
            source: log.source,
            products_found: log.products_found,
            products_added: log.products_added,
            products_updated: log.products_updated,
            duration_seconds: log.duration_seconds,
            status: log.status,
            error_message: log.error_message,
            created_at: now(),
        };
        t.scraping_logs.push(row.clone());
        Ok(row)
    }

    fn scraping_logs(&self, limit: i64) -> ServiceResult<Vec<ScrapingLog>> {
        Ok(self
            .lock()?
            .scraping_logs
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn upsert_oauth_config(&self, config: NewOAuthConfig) -> ServiceResult<OAuthConfig> {
        let mut t = self.lock()?;
        let ts = now();
        if let Some(row) = t
            .oauth_configs
            .iter_mut()
            .find(|c| c.platform == config.platform)
        {
            row.client_id = config.client_id;
            row.client_secret = config.client_secret;
            row.redirect_uri = config.redirect_uri;
            row.access_token = config.access_token;
            row.refresh_token = config.refresh_token;
            row.token_expires_at = config.token_expires_at;
            row.updated_at = ts;
            return Ok(row.clone());
        }
        let row = OAuthConfig {
            id: Uuid::new_v4(),
            platform: config.platform,
            client_id: config.client_id,
            client_secret: config.client_secret,
            redirect_uri: config.redirect_uri,
            access_token: config.access_token,
            refresh_token: config.refresh_token,
            token_expires_at: config.token_expires_at,
            created_at: ts,
            updated_at: ts,
        };
        t.oauth_configs.push(row.clone());
        Ok(row)
    }

    fn get_oauth_config(&self, platform: &str) -> ServiceResult<Option<OAuthConfig>> {
        Ok(self
            .lock()?
            .oauth_configs
            .iter()
            .find(|c| c.platform == platform)
            .cloned())
    }

    fn upsert_search_terms(
        &self,
        platform: &str,
        terms: Vec<String>,
    ) -> ServiceResult<ScraperSearchTerms> {
        let mut t = self.lock()?;
        let ts = now();
        let row = match t.search_terms.iter_mut().find(|s| s.platform == platform) {
            Some(row) => {
                row.search_terms = terms;
                row.updated_at = ts;
                row.clone()
            }
            None => {
                let row = ScraperSearchTerms {
                    id: Uuid::new_v4(),
                    platform: platform.to_string(),
                    search_terms: terms,
                    created_at: ts,
                    updated_at: ts,
                };
                t.search_terms.push(row.clone());
                row
            }
        };
        t.bump(ReferenceKind::SearchTerms);
        Ok(row)
    }

    fn get_search_terms(&self, platform: &str) -> ServiceResult<Option<ScraperSearchTerms>> {
        Ok(self
            .lock()?
            .search_terms
            .iter()
            .find(|s| s.platform == platform)
            .cloned())
    }

    fn insert_request(&self, request: NewUserRequest) -> ServiceResult<UserRequest> {
        let mut t = self.lock()?;
        if !t.user_exists(request.user_id) {
            return Err(missing_reference("user"));
        }
        if let Some(product_id) = request.product_id {
            if !t.product_exists(product_id) {
                return Err(missing_reference("product"));
            }
        }
        if t.requests.iter().any(|r| {
            r.status == RequestStatus::Pending
                && r.user_id == request.user_id
                && r.request_type == request.request_type
                && r.product_id == request.product_id
        }) {
            return Err(conflict(UniqueKey::PendingRequest));
        }
        let ts = now();
        let row = UserRequest {
            id: request.id,
            user_id: request.user_id,
            request_type: request.request_type,
            status: RequestStatus::Pending,
            product_id: request.product_id,
            reason: request.reason,
            reviewed_by: None,
            reviewed_at: None,
            reviewer_note: None,
            created_at: ts,
            updated_at: ts,
        };
        t.requests.push(row.clone());
        Ok(row)
    }

    fn get_request(&self, id: Uuid) -> ServiceResult<Option<UserRequest>> {
        Ok(self.lock()?.requests.iter().find(|r| r.id == id).cloned())
    }

    fn list_requests(&self, user_id: Option<Uuid>) -> ServiceResult<Vec<UserRequest>> {
        Ok(self
            .lock()?
            .requests
            .iter()
            .rev()
            .filter(|r| user_id.is_none_or(|id| r.user_id == id))
            .cloned()
            .collect())
    }

    fn review_request(
        &self,
        actor: &Actor,
        id: Uuid,
        review: &RequestReview,
        effect: Option<&ApprovalEffect>,
    ) -> ServiceResult<UserRequest> {
        let mut t = self.lock()?;
        let status = t
            .requests
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.status)
            .ok_or(ServiceError::NotFound("Request"))?;
        if status != RequestStatus::Pending {
            return Err(ServiceError::StateConflict(format!(
                "Request already {status}"
            )));
        }

        // Each effect validates before it mutates, so running it first keeps
        // the request pending when it fails.
        match effect {
            Some(ApprovalEffect::AddEditor {
                product_id,
                user_id,
            }) => {
                t.add_editor(*product_id, *user_id)?;
            }
            Some(ApprovalEffect::GrantRole { user_id, role }) => {
                t.update_user_guarded(actor, *user_id, &UserPatch::role_only(*role))?;
            }
            Some(ApprovalEffect::AddSource { domain }) => {
                match t.add_source(domain, domain) {
                    Ok(_) | Err(ServiceError::Conflict(UniqueKey::SupportedSourceDomain)) => {}
                    Err(e) => return Err(e),
                }
            }
            None => {}
        }

        let row = t
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ServiceError::NotFound("Request"))?;
        row.status = review.status;
        row.reviewed_by = review.reviewed_by;
        row.reviewed_at = review.reviewed_at;
        row.reviewer_note = review.reviewer_note.clone();
        row.updated_at = now();
        Ok(row.clone())
    }

    fn delete_request(&self, id: Uuid) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.requests.len();
        t.requests.retain(|r| r.id != id);
        Ok(t.requests.len() != before)
    }

    fn valid_categories(&self) -> ServiceResult<Vec<ValidCategory>> {
        let mut rows = self.lock()?.categories.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn add_valid_category(&self, name: &str) -> ServiceResult<ValidCategory> {
        let mut t = self.lock()?;
        if t.categories.iter().any(|c| c.name == name) {
            return Err(conflict(UniqueKey::ValidCategoryName));
        }
        let row = ValidCategory {
            name: name.to_string(),
            created_at: now(),
        };
        t.categories.push(row.clone());
        t.bump(ReferenceKind::ValidCategories);
        Ok(row)
    }

    fn remove_valid_category(&self, name: &str) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.categories.len();
        t.categories.retain(|c| c.name != name);
        let removed = t.categories.len() != before;
        if removed {
            t.bump(ReferenceKind::ValidCategories);
        }
        Ok(removed)
    }

    fn supported_sources(&self) -> ServiceResult<Vec<SupportedSource>> {
        let mut rows = self.lock()?.sources.clone();
        rows.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(rows)
    }

    fn add_supported_source(&self, domain: &str, name: &str) -> ServiceResult<SupportedSource> {
        self.lock()?.add_source(domain, name)
    }

    fn remove_supported_source(&self, domain: &str) -> ServiceResult<bool> {
        let mut t = self.lock()?;
        let before = t.sources.len();
        t.sources.retain(|s| s.domain != domain);
        let removed = t.sources.len() != before;
        if removed {
            t.bump(ReferenceKind::SupportedSources);
        }
        Ok(removed)
    }

    fn reference_version(&self, kind: ReferenceKind) -> ServiceResult<i64> {
        Ok(self.lock()?.versions.get(&kind).copied().unwrap_or(0))
    }
}
