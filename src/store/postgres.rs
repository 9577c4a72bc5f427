//! Diesel backend over an r2d2 pool. Uniqueness, cascades and the
//! pending-request key are enforced by the schema in `migrations/`; this
//! module maps their violations onto [`ServiceError`] and keeps each
//! multi-statement operation inside one transaction.

use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{debug, info};
use uuid::Uuid;

use super::Store;
use crate::auth::{Actor, Role};
use crate::error::{ServiceError, ServiceResult};
use crate::guard::enforce_role_change;
use crate::models::*;
use crate::pagination::PaginationParams;
use crate::schema::{
    blog_posts, collection_products, collections, discussions, oauth_configs, product_editors,
    product_tags, product_urls, products, ratings, reference_versions, scraper_search_terms,
    scraping_logs, supported_sources, tags, user_activities, user_requests, users,
    valid_categories,
};
use crate::DbPool;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn run_migrations(conn: &mut PgConnection) -> ServiceResult<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ServiceError::storage(format!("Migration failed: {e}")))?;
    info!(count = applied.len(), "Database migrations applied");
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn migrate(&self) -> ServiceResult<()> {
        run_migrations(&mut *self.pool.get()?)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut conn = self.pool.get()?;
        f(&mut conn)
    }

    fn in_transaction<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut conn = self.pool.get()?;
        (&mut *conn).transaction::<_, ServiceError, _>(f)
    }
}

fn bump_version(conn: &mut PgConnection, kind: ReferenceKind) -> ServiceResult<()> {
    let ts = now();
    diesel::insert_into(reference_versions::table)
        .values((
            reference_versions::name.eq(kind.as_str()),
            reference_versions::version.eq(1i64),
            reference_versions::updated_at.eq(ts),
        ))
        .on_conflict(reference_versions::name)
        .do_update()
        .set((
            reference_versions::version.eq(reference_versions::version + 1i64),
            reference_versions::updated_at.eq(ts),
        ))
        .execute(conn)?;
    debug!(list = kind.as_str(), "Reference version bumped");
    Ok(())
}

/// Locks the target row, re-reads the actor's role and runs the role guard
/// before writing. Must run inside a transaction.
fn guarded_user_update(
    conn: &mut PgConnection,
    actor: &Actor,
    target: Uuid,
    patch: &UserPatch,
) -> ServiceResult<User> {
    let current: User = users::table
        .find(target)
        .select(User::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound("User"))?;

    if let Some(requested) = patch.role {
        // Re-read under lock so a concurrent demotion of the actor
        // is seen before their change is applied.
        let actor_role_now = match actor.id() {
            Some(id) if id == target => Some(current.role),
            Some(id) => users::table
                .find(id)
                .select(users::role)
                .for_share()
                .first::<Role>(conn)
                .optional()?,
            None => None,
        };
        enforce_role_change(actor, actor_role_now, target, current.role, requested)?;
    }

    Ok(diesel::update(users::table.find(target))
        .set((patch, users::updated_at.eq(now())))
        .returning(User::as_returning())
        .get_result(conn)?)
}

fn insert_editor(conn: &mut PgConnection, product_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
    let inserted = diesel::insert_into(product_editors::table)
        .values((
            product_editors::id.eq(Uuid::new_v4()),
            product_editors::product_id.eq(product_id),
            product_editors::user_id.eq(user_id),
        ))
        .on_conflict((product_editors::product_id, product_editors::user_id))
        .do_nothing()
        .execute(conn)?;
    Ok(inserted > 0)
}

fn apply_effect(
    conn: &mut PgConnection,
    actor: &Actor,
    effect: &ApprovalEffect,
) -> ServiceResult<()> {
    match effect {
        ApprovalEffect::AddEditor {
            product_id,
            user_id,
        } => {
            insert_editor(conn, *product_id, *user_id)?;
        }
        ApprovalEffect::GrantRole { user_id, role } => {
            guarded_user_update(conn, actor, *user_id, &UserPatch::role_only(*role))?;
        }
        ApprovalEffect::AddSource { domain } => {
            let inserted = diesel::insert_into(supported_sources::table)
                .values((
                    supported_sources::id.eq(Uuid::new_v4()),
                    supported_sources::domain.eq(domain.as_str()),
                    supported_sources::name.eq(domain.as_str()),
                ))
                .on_conflict(supported_sources::domain)
                .do_nothing()
                .execute(conn)?;
            if inserted > 0 {
                bump_version(conn, ReferenceKind::SupportedSources)?;
            }
        }
    }
    Ok(())
}

impl Store for PgStore {
    fn insert_user(&self, user: NewUser) -> ServiceResult<User> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(users::table)
                .values(&user)
                .returning(User::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_user(&self, id: Uuid) -> ServiceResult<Option<User>> {
        self.with_conn(|conn| {
            Ok(users::table
                .find(id)
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn find_user_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        self.with_conn(|conn| {
            Ok(users::table
                .filter(users::username.eq(username))
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn user_role(&self, id: Uuid) -> ServiceResult<Option<Role>> {
        self.with_conn(|conn| {
            Ok(users::table
                .find(id)
                .select(users::role)
                .first::<Role>(conn)
                .optional()?)
        })
    }

    fn update_user_guarded(
        &self,
        actor: &Actor,
        target: Uuid,
        patch: &UserPatch,
    ) -> ServiceResult<User> {
        self.in_transaction(|conn| guarded_user_update(conn, actor, target, patch))
    }

    fn delete_user(&self, id: Uuid) -> ServiceResult<bool> {
        self.in_transaction(|conn| {
            // Co-author arrays carry no foreign key; the rest cascades.
            diesel::sql_query(
                "UPDATE blog_posts SET author_ids = array_remove(author_ids, $1) \
                 WHERE $1 = ANY(author_ids)",
            )
            .bind::<diesel::sql_types::Uuid, _>(id)
            .execute(conn)?;
            Ok(diesel::delete(users::table.find(id)).execute(conn)? > 0)
        })
    }

    fn insert_product(&self, product: NewProduct) -> ServiceResult<Product> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(products::table)
                .values(&product)
                .returning(Product::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_product(&self, id: Uuid) -> ServiceResult<Option<Product>> {
        self.with_conn(|conn| {
            Ok(products::table
                .find(id)
                .select(Product::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn get_product_by_slug(&self, slug: &str) -> ServiceResult<Option<Product>> {
        self.with_conn(|conn| {
            Ok(products::table
                .filter(products::slug.eq(slug))
                .select(Product::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn product_slug_exists(&self, slug: &str) -> ServiceResult<bool> {
        self.with_conn(|conn| {
            Ok(diesel::select(diesel::dsl::exists(
                products::table.filter(products::slug.eq(slug)),
            ))
            .get_result(conn)?)
        })
    }

    fn list_products(
        &self,
        include_banned: bool,
        params: &PaginationParams,
    ) -> ServiceResult<(Vec<Product>, i64)> {
        self.with_conn(|conn| {
            let mut query = products::table.into_boxed();
            let mut count = products::table.into_boxed();
            if !include_banned {
                query = query.filter(products::banned.eq(false));
                count = count.filter(products::banned.eq(false));
            }

            let total: i64 = count.count().get_result(conn)?;
            let rows = query
                .order(products::created_at.desc())
                .limit(params.limit())
                .offset(params.offset())
                .select(Product::as_select())
                .load(conn)?;
            Ok((rows, total))
        })
    }

    fn update_product(
        &self,
        id: Uuid,
        patch: &ProductPatch,
        edited_by: Option<Uuid>,
    ) -> ServiceResult<Product> {
        self.with_conn(|conn| {
            let ts = now();
            diesel::update(products::table.find(id))
                .set((
                    patch,
                    products::last_edited_by.eq(edited_by),
                    products::last_edited_at.eq(Some(ts)),
                    products::updated_at.eq(ts),
                ))
                .returning(Product::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or(ServiceError::NotFound("Product"))
        })
    }

    fn set_product_ban(&self, id: Uuid, change: &BanChange) -> ServiceResult<Product> {
        self.with_conn(|conn| {
            diesel::update(products::table.find(id))
                .set((change, products::updated_at.eq(now())))
                .returning(Product::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or(ServiceError::NotFound("Product"))
        })
    }

    fn delete_product(&self, id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| Ok(diesel::delete(products::table.find(id)).execute(conn)? > 0))
    }

    fn add_product_editor(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| insert_editor(conn, product_id, user_id))
    }

    fn remove_product_editor(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| {
            let removed = diesel::delete(
                product_editors::table
                    .filter(product_editors::product_id.eq(product_id))
                    .filter(product_editors::user_id.eq(user_id)),
            )
            .execute(conn)?;
            Ok(removed > 0)
        })
    }

    fn product_editors(&self, product_id: Uuid) -> ServiceResult<Vec<ProductEditor>> {
        self.with_conn(|conn| {
            Ok(product_editors::table
                .filter(product_editors::product_id.eq(product_id))
                .order(product_editors::created_at)
                .select(ProductEditor::as_select())
                .load(conn)?)
        })
    }

    fn insert_product_url(&self, url: NewProductUrl) -> ServiceResult<ProductUrl> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(product_urls::table)
                .values(&url)
                .returning(ProductUrl::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_product_url(&self, id: Uuid) -> ServiceResult<Option<ProductUrl>> {
        self.with_conn(|conn| {
            Ok(product_urls::table
                .find(id)
                .select(ProductUrl::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn delete_product_url(&self, id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| Ok(diesel::delete(product_urls::table.find(id)).execute(conn)? > 0))
    }

    fn product_urls(&self, product_id: Uuid) -> ServiceResult<Vec<ProductUrl>> {
        self.with_conn(|conn| {
            Ok(product_urls::table
                .filter(product_urls::product_id.eq(product_id))
                .order(product_urls::created_at)
                .select(ProductUrl::as_select())
                .load(conn)?)
        })
    }

    fn ensure_tag(&self, name: &str) -> ServiceResult<Tag> {
        self.in_transaction(|conn| {
            diesel::insert_into(tags::table)
                .values((tags::id.eq(Uuid::new_v4()), tags::name.eq(name)))
                .on_conflict(tags::name)
                .do_nothing()
                .execute(conn)?;
            Ok(tags::table
                .filter(tags::name.eq(name))
                .select(Tag::as_select())
                .first(conn)?)
        })
    }

    fn find_tag(&self, name: &str) -> ServiceResult<Option<Tag>> {
        self.with_conn(|conn| {
            Ok(tags::table
                .filter(tags::name.eq(name))
                .select(Tag::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn tag_product(&self, product_id: Uuid, tag_id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| {
            let inserted = diesel::insert_into(product_tags::table)
                .values((
                    product_tags::id.eq(Uuid::new_v4()),
                    product_tags::product_id.eq(product_id),
                    product_tags::tag_id.eq(tag_id),
                ))
                .on_conflict((product_tags::product_id, product_tags::tag_id))
                .do_nothing()
                .execute(conn)?;
            Ok(inserted > 0)
        })
    }

    fn untag_product(&self, product_id: Uuid, tag_id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| {
            let removed = diesel::delete(
                product_tags::table
                    .filter(product_tags::product_id.eq(product_id))
                    .filter(product_tags::tag_id.eq(tag_id)),
            )
            .execute(conn)?;
            Ok(removed > 0)
        })
    }

    fn product_tags(&self, product_id: Uuid) -> ServiceResult<Vec<Tag>> {
        self.with_conn(|conn| {
            Ok(product_tags::table
                .inner_join(tags::table)
                .filter(product_tags::product_id.eq(product_id))
                .order(product_tags::created_at)
                .select(Tag::as_select())
                .load(conn)?)
        })
    }

    fn insert_rating(&self, rating: NewRating) -> ServiceResult<Rating> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(ratings::table)
                .values(&rating)
                .returning(Rating::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_rating(&self, id: Uuid) -> ServiceResult<Option<Rating>> {
        self.with_conn(|conn| {
            Ok(ratings::table
                .find(id)
                .select(Rating::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn find_rating(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<Option<Rating>> {
        self.with_conn(|conn| {
            Ok(ratings::table
                .filter(ratings::product_id.eq(product_id))
                .filter(ratings::user_id.eq(user_id))
                .select(Rating::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn update_rating(&self, id: Uuid, value: i32) -> ServiceResult<Rating> {
        self.with_conn(|conn| {
            diesel::update(ratings::table.find(id))
                .set((ratings::rating.eq(value), ratings::updated_at.eq(now())))
                .returning(Rating::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or(ServiceError::NotFound("Rating"))
        })
    }

    fn delete_rating(&self, id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| Ok(diesel::delete(ratings::table.find(id)).execute(conn)? > 0))
    }

    fn product_ratings(&self, product_id: Uuid) -> ServiceResult<Vec<Rating>> {
        self.with_conn(|conn| {
            Ok(ratings::table
                .filter(ratings::product_id.eq(product_id))
                .order(ratings::created_at)
                .select(Rating::as_select())
                .load(conn)?)
        })
    }

    fn insert_discussion(&self, discussion: NewDiscussion) -> ServiceResult<Discussion> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(discussions::table)
                .values(&discussion)
                .returning(Discussion::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_discussion(&self, id: Uuid) -> ServiceResult<Option<Discussion>> {
        self.with_conn(|conn| {
            Ok(discussions::table
                .find(id)
                .select(Discussion::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn update_discussion_content(&self, id: Uuid, content: &str) -> ServiceResult<Discussion> {
        self.with_conn(|conn| {
            diesel::update(discussions::table.find(id))
                .set((
                    discussions::content.eq(content),
                    discussions::updated_at.eq(now()),
                ))
                .returning(Discussion::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or(ServiceError::NotFound("Discussion"))
        })
    }

    fn set_discussion_block(&self, id: Uuid, change: &BlockChange) -> ServiceResult<Discussion> {
        self.with_conn(|conn| {
            diesel::update(discussions::table.find(id))
                .set((change, discussions::updated_at.eq(now())))
                .returning(Discussion::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or(ServiceError::NotFound("Discussion"))
        })
    }

    fn delete_discussion(&self, id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| Ok(diesel::delete(discussions::table.find(id)).execute(conn)? > 0))
    }

    fn product_discussions(&self, product_id: Uuid) -> ServiceResult<Vec<Discussion>> {
        self.with_conn(|conn| {
            Ok(discussions::table
                .filter(discussions::product_id.eq(product_id))
                .order(discussions::created_at)
                .select(Discussion::as_select())
                .load(conn)?)
        })
    }

    fn insert_blog_post(&self, post: NewBlogPost) -> ServiceResult<BlogPost> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(blog_posts::table)
                .values(&post)
                .returning(BlogPost::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_blog_post(&self, id: Uuid) -> ServiceResult<Option<BlogPost>> {
        self.with_conn(|conn| {
            Ok(blog_posts::table
                .find(id)
                .select(BlogPost::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn get_blog_post_by_slug(&self, slug: &str) -> ServiceResult<Option<BlogPost>> {
        self.with_conn(|conn| {
            Ok(blog_posts::table
                .filter(blog_posts::slug.eq(slug))
                .select(BlogPost::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn list_blog_posts(&self) -> ServiceResult<Vec<BlogPost>> {
        self.with_conn(|conn| {
            Ok(blog_posts::table
                .order(blog_posts::created_at.desc())
                .select(BlogPost::as_select())
                .load(conn)?)
        })
    }

    fn update_blog_post(&self, id: Uuid, changes: &BlogPostChanges) -> ServiceResult<BlogPost> {
        self.with_conn(|conn| {
            diesel::update(blog_posts::table.find(id))
                .set((changes, blog_posts::updated_at.eq(now())))
                .returning(BlogPost::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or(ServiceError::NotFound("Blog post"))
        })
    }

    fn delete_blog_post(&self, id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| Ok(diesel::delete(blog_posts::table.find(id)).execute(conn)? > 0))
    }

    fn insert_collection(&self, collection: NewCollection) -> ServiceResult<Collection> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(collections::table)
                .values(&collection)
                .returning(Collection::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_collection(&self, id: Uuid) -> ServiceResult<Option<Collection>> {
        self.with_conn(|conn| {
            Ok(collections::table
                .find(id)
                .select(Collection::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn update_collection(&self, id: Uuid, patch: &CollectionPatch) -> ServiceResult<Collection> {
        self.with_conn(|conn| {
            diesel::update(collections::table.find(id))
                .set((patch, collections::updated_at.eq(now())))
                .returning(Collection::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or(ServiceError::NotFound("Collection"))
        })
    }

    fn delete_collection(&self, id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| Ok(diesel::delete(collections::table.find(id)).execute(conn)? > 0))
    }

    fn add_collection_product(
        &self,
        collection_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<bool> {
        self.in_transaction(|conn| {
            let inserted = diesel::insert_into(collection_products::table)
                .values((
                    collection_products::id.eq(Uuid::new_v4()),
                    collection_products::collection_id.eq(collection_id),
                    collection_products::product_id.eq(product_id),
                ))
                .on_conflict((
                    collection_products::collection_id,
                    collection_products::product_id,
                ))
                .do_nothing()
                .execute(conn)?;
            if inserted > 0 {
                diesel::update(collections::table.find(collection_id))
                    .set(collections::updated_at.eq(now()))
                    .execute(conn)?;
            }
            Ok(inserted > 0)
        })
    }

    fn remove_collection_product(
        &self,
        collection_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<bool> {
        self.in_transaction(|conn| {
            let removed = diesel::delete(
                collection_products::table
                    .filter(collection_products::collection_id.eq(collection_id))
                    .filter(collection_products::product_id.eq(product_id)),
            )
            .execute(conn)?;
            if removed > 0 {
                diesel::update(collections::table.find(collection_id))
                    .set(collections::updated_at.eq(now()))
                    .execute(conn)?;
            }
            Ok(removed > 0)
        })
    }

    fn collection_product_ids(&self, collection_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        self.with_conn(|conn| {
            Ok(collection_products::table
                .filter(collection_products::collection_id.eq(collection_id))
                .order(collection_products::added_at)
                .select(collection_products::product_id)
                .load(conn)?)
        })
    }

    fn collections_of(&self, user_id: Uuid) -> ServiceResult<Vec<Collection>> {
        self.with_conn(|conn| {
            Ok(collections::table
                .filter(collections::user_id.eq(user_id))
                .order(collections::created_at.desc())
                .select(Collection::as_select())
                .load(conn)?)
        })
    }

    fn public_collections(
        &self,
        params: &PaginationParams,
    ) -> ServiceResult<(Vec<Collection>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = collections::table
                .filter(collections::is_public.eq(true))
                .count()
                .get_result(conn)?;
            let rows = collections::table
                .filter(collections::is_public.eq(true))
                .order(collections::created_at.desc())
                .limit(params.limit())
                .offset(params.offset())
                .select(Collection::as_select())
                .load(conn)?;
            Ok((rows, total))
        })
    }

    fn insert_activity(&self, activity: NewUserActivity) -> ServiceResult<UserActivity> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(user_activities::table)
                .values(&activity)
                .returning(UserActivity::as_returning())
                .get_result(conn)?)
        })
    }

    fn activities_of(&self, user_id: Uuid, limit: i64) -> ServiceResult<Vec<UserActivity>> {
        self.with_conn(|conn| {
            Ok(user_activities::table
                .filter(user_activities::user_id.eq(user_id))
                .order(user_activities::created_at.desc())
                .limit(limit.max(0))
                .select(UserActivity::as_select())
                .load(conn)?)
        })
    }

    fn purge_activities_before(&self, cutoff: NaiveDateTime) -> ServiceResult<usize> {
        self.with_conn(|conn| {
            Ok(
                diesel::delete(user_activities::table.filter(user_activities::created_at.lt(cutoff)))
                    .execute(conn)?,
            )
        })
    }

    fn insert_scraping_log(&self, log: NewScrapingLog) -> ServiceResult<ScrapingLog> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(scraping_logs::table)
                .values(&log)
                .returning(ScrapingLog::as_returning())
                .get_result(conn)?)
        })
    }

    fn scraping_logs(&self, limit: i64) -> ServiceResult<Vec<ScrapingLog>> {
        self.with_conn(|conn| {
            Ok(scraping_logs::table
                .order(scraping_logs::created_at.desc())
                .limit(limit.max(0))
                .select(ScrapingLog::as_select())
                .load(conn)?)
        })
    }

    fn upsert_oauth_config(&self, config: NewOAuthConfig) -> ServiceResult<OAuthConfig> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(oauth_configs::table)
                .values(&config)
                .on_conflict(oauth_configs::platform)
                .do_update()
                .set((&config, oauth_configs::updated_at.eq(now())))
                .returning(OAuthConfig::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_oauth_config(&self, platform: &str) -> ServiceResult<Option<OAuthConfig>> {
        self.with_conn(|conn| {
            Ok(oauth_configs::table
                .filter(oauth_configs::platform.eq(platform))
                .select(OAuthConfig::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn upsert_search_terms(
        &self,
        platform: &str,
        terms: Vec<String>,
    ) -> ServiceResult<ScraperSearchTerms> {
        self.in_transaction(|conn| {
            let row = diesel::insert_into(scraper_search_terms::table)
                .values((
                    scraper_search_terms::id.eq(Uuid::new_v4()),
                    scraper_search_terms::platform.eq(platform),
                    scraper_search_terms::search_terms.eq(terms),
                ))
                .on_conflict(scraper_search_terms::platform)
                .do_update()
                .set((
                    scraper_search_terms::search_terms
                        .eq(excluded(scraper_search_terms::search_terms)),
                    scraper_search_terms::updated_at.eq(now()),
                ))
                .returning(ScraperSearchTerms::as_returning())
                .get_result(conn)?;
            bump_version(conn, ReferenceKind::SearchTerms)?;
            Ok(row)
        })
    }

    fn get_search_terms(&self, platform: &str) -> ServiceResult<Option<ScraperSearchTerms>> {
        self.with_conn(|conn| {
            Ok(scraper_search_terms::table
                .filter(scraper_search_terms::platform.eq(platform))
                .select(ScraperSearchTerms::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn insert_request(&self, request: NewUserRequest) -> ServiceResult<UserRequest> {
        self.with_conn(|conn| {
            Ok(diesel::insert_into(user_requests::table)
                .values(&request)
                .returning(UserRequest::as_returning())
                .get_result(conn)?)
        })
    }

    fn get_request(&self, id: Uuid) -> ServiceResult<Option<UserRequest>> {
        self.with_conn(|conn| {
            Ok(user_requests::table
                .find(id)
                .select(UserRequest::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn list_requests(&self, user_id: Option<Uuid>) -> ServiceResult<Vec<UserRequest>> {
        self.with_conn(|conn| {
            let mut query = user_requests::table.into_boxed();
            if let Some(user_id) = user_id {
                query = query.filter(user_requests::user_id.eq(user_id));
            }
            Ok(query
                .order(user_requests::created_at.desc())
                .select(UserRequest::as_select())
                .load(conn)?)
        })
    }

    fn review_request(
        &self,
        actor: &Actor,
        id: Uuid,
        review: &RequestReview,
        effect: Option<&ApprovalEffect>,
    ) -> ServiceResult<UserRequest> {
        self.in_transaction(|conn| {
            let updated = diesel::update(
                user_requests::table
                    .find(id)
                    .filter(user_requests::status.eq(RequestStatus::Pending)),
            )
            .set((review, user_requests::updated_at.eq(now())))
            .returning(UserRequest::as_returning())
            .get_result(conn)
            .optional()?;

            if let Some(row) = updated {
                // An error here rolls the status change back with it.
                if let Some(effect) = effect {
                    apply_effect(conn, actor, effect)?;
                }
                return Ok(row);
            }

            let status: Option<RequestStatus> = user_requests::table
                .find(id)
                .select(user_requests::status)
                .first(conn)
                .optional()?;
            match status {
                Some(status) => Err(ServiceError::StateConflict(format!(
                    "Request already {status}"
                ))),
                None => Err(ServiceError::NotFound("Request")),
            }
        })
    }

    fn delete_request(&self, id: Uuid) -> ServiceResult<bool> {
        self.with_conn(|conn| Ok(diesel::delete(user_requests::table.find(id)).execute(conn)? > 0))
    }

    fn valid_categories(&self) -> ServiceResult<Vec<ValidCategory>> {
        self.with_conn(|conn| {
            Ok(valid_categories::table
                .order(valid_categories::name)
                .select(ValidCategory::as_select())
                .load(conn)?)
        })
    }

    fn add_valid_category(&self, name: &str) -> ServiceResult<ValidCategory> {
        self.in_transaction(|conn| {
            let row = diesel::insert_into(valid_categories::table)
                .values(valid_categories::name.eq(name))
                .returning(ValidCategory::as_returning())
                .get_result(conn)?;
            bump_version(conn, ReferenceKind::ValidCategories)?;
            Ok(row)
        })
    }

    fn remove_valid_category(&self, name: &str) -> ServiceResult<bool> {
        self.in_transaction(|conn| {
            let removed = diesel::delete(valid_categories::table.find(name)).execute(conn)?;
            if removed > 0 {
                bump_version(conn, ReferenceKind::ValidCategories)?;
            }
            Ok(removed > 0)
        })
    }

    fn supported_sources(&self) -> ServiceResult<Vec<SupportedSource>> {
        self.with_conn(|conn| {
            Ok(supported_sources::table
                .order(supported_sources::domain)
                .select(SupportedSource::as_select())
                .load(conn)?)
        })
    }

    fn add_supported_source(&self, domain: &str, name: &str) -> ServiceResult<SupportedSource> {
        self.in_transaction(|conn| {
            let row = diesel::insert_into(supported_sources::table)
                .values((
                    supported_sources::id.eq(Uuid::new_v4()),
                    supported_sources::domain.eq(domain),
                    supported_sources::name.eq(name),
                ))
                .returning(SupportedSource::as_returning())
                .get_result(conn)?;
            bump_version(conn, ReferenceKind::SupportedSources)?;
            Ok(row)
        })
    }

    fn remove_supported_source(&self, domain: &str) -> ServiceResult<bool> {
        self.in_transaction(|conn| {
            let removed = diesel::delete(
                supported_sources::table.filter(supported_sources::domain.eq(domain)),
            )
            .execute(conn)?;
            if removed > 0 {
                bump_version(conn, ReferenceKind::SupportedSources)?;
            }
            Ok(removed > 0)
        })
    }

    fn reference_version(&self, kind: ReferenceKind) -> ServiceResult<i64> {
        self.with_conn(|conn| {
            let version: Option<i64> = reference_versions::table
                .find(kind.as_str())
                .select(reference_versions::version)
                .first(conn)
                .optional()?;
            Ok(version.unwrap_or(0))
        })
    }
}
