//! Persistence backends.
//!
//! Every method is atomic on its own. Set-valued relations (product editors,
//! collection members, product tags) are join rows mutated by
//! insert-if-absent and delete, never by rewriting a whole list.

pub mod memory;
pub mod postgres;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::auth::{Actor, Role};
use crate::error::ServiceResult;
use crate::models::*;
use crate::pagination::PaginationParams;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait Store: Send + Sync {
    // Users

    fn insert_user(&self, user: NewUser) -> ServiceResult<User>;
    fn get_user(&self, id: Uuid) -> ServiceResult<Option<User>>;
    fn find_user_by_username(&self, username: &str) -> ServiceResult<Option<User>>;
    fn user_role(&self, id: Uuid) -> ServiceResult<Option<Role>>;
    /// Applies `patch` to `target` with the role guard evaluated in the same
    /// transaction. A rejected role change leaves the row untouched.
    fn update_user_guarded(&self, actor: &Actor, target: Uuid, patch: &UserPatch)
        -> ServiceResult<User>;
    /// Cascades owned rows and detaches audit references.
    fn delete_user(&self, id: Uuid) -> ServiceResult<bool>;

    // Products

    fn insert_product(&self, product: NewProduct) -> ServiceResult<Product>;
    fn get_product(&self, id: Uuid) -> ServiceResult<Option<Product>>;
    fn get_product_by_slug(&self, slug: &str) -> ServiceResult<Option<Product>>;
    fn product_slug_exists(&self, slug: &str) -> ServiceResult<bool>;
    fn list_products(
        &self,
        include_banned: bool,
        page: &PaginationParams,
    ) -> ServiceResult<(Vec<Product>, i64)>;
    fn update_product(
        &self,
        id: Uuid,
        patch: &ProductPatch,
        edited_by: Option<Uuid>,
    ) -> ServiceResult<Product>;
    fn set_product_ban(&self, id: Uuid, change: &BanChange) -> ServiceResult<Product>;
    fn delete_product(&self, id: Uuid) -> ServiceResult<bool>;

    /// Returns false when the user already was an editor.
    fn add_product_editor(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;
    fn remove_product_editor(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;
    fn product_editors(&self, product_id: Uuid) -> ServiceResult<Vec<ProductEditor>>;

    fn insert_product_url(&self, url: NewProductUrl) -> ServiceResult<ProductUrl>;
    fn get_product_url(&self, id: Uuid) -> ServiceResult<Option<ProductUrl>>;
    fn delete_product_url(&self, id: Uuid) -> ServiceResult<bool>;
    fn product_urls(&self, product_id: Uuid) -> ServiceResult<Vec<ProductUrl>>;

    // Tags

    /// Returns the existing tag with this name or creates it.
    fn ensure_tag(&self, name: &str) -> ServiceResult<Tag>;
    fn find_tag(&self, name: &str) -> ServiceResult<Option<Tag>>;
    fn tag_product(&self, product_id: Uuid, tag_id: Uuid) -> ServiceResult<bool>;
    fn untag_product(&self, product_id: Uuid, tag_id: Uuid) -> ServiceResult<bool>;
    fn product_tags(&self, product_id: Uuid) -> ServiceResult<Vec<Tag>>;

    // Ratings

    fn insert_rating(&self, rating: NewRating) -> ServiceResult<Rating>;
    fn get_rating(&self, id: Uuid) -> ServiceResult<Option<Rating>>;
    fn find_rating(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<Option<Rating>>;
    fn update_rating(&self, id: Uuid, value: i32) -> ServiceResult<Rating>;
    fn delete_rating(&self, id: Uuid) -> ServiceResult<bool>;
    fn product_ratings(&self, product_id: Uuid) -> ServiceResult<Vec<Rating>>;

    // Discussions

    fn insert_discussion(&self, discussion: NewDiscussion) -> ServiceResult<Discussion>;
    fn get_discussion(&self, id: Uuid) -> ServiceResult<Option<Discussion>>;
    fn update_discussion_content(&self, id: Uuid, content: &str) -> ServiceResult<Discussion>;
    fn set_discussion_block(&self, id: Uuid, change: &BlockChange) -> ServiceResult<Discussion>;
    /// Replies go with their parent.
    fn delete_discussion(&self, id: Uuid) -> ServiceResult<bool>;
    fn product_discussions(&self, product_id: Uuid) -> ServiceResult<Vec<Discussion>>;

    // Blog posts

    fn insert_blog_post(&self, post: NewBlogPost) -> ServiceResult<BlogPost>;
    fn get_blog_post(&self, id: Uuid) -> ServiceResult<Option<BlogPost>>;
    fn get_blog_post_by_slug(&self, slug: &str) -> ServiceResult<Option<BlogPost>>;
    fn list_blog_posts(&self) -> ServiceResult<Vec<BlogPost>>;
    fn update_blog_post(&self, id: Uuid, changes: &BlogPostChanges) -> ServiceResult<BlogPost>;
    fn delete_blog_post(&self, id: Uuid) -> ServiceResult<bool>;

    // Collections

    fn insert_collection(&self, collection: NewCollection) -> ServiceResult<Collection>;
    fn get_collection(&self, id: Uuid) -> ServiceResult<Option<Collection>>;
    fn update_collection(&self, id: Uuid, patch: &CollectionPatch) -> ServiceResult<Collection>;
    fn delete_collection(&self, id: Uuid) -> ServiceResult<bool>;
    fn add_collection_product(&self, collection_id: Uuid, product_id: Uuid)
        -> ServiceResult<bool>;
    fn remove_collection_product(
        &self,
        collection_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<bool>;
    fn collection_product_ids(&self, collection_id: Uuid) -> ServiceResult<Vec<Uuid>>;
    fn collections_of(&self, user_id: Uuid) -> ServiceResult<Vec<Collection>>;
    /// Newest first, with the number of public collections overall.
    fn public_collections(
        &self,
        page: &PaginationParams,
    ) -> ServiceResult<(Vec<Collection>, i64)>;

    // Activities

    fn insert_activity(&self, activity: NewUserActivity) -> ServiceResult<UserActivity>;
    /// Newest first.
    fn activities_of(&self, user_id: Uuid, limit: i64) -> ServiceResult<Vec<UserActivity>>;
    fn purge_activities_before(&self, cutoff: NaiveDateTime) -> ServiceResult<usize>;

    // Operational records

    fn insert_scraping_log(&self, log: NewScrapingLog) -> ServiceResult<ScrapingLog>;
    /// Newest first.
    fn scraping_logs(&self, limit: i64) -> ServiceResult<Vec<ScrapingLog>>;
    fn upsert_oauth_config(&self, config: NewOAuthConfig) -> ServiceResult<OAuthConfig>;
    fn get_oauth_config(&self, platform: &str) -> ServiceResult<Option<OAuthConfig>>;
    fn upsert_search_terms(
        &self,
        platform: &str,
        terms: Vec<String>,
    ) -> ServiceResult<ScraperSearchTerms>;
    fn get_search_terms(&self, platform: &str) -> ServiceResult<Option<ScraperSearchTerms>>;

    // Requests

    fn insert_request(&self, request: NewUserRequest) -> ServiceResult<UserRequest>;
    fn get_request(&self, id: Uuid) -> ServiceResult<Option<UserRequest>>;
    /// All requests, or only those of `user_id`. Newest first.
    fn list_requests(&self, user_id: Option<Uuid>) -> ServiceResult<Vec<UserRequest>>;
    /// Moves a pending request to its reviewed state and applies `effect`
    /// atomically with it. Fails with a state conflict when the request is
    /// no longer pending. A role grant runs the role guard against `actor`
    /// inside the same transaction; any failure leaves the request pending.
    fn review_request(
        &self,
        actor: &Actor,
        id: Uuid,
        review: &RequestReview,
        effect: Option<&ApprovalEffect>,
    ) -> ServiceResult<UserRequest>;
    fn delete_request(&self, id: Uuid) -> ServiceResult<bool>;

    // Reference data

    fn valid_categories(&self) -> ServiceResult<Vec<ValidCategory>>;
    fn add_valid_category(&self, name: &str) -> ServiceResult<ValidCategory>;
    fn remove_valid_category(&self, name: &str) -> ServiceResult<bool>;
    fn supported_sources(&self) -> ServiceResult<Vec<SupportedSource>>;
    fn add_supported_source(&self, domain: &str, name: &str) -> ServiceResult<SupportedSource>;
    fn remove_supported_source(&self, domain: &str) -> ServiceResult<bool>;
    fn reference_version(&self, kind: ReferenceKind) -> ServiceResult<i64>;
}
