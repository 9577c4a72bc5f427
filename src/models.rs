use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Role;
use crate::error::ServiceError;
use crate::integrity::{MAX_BLOG_TITLE_LEN, MAX_COLLECTION_DESCRIPTION_LEN, MAX_NAME_LEN};

pub fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Text-backed enum stored in a CHECK-constrained column.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow, Serialize, Deserialize)]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ServiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ServiceError::Validation(format!(
                        "Invalid {}: {}", $label, other
                    ))),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                match bytes.as_bytes() {
                    $(b if b == $text.as_bytes() => Ok($name::$variant),)+
                    _ => Err(concat!("Unrecognized ", $label).into()),
                }
            }
        }
    };
}

text_enum!(
    /// Kinds of entries in the per-user activity log.
    ActivityKind, "activity type" {
        ProductSubmit => "product_submit",
        Rating => "rating",
        Discussion => "discussion",
        Tag => "tag",
    }
);

text_enum!(
    RequestKind, "request type" {
        Moderator => "moderator",
        Admin => "admin",
        ProductOwnership => "product-ownership",
        SourceDomain => "source-domain",
    }
);

text_enum!(
    RequestStatus, "request status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

impl RequestKind {
    /// Role granted when a request of this kind is approved.
    pub fn granted_role(&self) -> Option<Role> {
        match self {
            RequestKind::Moderator => Some(Role::Moderator),
            RequestKind::Admin => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub role: Role,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

/// Partial update of a user row. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize, AsChangeset, Validate)]
#[diesel(table_name = crate::schema::users)]
pub struct UserPatch {
    #[validate(length(min = 1, max = MAX_NAME_LEN, message = "username must be between 1 and 255 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = MAX_NAME_LEN))]
    pub display_name: Option<String>,
    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    #[validate(length(max = MAX_NAME_LEN))]
    pub location: Option<String>,
    #[validate(url(message = "Invalid website URL"))]
    pub website: Option<String>,
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn role_only(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.display_name.is_none()
            && self.avatar_url.is_none()
            && self.bio.is_none()
            && self.location.is_none()
            && self.website.is_none()
            && self.role.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(v) = &self.username {
            user.username = v.clone();
        }
        if let Some(v) = &self.email {
            user.email = Some(v.clone());
        }
        if let Some(v) = &self.display_name {
            user.display_name = Some(v.clone());
        }
        if let Some(v) = &self.avatar_url {
            user.avatar_url = Some(v.clone());
        }
        if let Some(v) = &self.bio {
            user.bio = Some(v.clone());
        }
        if let Some(v) = &self.location {
            user.location = Some(v.clone());
        }
        if let Some(v) = &self.website {
            user.website = Some(v.clone());
        }
        if let Some(role) = self.role {
            user.role = role;
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::products)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub source: String,
    pub external_id: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub banned: bool,
    pub banned_by: Option<Uuid>,
    pub banned_at: Option<NaiveDateTime>,
    pub banned_reason: Option<String>,
    pub last_edited_by: Option<Uuid>,
    pub last_edited_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub source: String,
    pub external_id: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset, Validate)]
#[diesel(table_name = crate::schema::products)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = MAX_NAME_LEN, message = "name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
}

impl ProductPatch {
    pub fn apply(&self, product: &mut Product) {
        if let Some(v) = &self.name {
            product.name = v.clone();
        }
        if let Some(v) = &self.description {
            product.description = Some(v.clone());
        }
        if let Some(v) = &self.category {
            product.category = Some(v.clone());
        }
        if let Some(v) = &self.image_url {
            product.image_url = Some(v.clone());
        }
    }
}

/// Ban state written by moderators. `banned = false` clears the audit fields.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::products, treat_none_as_null = true)]
pub struct BanChange {
    pub banned: bool,
    pub banned_by: Option<Uuid>,
    pub banned_at: Option<NaiveDateTime>,
    pub banned_reason: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::product_editors)]
pub struct ProductEditor {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::product_urls)]
pub struct ProductUrl {
    pub id: Uuid,
    pub product_id: Uuid,
    pub url: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::product_urls)]
pub struct NewProductUrl {
    pub id: Uuid,
    pub product_id: Uuid,
    pub url: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::tags)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::ratings)]
pub struct Rating {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::ratings)]
pub struct NewRating {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::discussions)]
pub struct Discussion {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub blocked: bool,
    pub blocked_by: Option<Uuid>,
    pub blocked_reason: Option<String>,
    pub blocked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::discussions)]
pub struct NewDiscussion {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::discussions, treat_none_as_null = true)]
pub struct BlockChange {
    pub blocked: bool,
    pub blocked_by: Option<Uuid>,
    pub blocked_reason: Option<String>,
    pub blocked_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::blog_posts)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub header_image: Option<String>,
    pub author_id: Option<Uuid>,
    pub author_ids: Vec<Uuid>,
    pub published: bool,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl BlogPost {
    /// `author_id` plus every co-author, without duplicates.
    pub fn authors(&self) -> Vec<Uuid> {
        let mut authors: Vec<Uuid> = self.author_id.into_iter().collect();
        for id in &self.author_ids {
            if !authors.contains(id) {
                authors.push(*id);
            }
        }
        authors
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::blog_posts)]
pub struct NewBlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub header_image: Option<String>,
    pub author_id: Option<Uuid>,
    pub author_ids: Vec<Uuid>,
    pub published: bool,
    pub published_at: Option<NaiveDateTime>,
}

/// Caller-supplied blog post edits.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BlogPostUpdate {
    #[validate(length(min = 1, max = MAX_BLOG_TITLE_LEN, message = "title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = MAX_NAME_LEN))]
    pub slug: Option<String>,
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: Option<String>,
    pub excerpt: Option<String>,
    #[validate(url(message = "Invalid header image URL"))]
    pub header_image: Option<String>,
    pub author_ids: Option<Vec<Uuid>>,
    pub published: Option<bool>,
}

/// Column changes derived from a [`BlogPostUpdate`]. `published_at` is
/// `Some(None)` when a post is unpublished.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = crate::schema::blog_posts)]
pub struct BlogPostChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub header_image: Option<String>,
    pub author_ids: Option<Vec<Uuid>>,
    pub published: Option<bool>,
    pub published_at: Option<Option<NaiveDateTime>>,
}

impl BlogPostChanges {
    pub fn apply(&self, post: &mut BlogPost) {
        if let Some(v) = &self.title {
            post.title = v.clone();
        }
        if let Some(v) = &self.slug {
            post.slug = v.clone();
        }
        if let Some(v) = &self.content {
            post.content = v.clone();
        }
        if let Some(v) = &self.excerpt {
            post.excerpt = Some(v.clone());
        }
        if let Some(v) = &self.header_image {
            post.header_image = Some(v.clone());
        }
        if let Some(v) = &self.author_ids {
            post.author_ids = v.clone();
        }
        if let Some(v) = self.published {
            post.published = v;
        }
        if let Some(v) = self.published_at {
            post.published_at = v;
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::collections)]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::collections)]
pub struct NewCollection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset, Validate)]
#[diesel(table_name = crate::schema::collections)]
pub struct CollectionPatch {
    #[validate(length(min = 1, max = MAX_NAME_LEN, message = "name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = MAX_COLLECTION_DESCRIPTION_LEN, message = "description must be 1000 characters or less"))]
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

impl CollectionPatch {
    pub fn apply(&self, collection: &mut Collection) {
        if let Some(v) = &self.name {
            collection.name = v.clone();
        }
        if let Some(v) = &self.description {
            collection.description = Some(v.clone());
        }
        if let Some(v) = self.is_public {
            collection.is_public = v;
        }
    }
}

/// A collection together with its member products in insertion order.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionWithProducts {
    #[serde(flatten)]
    pub collection: Collection,
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::user_activities)]
pub struct UserActivity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: ActivityKind,
    pub product_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::user_activities)]
pub struct NewUserActivity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: ActivityKind,
    pub product_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::scraping_logs)]
pub struct ScrapingLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub source: String,
    pub products_found: i32,
    pub products_added: i32,
    pub products_updated: i32,
    pub duration_seconds: Option<f64>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::scraping_logs)]
pub struct NewScrapingLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub source: String,
    pub products_found: i32,
    pub products_added: i32,
    pub products_updated: i32,
    pub duration_seconds: Option<f64>,
    pub status: String,
    pub error_message: Option<String>,
}

/// OAuth credentials for a scraping platform. Secrets never leave the
/// process in serialized form.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::oauth_configs)]
pub struct OAuthConfig {
    pub id: Uuid,
    pub platform: String,
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::oauth_configs, treat_none_as_null = true)]
pub struct NewOAuthConfig {
    pub platform: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::scraper_search_terms)]
pub struct ScraperSearchTerms {
    pub id: Uuid,
    pub platform: String,
    pub search_terms: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::user_requests)]
pub struct UserRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub request_type: RequestKind,
    pub status: RequestStatus,
    pub product_id: Option<Uuid>,
    pub reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub reviewer_note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::user_requests)]
pub struct NewUserRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub request_type: RequestKind,
    pub product_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::user_requests)]
pub struct RequestReview {
    pub status: RequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub reviewer_note: Option<String>,
}

/// What an approved request changes. Applied in the same transaction as the
/// status change, so a failing effect leaves the request pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalEffect {
    AddEditor { product_id: Uuid, user_id: Uuid },
    GrantRole { user_id: Uuid, role: Role },
    /// Already normalized. An existing entry counts as applied.
    AddSource { domain: String },
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::supported_sources)]
pub struct SupportedSource {
    pub id: Uuid,
    pub domain: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::valid_categories)]
pub struct ValidCategory {
    pub name: String,
    pub created_at: NaiveDateTime,
}

/// Allow-lists whose mutations bump a row in `reference_versions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    ValidCategories,
    SupportedSources,
    SearchTerms,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::ValidCategories => "valid_categories",
            ReferenceKind::SupportedSources => "supported_sources",
            ReferenceKind::SearchTerms => "scraper_search_terms",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_enums_parse_their_labels() {
        for kind in ActivityKind::ALL {
            assert_eq!(kind.as_str().parse::<ActivityKind>().unwrap(), *kind);
        }
        assert_eq!(
            "product-ownership".parse::<RequestKind>().unwrap(),
            RequestKind::ProductOwnership
        );
        assert!("login".parse::<ActivityKind>().is_err());
        assert!("maybe".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_request_kind_serializes_with_dashes() {
        let json = serde_json::to_string(&RequestKind::SourceDomain).unwrap();
        assert_eq!(json, "\"source-domain\"");
    }

    #[test]
    fn test_role_requests_grant_roles() {
        assert_eq!(RequestKind::Moderator.granted_role(), Some(Role::Moderator));
        assert_eq!(RequestKind::Admin.granted_role(), Some(Role::Admin));
        assert_eq!(RequestKind::ProductOwnership.granted_role(), None);
    }

    #[test]
    fn test_blog_post_authors_are_deduplicated() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let post = BlogPost {
            id: Uuid::new_v4(),
            title: "t".into(),
            slug: "t".into(),
            content: "c".into(),
            excerpt: None,
            header_image: None,
            author_id: Some(a),
            author_ids: vec![a, b],
            published: false,
            published_at: None,
            created_at: now(),
            updated_at: now(),
        };
        assert_eq!(post.authors(), vec![a, b]);
    }

    #[test]
    fn test_oauth_secrets_are_not_serialized() {
        let config = OAuthConfig {
            id: Uuid::new_v4(),
            platform: "ravelry".into(),
            client_id: Some("client".into()),
            client_secret: Some("s3cret".into()),
            redirect_uri: None,
            access_token: Some("acc3ss".into()),
            refresh_token: Some("ref".into()),
            token_expires_at: None,
            created_at: now(),
            updated_at: now(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(!json.contains("acc3ss"));
        assert!(json.contains("client"));
    }
}
