//! Structural invariants: uniqueness keys and input validation.

use url::Url;
use validator::ValidateLength;

use crate::error::{ServiceError, ServiceResult};

pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 5;
pub const MAX_NAME_LEN: u64 = 255;
pub const MAX_COLLECTION_DESCRIPTION_LEN: u64 = 1000;
pub const MAX_BLOG_TITLE_LEN: u64 = 200;

/// Every uniqueness constraint of the catalog schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueKey {
    UserUsername,
    UserExternalId,
    ProductSlug,
    ProductUrl,
    ProductSourceExternalId,
    RatingProductUser,
    ProductEditor,
    ProductTag,
    ProductUrlEntry,
    BlogPostSlug,
    TagName,
    OAuthConfigPlatform,
    SearchTermsPlatform,
    SupportedSourceDomain,
    ValidCategoryName,
    PendingRequest,
}

impl UniqueKey {
    pub const ALL: [UniqueKey; 16] = [
        UniqueKey::UserUsername,
        UniqueKey::UserExternalId,
        UniqueKey::ProductSlug,
        UniqueKey::ProductUrl,
        UniqueKey::ProductSourceExternalId,
        UniqueKey::RatingProductUser,
        UniqueKey::ProductEditor,
        UniqueKey::ProductTag,
        UniqueKey::ProductUrlEntry,
        UniqueKey::BlogPostSlug,
        UniqueKey::TagName,
        UniqueKey::OAuthConfigPlatform,
        UniqueKey::SearchTermsPlatform,
        UniqueKey::SupportedSourceDomain,
        UniqueKey::ValidCategoryName,
        UniqueKey::PendingRequest,
    ];

    /// Constraint (or unique index) name in the Postgres schema.
    pub fn constraint_name(&self) -> &'static str {
        match self {
            UniqueKey::UserUsername => "users_username_key",
            UniqueKey::UserExternalId => "users_external_id_key",
            UniqueKey::ProductSlug => "products_slug_key",
            UniqueKey::ProductUrl => "products_url_key",
            UniqueKey::ProductSourceExternalId => "products_source_external_id_key",
            UniqueKey::RatingProductUser => "ratings_product_id_user_id_key",
            UniqueKey::ProductEditor => "product_editors_product_id_user_id_key",
            UniqueKey::ProductTag => "product_tags_product_id_tag_id_key",
            UniqueKey::ProductUrlEntry => "product_urls_product_id_url_key",
            UniqueKey::BlogPostSlug => "blog_posts_slug_key",
            UniqueKey::TagName => "tags_name_key",
            UniqueKey::OAuthConfigPlatform => "oauth_configs_platform_key",
            UniqueKey::SearchTermsPlatform => "scraper_search_terms_platform_key",
            UniqueKey::SupportedSourceDomain => "supported_sources_domain_key",
            UniqueKey::ValidCategoryName => "valid_categories_pkey",
            UniqueKey::PendingRequest => "user_requests_one_pending_idx",
        }
    }

    pub fn from_constraint_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.constraint_name() == name)
    }

    pub fn message(&self) -> &'static str {
        match self {
            UniqueKey::UserUsername => "username is already taken",
            UniqueKey::UserExternalId => "external identity is already linked to a user",
            UniqueKey::ProductSlug => "a product with this slug already exists",
            UniqueKey::ProductUrl => "a product with this URL already exists",
            UniqueKey::ProductSourceExternalId => {
                "a product with this external id already exists for this source"
            }
            UniqueKey::RatingProductUser => "you have already rated this product",
            UniqueKey::ProductEditor => "user is already an editor of this product",
            UniqueKey::ProductTag => "product already carries this tag",
            UniqueKey::ProductUrlEntry => "product already lists this URL",
            UniqueKey::BlogPostSlug => "slug already exists",
            UniqueKey::TagName => "tag already exists",
            UniqueKey::OAuthConfigPlatform => "platform already has an OAuth configuration",
            UniqueKey::SearchTermsPlatform => "platform already has search terms",
            UniqueKey::SupportedSourceDomain => "source domain is already supported",
            UniqueKey::ValidCategoryName => "category already exists",
            UniqueKey::PendingRequest => "you already have a pending request of this type",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            UniqueKey::UserUsername => "USERNAME_TAKEN",
            UniqueKey::UserExternalId => "EXTERNAL_ID_TAKEN",
            UniqueKey::ProductSlug => "SLUG_EXISTS",
            UniqueKey::ProductUrl => "URL_EXISTS",
            UniqueKey::ProductSourceExternalId => "EXTERNAL_ID_EXISTS",
            UniqueKey::RatingProductUser => "ALREADY_RATED",
            UniqueKey::ProductEditor => "ALREADY_EDITOR",
            UniqueKey::ProductTag => "ALREADY_TAGGED",
            UniqueKey::ProductUrlEntry => "URL_ALREADY_LISTED",
            UniqueKey::BlogPostSlug => "SLUG_EXISTS",
            UniqueKey::TagName => "TAG_EXISTS",
            UniqueKey::OAuthConfigPlatform => "PLATFORM_CONFIGURED",
            UniqueKey::SearchTermsPlatform => "PLATFORM_CONFIGURED",
            UniqueKey::SupportedSourceDomain => "SOURCE_EXISTS",
            UniqueKey::ValidCategoryName => "CATEGORY_EXISTS",
            UniqueKey::PendingRequest => "REQUEST_PENDING",
        }
    }
}

/// Rejects, never clamps.
pub fn validate_rating(value: i32) -> ServiceResult<i32> {
    if (RATING_MIN..=RATING_MAX).contains(&value) {
        Ok(value)
    } else {
        Err(ServiceError::validation(format!(
            "rating must be between {} and {}, got {}",
            RATING_MIN, RATING_MAX, value
        )))
    }
}

/// Trims `value` and checks it is between 1 and `max_len` characters.
pub fn validate_name(field: &str, value: &str, max_len: u64) -> ServiceResult<String> {
    let trimmed = value.trim().to_string();
    if !trimmed.validate_length(Some(1), Some(max_len), None) {
        return Err(ServiceError::validation(format!(
            "{field} must be between 1 and {max_len} characters"
        )));
    }
    Ok(trimmed)
}

pub fn validate_content(value: &str) -> ServiceResult<String> {
    if !value.trim().to_string().validate_length(Some(1), None, None) {
        return Err(ServiceError::validation("content must not be empty"));
    }
    Ok(value.to_string())
}

/// An absolute `http` or `https` URL with a host.
pub fn validate_url(value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    let url = Url::parse(trimmed)
        .map_err(|e| ServiceError::validation(format!("invalid URL {trimmed}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ServiceError::validation(format!("invalid URL: {trimmed}")));
    }
    Ok(trimmed.to_string())
}

/// Host of a URL, lowercased, without a leading `www.`.
pub fn extract_domain(value: &str) -> Option<String> {
    let url = Url::parse(value.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    (!host.is_empty()).then(|| host.to_string())
}

/// `https://www.Example.com/` and `example.com` both become `example.com`,
/// the form `supported_sources` stores and [`extract_domain`] matches.
pub fn normalize_domain(value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    extract_domain(&candidate)
        .filter(|domain| domain.contains('.'))
        .ok_or_else(|| ServiceError::validation(format!("invalid domain: {trimmed}")))
}

/// Checks `value` against an allow-list loaded from reference data.
pub fn validate_allowed(field: &str, value: &str, allowed: &[String]) -> ServiceResult<()> {
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
        Ok(())
    } else {
        Err(ServiceError::validation(format!(
            "unsupported {field}: {value}"
        )))
    }
}

/// Kebab-case slug: `"3D Printer!"` becomes `"3d-printer"`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// `base`, `base-2`, `base-3`, ...
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

/// Pulls the raw value of a `Domain: example.com` line out of a request
/// reason. Pass it through [`normalize_domain`] before use.
pub fn parse_domain_line(reason: &str) -> Option<String> {
    reason.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        if !key.trim().eq_ignore_ascii_case("domain") {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-1).is_err());
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(3).unwrap(), 3);
        assert_eq!(validate_rating(5).unwrap(), 5);
    }

    #[test]
    fn test_rating_rejection_is_validation() {
        assert!(matches!(
            validate_rating(6),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_constraint_names_map_back() {
        for key in UniqueKey::ALL {
            assert_eq!(
                UniqueKey::from_constraint_name(key.constraint_name()),
                Some(key)
            );
        }
        assert_eq!(UniqueKey::from_constraint_name("no_such_key"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Product"), "my-product");
        assert_eq!(slugify("3D Printer!"), "3d-printer");
        assert_eq!(slugify("  --Star   Rating--Target  "), "star-rating-target");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slug_candidate("switch", 1), "switch");
        assert_eq!(slug_candidate("switch", 3), "switch-3");
    }

    #[test]
    fn test_name_validation() {
        assert_eq!(validate_name("name", "  Mug  ", MAX_NAME_LEN).unwrap(), "Mug");
        assert!(validate_name("name", "   ", MAX_NAME_LEN).is_err());
        assert!(validate_name("name", &"x".repeat(256), MAX_NAME_LEN).is_err());
        assert!(validate_name("name", &"é".repeat(255), MAX_NAME_LEN).is_ok());
        assert!(validate_content(" \n ").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("https://example.com/item").is_ok());
        assert!(validate_url("").is_err());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url("https://not a url at all").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.ravelry.com/patterns/library/test"),
            Some("ravelry.com".to_string())
        );
        assert_eq!(
            extract_domain("https://GitHub.com/user/repo?tab=readme"),
            Some("github.com".to_string())
        );
        assert_eq!(
            extract_domain("http://user@thingiverse.com:8080/thing:123"),
            Some("thingiverse.com".to_string())
        );
        assert_eq!(extract_domain("not a url"), None);
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("https://www.Ravelry.com/").unwrap(), "ravelry.com");
        assert_eq!(normalize_domain(" thingiverse.com ").unwrap(), "thingiverse.com");
        assert_eq!(normalize_domain("Etsy.com/shop").unwrap(), "etsy.com");
        assert!(normalize_domain("localhost").is_err());
        assert!(normalize_domain("bad domain.com").is_err());
        assert!(normalize_domain("").is_err());
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let allowed = vec!["Ravelry".to_string(), "GitHub".to_string()];
        assert!(validate_allowed("source", "ravelry", &allowed).is_ok());
        assert!(validate_allowed("source", "Etsy", &allowed).is_err());
        assert!(validate_allowed("source", "anything", &[]).is_err());
    }

    #[test]
    fn test_parse_domain_line() {
        assert_eq!(
            parse_domain_line("Please add this\nDomain: https://www.Example.COM/\nthanks"),
            Some("https://www.Example.COM/".to_string())
        );
        assert_eq!(parse_domain_line("no domain here"), None);
        assert_eq!(parse_domain_line("domain:   "), None);
    }
}
