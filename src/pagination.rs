//! Page parameters and paged results for catalog listings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// 1-indexed page request. Out-of-range values are clamped, not rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationParams {
    pub page: i64,
    pub per_page: i64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PaginationParams {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self { page, per_page }
    }

    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.per_page()
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    /// At least 1, even for an empty listing.
    pub total_pages: i64,
    pub has_next: bool,
}

/// One page of rows plus the total the listing would have unpaged.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn from_params(data: Vec<T>, params: &PaginationParams, total_count: i64) -> Self {
        let (page, per_page) = (params.page(), params.per_page());
        let total_pages = ((total_count + per_page - 1) / per_page).max(1);
        Self {
            data,
            pagination: PageInfo {
                page,
                per_page,
                total_count,
                total_pages,
                has_next: page < total_pages,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_are_clamped() {
        let params = PaginationParams::new(-5, 500);
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), MAX_PER_PAGE);
        assert_eq!(PaginationParams::new(1, 0).per_page(), 1);
    }

    #[test]
    fn test_offset_follows_page() {
        let params = PaginationParams::new(3, 10);
        assert_eq!(params.limit(), 10);
        assert_eq!(params.offset(), 20);
        assert_eq!(PaginationParams::default().offset(), 0);
    }

    #[test]
    fn test_page_info() {
        let params = PaginationParams::new(2, 20);
        let page = PaginatedResponse::from_params(vec!["a"; 20], &params, 95);
        assert_eq!(page.pagination.total_pages, 5);
        assert!(page.pagination.has_next);

        let empty = PaginatedResponse::<&str>::from_params(Vec::new(), &params, 0);
        assert_eq!(empty.pagination.total_pages, 1);
        assert!(!empty.pagination.has_next);
    }
}
