//! Offset-based pagination types shared by all list endpoints.
//!
//! Every paginated response uses the same envelope:
//!
//! ```json
//! { "items": [...], "meta": { "total": 42, "page": 1, "per_page": 20, ... } }
//! ```

use serde::{Deserialize, Serialize};

/// Bounds applied to `per_page` before a listing is executed.
const MIN_PER_PAGE: u32 = 1;
const MAX_PER_PAGE: u32 = 100;
const DEFAULT_PER_PAGE: u32 = 20;

/// Query parameters for paginated list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageParams {
    /// Normalize page/per_page into their valid ranges.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(MIN_PER_PAGE, MAX_PER_PAGE),
        }
    }

    /// Zero-based offset of the first item on this page.
    pub fn offset(&self) -> usize {
        ((self.page.max(1) - 1) * self.per_page.clamp(MIN_PER_PAGE, MAX_PER_PAGE)) as usize
    }

    /// Number of items per page after clamping.
    pub fn limit(&self) -> usize {
        self.per_page.clamp(MIN_PER_PAGE, MAX_PER_PAGE) as usize
    }
}

/// Pagination metadata attached to every list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    pub fn new(total: usize, params: PageParams) -> Self {
        let params = params.normalized();
        let total_pages = if params.per_page > 0 {
            ((total as u32) + params.per_page - 1) / params.per_page
        } else {
            0
        };
        Self {
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
            has_next: params.page < total_pages,
            has_prev: params.page > 1,
        }
    }
}

/// Generic paginated response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    /// Build an envelope from one page of items and the pre-paging total.
    pub fn new(items: Vec<T>, total: usize, params: PageParams) -> Self {
        Self {
            items,
            meta: PageMeta::new(total, params),
        }
    }
}
