//! Pagination types
//!
//! List endpoints accept `page` (1-based) and `limit` and answer with a [`Page`].

use serde::{Deserialize, Serialize};

/// Default items per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound on items per page
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Current page number (1-based)
    pub page: u32,
    /// Items per page
    pub limit: u32,
}

impl PageRequest {
    /// Clamp raw query values: page ≥ 1, 1 ≤ limit ≤ [`MAX_PAGE_SIZE`]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results with pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    /// Total number of pages
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = total.div_ceil(u64::from(request.limit)) as u32;
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages,
        }
    }
}
