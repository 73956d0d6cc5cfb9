//! Pagination.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Requested page. Out-of-range values are clamped by [`PageRequest::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        PageRequest { page, limit }.normalized()
    }

    /// Clamp to `page >= 1` and `1 <= limit <= 100`.
    pub fn normalized(self) -> Self {
        PageRequest {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Number of items skipped before this page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

/// Pagination metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of results plus the total matching count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub request: PageRequest,
}

impl<T> Page<T> {
    /// Cut one page out of the full, already ordered result list.
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let request = request.normalized();
        let total = all.len();
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.limit as usize)
            .collect();
        Page {
            items,
            total,
            request,
        }
    }

    pub fn pagination(&self) -> Pagination {
        let limit = self.request.limit.max(1) as usize;
        let total_pages = self.total.div_ceil(limit);
        let page = self.request.page as usize;
        Pagination {
            page: self.request.page,
            limit: self.request.limit,
            total: self.total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }
}
