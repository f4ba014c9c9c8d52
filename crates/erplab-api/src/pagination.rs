//! Page/limit query parameters and the envelopes returned by paginated lists.

use serde::{Deserialize, Serialize};

/// Raw `?page=&limit=` query values.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Normalized page request: `page >= 1`, `1 <= limit <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl PageParams {
    pub fn resolve(self, default_limit: u32, max_limit: u32) -> Page {
        Page {
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(default_limit).clamp(1, max_limit.max(1)),
        }
    }

    /// True when the caller asked for pagination explicitly.
    pub fn is_explicit(&self) -> bool {
        self.page.is_some() && self.limit.is_some()
    }
}

impl Page {
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn limit_i64(&self) -> i64 {
        i64::from(self.limit)
    }
}

pub fn total_pages(total: i64, limit: u32) -> i64 {
    if limit == 0 {
        return 0;
    }
    let limit = i64::from(limit);
    (total + limit - 1) / limit
}

/// Flat envelope: `{data, total, page, limit, totalPages}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            data,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: total_pages(total, page.limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_prev_page: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_next_page: Option<bool>,
}

impl PageMeta {
    pub fn new(total: i64, page: Page) -> Self {
        Self {
            total,
            page: page.page,
            limit: page.limit,
            total_pages: total_pages(total, page.limit),
            has_prev_page: None,
            has_next_page: None,
        }
    }

    /// Adds `hasPrevPage` / `hasNextPage`.
    pub fn with_navigation(mut self) -> Self {
        self.has_prev_page = Some(self.page > 1);
        self.has_next_page = Some(i64::from(self.page) < self.total_pages);
        self
    }
}

/// Nested envelope: `{data, meta: {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct MetaPage<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}
