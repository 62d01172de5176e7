//! Offset pagination shared by listing queries.

use serde::Serialize;

/// A 1-based page request. Page numbers below 1 are treated as the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Resolve optional query parameters against the configured defaults.
    pub fn from_query(
        page: Option<u32>,
        page_size: Option<u32>,
        limits: &PageLimits,
    ) -> Self {
        let page_size = page_size
            .unwrap_or(limits.default_page_size)
            .clamp(1, limits.max_page_size);
        Self::new(page.unwrap_or(1), page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, PageLimits::default().default_page_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest) -> Self {
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
        }
    }
}
