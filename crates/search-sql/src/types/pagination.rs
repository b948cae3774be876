//! Offset pagination for compiled searches.

use serde::{Deserialize, Serialize};

/// Page selection for a search request.
///
/// Pages are 1-based. `max_include_count` bounds the rows returned by the
/// `_include`/`_revinclude` queries built alongside the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// The 1-based page number.
    pub page_number: u32,

    /// Maximum number of results per page.
    pub page_size: u32,

    /// Maximum number of included resources.
    pub max_include_count: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 10,
            max_include_count: 1000,
        }
    }
}

impl Pagination {
    /// Creates pagination for the given page and size.
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
            ..Default::default()
        }
    }

    /// Sets the include limit.
    pub fn with_max_include_count(mut self, count: u32) -> Self {
        self.max_include_count = count;
        self
    }

    /// Returns the number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page_number.max(1) - 1) * u64::from(self.page_size)
    }

    /// Applies server page size limits: a zero page size takes
    /// `default_page_size`, larger sizes are capped at `max_page_size`, and
    /// page zero becomes the first page.
    pub fn clamped(&self, default_page_size: u32, max_page_size: u32) -> Self {
        let page_size = match self.page_size {
            0 => default_page_size,
            size => size.min(max_page_size),
        };
        Self {
            page_number: self.page_number.max(1),
            page_size,
            max_include_count: self.max_include_count,
        }
    }

    /// Pagination used for include queries: the first page of
    /// `max_include_count` rows, capped at `server_max`. A zero include
    /// count takes `server_max`.
    pub fn for_includes(&self, server_max: u32) -> Self {
        let limit = match self.max_include_count {
            0 => server_max,
            requested => requested.min(server_max),
        };
        Self {
            page_number: 1,
            page_size: limit,
            max_include_count: limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(1, 10).offset(), 0);
        assert_eq!(Pagination::new(3, 25).offset(), 50);
        // Page zero is treated as the first page
        assert_eq!(Pagination::new(0, 25).offset(), 0);
    }

    #[test]
    fn test_clamped() {
        assert_eq!(Pagination::new(1, 5000).clamped(10, 1000).page_size, 1000);
        assert_eq!(Pagination::new(1, 20).clamped(10, 1000).page_size, 20);
        assert_eq!(Pagination::new(1, 0).clamped(10, 1000).page_size, 10);
        assert_eq!(Pagination::new(0, 20).clamped(10, 1000).page_number, 1);
    }

    #[test]
    fn test_for_includes() {
        let page = Pagination::new(4, 20).with_max_include_count(500);
        let include = page.for_includes(1000);
        assert_eq!(include.offset(), 0);
        assert_eq!(include.page_size, 500);
        assert_eq!(include.max_include_count, 500);

        assert_eq!(page.for_includes(200).page_size, 200);
        assert_eq!(page.with_max_include_count(0).for_includes(200).page_size, 200);
    }
}
