//! Pagination descriptors.

use crate::database::Row;
use serde::Serialize;

/// Position of one page inside a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Rows matching the filters
    pub total: u64,
    /// Page size
    pub per_page: u64,
    /// Page actually returned, after clamping
    pub current_page: u64,
    /// Last page, at least 1
    pub last_page: u64,
    /// 1-based index of the first row on the page
    pub from: Option<u64>,
    /// 1-based index of the last row on the page
    pub to: Option<u64>,
}

impl Pagination {
    /// Clamp `page` into `[1, last_page]` for `total` rows
    ///
    /// `from`/`to` stay unset until [`Pagination::with_rows`] fills them.
    #[must_use]
    pub fn plan(total: u64, per_page: u64, page: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(per_page).max(1);
        Self {
            total,
            per_page,
            current_page: page.clamp(1, last_page),
            last_page,
            from: None,
            to: None,
        }
    }

    /// Rows skipped before the current page
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.current_page - 1) * self.per_page
    }

    /// Record how many rows the page query returned
    ///
    /// An empty page gets `to == from - 1`.
    #[must_use]
    pub fn with_rows(mut self, rows: usize) -> Self {
        let offset = self.offset();
        self.from = Some(offset + 1);
        self.to = Some(offset + rows as u64);
        self
    }

    /// Descriptor returned when the page could not be fetched
    #[must_use]
    pub const fn empty(per_page: u64) -> Self {
        Self {
            total: 0,
            per_page,
            current_page: 1,
            last_page: 1,
            from: None,
            to: None,
        }
    }
}

/// One page of raw rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Rows on this page
    pub data: Vec<Row>,
    /// Where the page sits
    pub pagination: Pagination,
}
