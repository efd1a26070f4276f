//! Page parameters and results for list actions.

use crate::errors::Result;
use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

/// Default page size.
pub const DEFAULT_PER_PAGE: u64 = 20;
/// Upper bound on page size.
pub const MAX_PER_PAGE: u64 = 100;
/// Upper bound on the page number; keeps the row offset within `i64`.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PER_PAGE;

/// 1-based page request; missing or out-of-range values are clamped.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PageRequest {
    /// Page number in `1..=MAX_PAGE`.
    #[must_use]
    pub fn page(self) -> u64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    /// Page size in `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn per_page(self) -> u64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }
}

/// One page of results with totals for pagination controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Converts every item, keeping the totals.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

/// Runs `select` for the requested page.
pub async fn fetch_page<C, E, M>(db: &C, select: Select<E>, request: PageRequest) -> Result<Page<M>>
where
    C: ConnectionTrait,
    E: EntityTrait<Model = M>,
    M: FromQueryResult + Sized + Send + Sync + 'static,
{
    let per_page = request.per_page();
    let page = request.page();
    let paginator = select.paginate(db, per_page);
    let totals = paginator.num_items_and_pages().await?;
    // Past the last page there is nothing to fetch
    let items = if page > totals.number_of_pages {
        Vec::new()
    } else {
        paginator.fetch_page(page - 1).await?
    };
    Ok(Page {
        items,
        total: totals.number_of_items,
        page,
        per_page,
        total_pages: totals.number_of_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let request = PageRequest {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(request.page(), 1);
        assert_eq!(request.per_page(), MAX_PER_PAGE);

        let defaults = PageRequest::default();
        assert_eq!(defaults.page(), 1);
        assert_eq!(defaults.per_page(), DEFAULT_PER_PAGE);

        let huge = PageRequest {
            page: Some(u64::MAX),
            per_page: Some(MAX_PER_PAGE),
        };
        assert_eq!(huge.page(), MAX_PAGE);
        assert!(huge.page().checked_mul(huge.per_page()).is_some());
    }

    #[test]
    fn test_page_map_keeps_totals() {
        let page = Page {
            items: vec![1, 2],
            total: 12,
            page: 2,
            per_page: 2,
            total_pages: 6,
        };
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!((mapped.total, mapped.page, mapped.total_pages), (12, 2, 6));
    }
}
