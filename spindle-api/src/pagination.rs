//! Pagination utilities

/// Default page size when the request does not specify a limit
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Upper bound on the requestable page size
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Calculate pagination metadata from total results, requested page, and
/// page size. The page number is clamped into [1, total_pages].
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Pagination {
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        total_pages,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(25, 2, 10);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 10);
    }

    #[test]
    fn test_pagination_first_page() {
        let p = calculate_pagination(15, 1, 10);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_out_of_bounds_high() {
        let p = calculate_pagination(15, 99, 10);
        assert_eq!(p.page, 2); // Clamped to last page
        assert_eq!(p.offset, 10);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(15, 0, 10);
        assert_eq!(p.page, 1); // Clamped to first page
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1, 10);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_exact_page_boundary() {
        let p = calculate_pagination(20, 2, 10);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.offset, 10);
    }
}
