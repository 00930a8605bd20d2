//! Pagination defaults and helpers shared by the repository and API layers.

/// Default number of results per page.
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

/// Maximum number of results per page.
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// Default page size when listing remote executions.
pub const DEFAULT_EXECUTION_PAGE_SIZE: i64 = 10;

/// Clamp a caller-supplied limit into `1..=max`, falling back to `default`.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Clamp a caller-supplied offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// 1-based page number for an offset/limit pair.
pub fn page_number(offset: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 1;
    }
    offset / limit + 1
}

/// Number of pages needed to show `total` items at `page_size` per page.
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if page_size <= 0 {
        return 0;
    }
    (total + page_size - 1) / page_size
}
