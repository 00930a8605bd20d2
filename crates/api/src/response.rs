//! Shared response envelope types for API handlers.
//!
//! Workflow endpoints answer with a `{ "data": ... }` envelope. The executor
//! façade is the exception: the engine reads its bodies directly.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Offset-paginated listing.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    /// Total matching rows across all pages.
    pub count: i64,
    /// 1-based page number.
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub data: Vec<T>,
}
