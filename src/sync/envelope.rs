//! Sync response envelope
//!
//! One shape for every read and every write across all four entity
//! families; this shared envelope is what makes the per-family endpoints a
//! single protocol instead of four bespoke APIs.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Pagination block on every read response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl PageInfo {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: total > offset + limit,
        }
    }
}

/// Sync metadata block on every read response
///
/// `timestamp` is the server's clock at response build time; the client
/// persists it as the next `lastSyncedAt` cursor. Deriving a cursor from the
/// returned items would go wrong on an empty page, so the server always
/// supplies one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    pub timestamp: DateTime<Utc>,
    pub total_items: usize,
}

impl SyncMeta {
    pub fn now(total_items: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            total_items,
        }
    }
}

/// A page of entities plus pagination and sync metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
    pub sync: SyncMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        let sync = SyncMeta::now(items.len());
        Self {
            items,
            pagination: PageInfo::new(total, limit, offset),
            sync,
        }
    }
}

/// Per-item failure record inside a batch write response
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    /// Echo of the input that failed, for client-side correlation
    pub item: serde_json::Value,
    pub error: String,
}

/// Outcome of a best-effort batch write
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub errors: Vec<BatchError>,
    pub count: usize,
}

impl<T> BatchOutcome<T> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_more_boundary() {
        assert!(!PageInfo::new(20, 10, 10).has_more);
        assert!(PageInfo::new(21, 10, 10).has_more);
        assert!(!PageInfo::new(0, 50, 0).has_more);
    }

    #[test]
    fn test_page_counts_items_not_total() {
        let page = Page::new(vec![1, 2, 3], 100, 3, 0);
        assert_eq!(page.sync.total_items, 3);
        assert_eq!(page.pagination.total, 100);
        assert!(page.pagination.has_more);
    }
}
