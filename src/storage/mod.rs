//! Storage engine for StudySync
//!
//! One SQLite collection per entity family, owner-scoped queries, and the
//! watermark stamping that drives incremental sync.

pub mod chat;
mod connection;
mod migrations;
pub mod schedule;
pub mod voice;

pub use connection::{Storage, StoragePool};
pub use migrations::{run_migrations, SCHEMA_VERSION};

use chrono::{DateTime, Utc};

/// Parse a stored RFC3339 timestamp, falling back to now on corruption
pub(crate) fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Append a parameterized LIMIT/OFFSET window to a query
pub(crate) fn push_window(
    sql: &mut String,
    params: &mut Vec<Box<dyn rusqlite::ToSql>>,
    limit: i64,
    offset: i64,
) {
    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Box::new(limit));
    params.push(Box::new(offset));
}
