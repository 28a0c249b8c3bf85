//! Per-owner sync status overview

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::Result;

/// Newest watermark per family, if the family has any rows
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSync {
    pub schedules: Option<DateTime<Utc>>,
    pub chats: Option<DateTime<Utc>>,
    pub voice: Option<DateTime<Utc>>,
}

/// Counts and watermarks a client uses to decide what to pull
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub schedules: i64,
    pub chat_sessions: i64,
    pub chat_messages: i64,
    pub voice_commands: i64,
    pub last_sync: LastSync,
}

fn count(conn: &Connection, table: &str, owner_id: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE owner_id = ?", table);
    Ok(conn.query_row(&sql, params![owner_id], |row| row.get(0))?)
}

fn newest_watermark(
    conn: &Connection,
    table: &str,
    owner_id: &str,
) -> Result<Option<DateTime<Utc>>> {
    let sql = format!(
        "SELECT last_synced_at FROM {} WHERE owner_id = ? ORDER BY last_synced_at DESC LIMIT 1",
        table
    );
    let raw: Option<String> = conn
        .query_row(&sql, params![owner_id], |row| row.get(0))
        .optional()?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }))
}

/// Build the status overview for one owner
pub fn sync_status(conn: &Connection, owner_id: &str) -> Result<SyncStatus> {
    Ok(SyncStatus {
        schedules: count(conn, "schedule_items", owner_id)?,
        chat_sessions: count(conn, "chat_sessions", owner_id)?,
        chat_messages: count(conn, "chat_messages", owner_id)?,
        voice_commands: count(conn, "voice_commands", owner_id)?,
        last_sync: LastSync {
            schedules: newest_watermark(conn, "schedule_items", owner_id)?,
            chats: newest_watermark(conn, "chat_messages", owner_id)?,
            voice: newest_watermark(conn, "voice_commands", owner_id)?,
        },
    })
}
