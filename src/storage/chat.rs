//! Chat session and message queries
//!
//! Sessions and messages are the two chat-family collections. A message
//! create additionally bumps the parent session's counters; that bump is a
//! separate statement from the insert, so a crash between the two leaves
//! `message_count` stale until the next full resync.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{opt_ts, push_window, ts};
use crate::error::{Result, SyncError};
use crate::types::{
    ChatMessage, ChatMessagePatch, ChatSession, ChatSessionPatch, MessageFilter, MessageRole,
    NewChatMessage, NewChatSession, SessionFilter,
};

const SESSION_COLUMNS: &str = "id, owner_id, session_id, title, subject, message_count,
        started_at, last_message_at, ended_at, total_tokens, summary, tags,
        created_at, updated_at, last_synced_at";

const MESSAGE_COLUMNS: &str = "id, owner_id, session_id, message_id, role, content,
        metadata, tokens, created_at, updated_at, last_synced_at";

fn session_from_row(row: &Row) -> rusqlite::Result<ChatSession> {
    let tags_json: String = row.get("tags")?;
    let started_at: String = row.get("started_at")?;
    let last_message_at: String = row.get("last_message_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_synced_at: String = row.get("last_synced_at")?;

    Ok(ChatSession {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        session_id: row.get("session_id")?,
        title: row.get("title")?,
        subject: row.get("subject")?,
        message_count: row.get("message_count")?,
        started_at: ts(&started_at),
        last_message_at: ts(&last_message_at),
        ended_at: opt_ts(ended_at),
        total_tokens: row.get("total_tokens")?,
        summary: row.get("summary")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at: ts(&created_at),
        updated_at: ts(&updated_at),
        last_synced_at: ts(&last_synced_at),
    })
}

fn message_from_row(row: &Row) -> rusqlite::Result<ChatMessage> {
    let role_str: String = row.get("role")?;
    let metadata_json: Option<String> = row.get("metadata")?;
    let tokens_json: Option<String> = row.get("tokens")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_synced_at: String = row.get("last_synced_at")?;

    Ok(ChatMessage {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        session_id: row.get("session_id")?,
        message_id: row.get("message_id")?,
        role: role_str.parse().unwrap_or(MessageRole::User),
        content: row.get("content")?,
        metadata: metadata_json.and_then(|s| serde_json::from_str(&s).ok()),
        tokens: tokens_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: ts(&created_at),
        updated_at: ts(&updated_at),
        last_synced_at: ts(&last_synced_at),
    })
}

/// Get a session by its client identifier, scoped to the owner
pub fn get_session(
    conn: &Connection,
    owner_id: &str,
    session_id: &str,
) -> Result<Option<ChatSession>> {
    let sql = format!(
        "SELECT {} FROM chat_sessions WHERE owner_id = ? AND session_id = ?",
        SESSION_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt
        .query_row(params![owner_id, session_id], session_from_row)
        .optional()?)
}

/// Get a message by its client identifier, scoped to the owner
pub fn get_message(
    conn: &Connection,
    owner_id: &str,
    message_id: &str,
) -> Result<Option<ChatMessage>> {
    let sql = format!(
        "SELECT {} FROM chat_messages WHERE owner_id = ? AND message_id = ?",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt
        .query_row(params![owner_id, message_id], message_from_row)
        .optional()?)
}

/// Create or fully replace a session, keyed by its client identifier
///
/// Last write wins: an existing session under the same owner is overwritten
/// with the incoming payload. A session identifier already claimed by a
/// different owner is rejected without touching the row.
pub fn upsert_session(
    conn: &Connection,
    owner_id: &str,
    input: &NewChatSession,
) -> Result<ChatSession> {
    input.validate()?;

    let now = Utc::now();
    let now_str = now.to_rfc3339();
    let started_at = input.started_at.unwrap_or(now).to_rfc3339();
    let last_message_at = input.last_message_at.unwrap_or(now).to_rfc3339();
    let tags_json = serde_json::to_string(&input.tags)?;

    let existing_owner: Option<String> = conn
        .query_row(
            "SELECT owner_id FROM chat_sessions WHERE session_id = ?",
            params![input.session_id],
            |row| row.get(0),
        )
        .optional()?;

    match existing_owner {
        Some(ref owner) if owner != owner_id => {
            return Err(SyncError::validation("Session ID already in use"));
        }
        Some(_) => {
            conn.execute(
                "UPDATE chat_sessions
                 SET title = ?, subject = ?, started_at = ?, last_message_at = ?,
                     ended_at = ?, total_tokens = ?, summary = ?, tags = ?,
                     updated_at = ?, last_synced_at = ?
                 WHERE owner_id = ? AND session_id = ?",
                params![
                    input.title,
                    input.subject,
                    started_at,
                    last_message_at,
                    input.ended_at.map(|d| d.to_rfc3339()),
                    input.total_tokens.unwrap_or(0),
                    input.summary,
                    tags_json,
                    now_str,
                    now_str,
                    owner_id,
                    input.session_id,
                ],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO chat_sessions
                    (owner_id, session_id, title, subject, message_count, started_at,
                     last_message_at, ended_at, total_tokens, summary, tags,
                     created_at, updated_at, last_synced_at)
                 VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    owner_id,
                    input.session_id,
                    input.title,
                    input.subject,
                    started_at,
                    last_message_at,
                    input.ended_at.map(|d| d.to_rfc3339()),
                    input.total_tokens.unwrap_or(0),
                    input.summary,
                    tags_json,
                    now_str,
                    now_str,
                    now_str,
                ],
            )?;
        }
    }

    get_session(conn, owner_id, &input.session_id)?
        .ok_or_else(|| SyncError::not_found("chat session", input.session_id.clone()))
}

/// Insert one message into a session
///
/// The parent session's `message_count`/`last_message_at` bump is issued as
/// a second statement after the insert commits; the two are intentionally
/// not atomic.
pub fn create_message(
    conn: &Connection,
    owner_id: &str,
    session_id: &str,
    input: &NewChatMessage,
) -> Result<ChatMessage> {
    input.validate()?;

    let now = Utc::now();
    let now_str = now.to_rfc3339();
    let metadata_json = input
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let tokens_json = input
        .tokens
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO chat_messages
            (owner_id, session_id, message_id, role, content, metadata, tokens,
             created_at, updated_at, last_synced_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            owner_id,
            session_id,
            input.message_id,
            input.role.as_str(),
            input.content,
            metadata_json,
            tokens_json,
            now_str,
            now_str,
            now_str,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            SyncError::validation(format!(
                "Message ID already exists: {}",
                input.message_id
            ))
        }
        other => SyncError::from(other),
    })?;

    bump_session_counters(conn, owner_id, session_id)?;

    get_message(conn, owner_id, &input.message_id)?
        .ok_or_else(|| SyncError::not_found("chat message", input.message_id.clone()))
}

/// Compensating update on the parent session after a message insert
fn bump_session_counters(conn: &Connection, owner_id: &str, session_id: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE chat_sessions
         SET message_count = message_count + 1,
             last_message_at = ?,
             updated_at = ?,
             last_synced_at = ?
         WHERE owner_id = ? AND session_id = ?",
        params![now, now, now, owner_id, session_id],
    )?;
    Ok(())
}

/// Apply a sparse patch to a session (last write wins, no version check)
pub fn update_session(
    conn: &Connection,
    owner_id: &str,
    session_id: &str,
    patch: &ChatSessionPatch,
) -> Result<ChatSession> {
    patch.validate()?;

    let now = Utc::now().to_rfc3339();
    let mut updates = vec![
        "updated_at = ?".to_string(),
        "last_synced_at = ?".to_string(),
    ];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> =
        vec![Box::new(now.clone()), Box::new(now)];

    if let Some(ref title) = patch.title {
        updates.push("title = ?".to_string());
        values.push(Box::new(title.clone()));
    }
    if let Some(ref subject) = patch.subject {
        updates.push("subject = ?".to_string());
        values.push(Box::new(subject.clone()));
    }
    if let Some(ended_at) = patch.ended_at {
        updates.push("ended_at = ?".to_string());
        values.push(Box::new(ended_at.to_rfc3339()));
    }
    if let Some(total_tokens) = patch.total_tokens {
        updates.push("total_tokens = ?".to_string());
        values.push(Box::new(total_tokens));
    }
    if let Some(ref summary) = patch.summary {
        updates.push("summary = ?".to_string());
        values.push(Box::new(summary.clone()));
    }
    if let Some(ref tags) = patch.tags {
        updates.push("tags = ?".to_string());
        values.push(Box::new(serde_json::to_string(tags)?));
    }

    let sql = format!(
        "UPDATE chat_sessions SET {} WHERE owner_id = ? AND session_id = ?",
        updates.join(", ")
    );
    values.push(Box::new(owner_id.to_string()));
    values.push(Box::new(session_id.to_string()));

    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
    let affected = conn.execute(&sql, param_refs.as_slice())?;

    if affected == 0 {
        return Err(SyncError::not_found("chat session", session_id.to_string()));
    }

    get_session(conn, owner_id, session_id)?
        .ok_or_else(|| SyncError::not_found("chat session", session_id.to_string()))
}

/// Apply a sparse patch to a message
pub fn update_message(
    conn: &Connection,
    owner_id: &str,
    message_id: &str,
    patch: &ChatMessagePatch,
) -> Result<ChatMessage> {
    patch.validate()?;

    let now = Utc::now().to_rfc3339();
    let mut updates = vec![
        "updated_at = ?".to_string(),
        "last_synced_at = ?".to_string(),
    ];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> =
        vec![Box::new(now.clone()), Box::new(now)];

    if let Some(ref content) = patch.content {
        updates.push("content = ?".to_string());
        values.push(Box::new(content.clone()));
    }
    if let Some(ref metadata) = patch.metadata {
        updates.push("metadata = ?".to_string());
        values.push(Box::new(serde_json::to_string(metadata)?));
    }
    if let Some(ref tokens) = patch.tokens {
        updates.push("tokens = ?".to_string());
        values.push(Box::new(serde_json::to_string(tokens)?));
    }

    let sql = format!(
        "UPDATE chat_messages SET {} WHERE owner_id = ? AND message_id = ?",
        updates.join(", ")
    );
    values.push(Box::new(owner_id.to_string()));
    values.push(Box::new(message_id.to_string()));

    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
    let affected = conn.execute(&sql, param_refs.as_slice())?;

    if affected == 0 {
        return Err(SyncError::not_found("chat message", message_id.to_string()));
    }

    get_message(conn, owner_id, message_id)?
        .ok_or_else(|| SyncError::not_found("chat message", message_id.to_string()))
}

/// List sessions with filters, watermark, and pagination; returns the page
/// and the total count under the same filter
pub fn list_sessions(
    conn: &Connection,
    owner_id: &str,
    filter: &SessionFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ChatSession>, i64)> {
    let mut conditions = vec!["owner_id = ?".to_string()];
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner_id.to_string())];

    if let Some(ref subject) = filter.subject {
        conditions.push("subject = ?".to_string());
        params_vec.push(Box::new(subject.clone()));
    }
    if let Some(after) = filter.started_after {
        conditions.push("started_at >= ?".to_string());
        params_vec.push(Box::new(after.to_rfc3339()));
    }
    if let Some(before) = filter.started_before {
        conditions.push("started_at <= ?".to_string());
        params_vec.push(Box::new(before.to_rfc3339()));
    }
    if let Some(since) = filter.since {
        // Strictly greater-than: the boundary record was already delivered
        conditions.push("last_synced_at > ?".to_string());
        params_vec.push(Box::new(since.to_rfc3339()));
    }

    let where_clause = conditions.join(" AND ");

    let total: i64 = {
        let sql = format!("SELECT COUNT(*) FROM chat_sessions WHERE {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();
        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?
    };

    let mut sql = format!(
        "SELECT {} FROM chat_sessions WHERE {} ORDER BY started_at DESC, id DESC",
        SESSION_COLUMNS, where_clause
    );
    push_window(&mut sql, &mut params_vec, limit, offset);

    let param_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(param_refs.as_slice(), session_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((sessions, total))
}

/// List messages with filters, watermark, and pagination
pub fn list_messages(
    conn: &Connection,
    owner_id: &str,
    filter: &MessageFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ChatMessage>, i64)> {
    let mut conditions = vec!["owner_id = ?".to_string()];
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner_id.to_string())];

    if let Some(ref session_id) = filter.session_id {
        conditions.push("session_id = ?".to_string());
        params_vec.push(Box::new(session_id.clone()));
    }
    if let Some(since) = filter.since {
        conditions.push("last_synced_at > ?".to_string());
        params_vec.push(Box::new(since.to_rfc3339()));
    }

    let where_clause = conditions.join(" AND ");

    let total: i64 = {
        let sql = format!("SELECT COUNT(*) FROM chat_messages WHERE {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();
        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?
    };

    let mut sql = format!(
        "SELECT {} FROM chat_messages WHERE {} ORDER BY created_at ASC, id ASC",
        MESSAGE_COLUMNS, where_clause
    );
    push_window(&mut sql, &mut params_vec, limit, offset);

    let param_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let messages = stmt
        .query_map(param_refs.as_slice(), message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((messages, total))
}

/// Delete a session and all of its messages (explicit two-step cascade)
///
/// Idempotent: deleting an absent session returns `(false, 0)`.
pub fn delete_session_cascade(
    conn: &Connection,
    owner_id: &str,
    session_id: &str,
) -> Result<(bool, i64)> {
    let session_deleted = conn.execute(
        "DELETE FROM chat_sessions WHERE owner_id = ? AND session_id = ?",
        params![owner_id, session_id],
    )?;

    let messages_deleted = conn.execute(
        "DELETE FROM chat_messages WHERE owner_id = ? AND session_id = ?",
        params![owner_id, session_id],
    )?;

    Ok((session_deleted > 0, messages_deleted as i64))
}

/// Delete a single message; returns whether a row was removed
pub fn delete_message(conn: &Connection, owner_id: &str, message_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM chat_messages WHERE owner_id = ? AND message_id = ?",
        params![owner_id, message_id],
    )?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    fn new_session(session_id: &str) -> NewChatSession {
        NewChatSession {
            session_id: session_id.to_string(),
            title: Some("Algebra review".to_string()),
            subject: Some("math".to_string()),
            started_at: None,
            last_message_at: None,
            ended_at: None,
            total_tokens: None,
            summary: None,
            tags: vec!["exam".to_string()],
        }
    }

    fn new_message(message_id: &str) -> NewChatMessage {
        NewChatMessage {
            message_id: message_id.to_string(),
            role: MessageRole::User,
            content: "How do I factor quadratics?".to_string(),
            metadata: None,
            tokens: None,
        }
    }

    #[test]
    fn test_upsert_session_creates_and_replaces() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                let created = upsert_session(conn, "alice", &new_session("s1"))?;
                assert_eq!(created.message_count, 0);
                assert_eq!(created.title.as_deref(), Some("Algebra review"));

                let mut replacement = new_session("s1");
                replacement.title = Some("Algebra review (cont.)".to_string());
                let replaced = upsert_session(conn, "alice", &replacement)?;
                assert_eq!(replaced.id, created.id);
                assert_eq!(replaced.title.as_deref(), Some("Algebra review (cont.)"));
                assert!(replaced.last_synced_at >= created.last_synced_at);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_upsert_session_rejects_foreign_identifier() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                upsert_session(conn, "alice", &new_session("s1"))?;
                let result = upsert_session(conn, "bob", &new_session("s1"));
                assert!(matches!(result, Err(SyncError::Validation(_))));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_message_create_bumps_session() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                upsert_session(conn, "alice", &new_session("s1"))?;
                create_message(conn, "alice", "s1", &new_message("m1"))?;
                create_message(conn, "alice", "s1", &new_message("m2"))?;

                let session = get_session(conn, "alice", "s1")?.unwrap();
                assert_eq!(session.message_count, 2);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_duplicate_message_id_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                upsert_session(conn, "alice", &new_session("s1"))?;
                create_message(conn, "alice", "s1", &new_message("m1"))?;
                let result = create_message(conn, "alice", "s1", &new_message("m1"));
                assert!(matches!(result, Err(SyncError::Validation(_))));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_cascade_delete_is_idempotent() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                upsert_session(conn, "alice", &new_session("s1"))?;
                create_message(conn, "alice", "s1", &new_message("m1"))?;
                create_message(conn, "alice", "s1", &new_message("m2"))?;

                let (deleted, messages) = delete_session_cascade(conn, "alice", "s1")?;
                assert!(deleted);
                assert_eq!(messages, 2);

                let (deleted, messages) = delete_session_cascade(conn, "alice", "s1")?;
                assert!(!deleted);
                assert_eq!(messages, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_update_session_not_found() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                let patch = ChatSessionPatch {
                    title: Some("New title".to_string()),
                    ..Default::default()
                };
                let result = update_session(conn, "alice", "missing", &patch);
                assert!(matches!(result, Err(SyncError::NotFound(_, _))));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_list_sessions_owner_scoped() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                upsert_session(conn, "alice", &new_session("s1"))?;
                upsert_session(conn, "bob", &new_session("s2"))?;

                let (sessions, total) =
                    list_sessions(conn, "alice", &SessionFilter::default(), 50, 0)?;
                assert_eq!(total, 1);
                assert_eq!(sessions.len(), 1);
                assert_eq!(sessions[0].session_id, "s1");
                Ok(())
            })
            .unwrap();
    }
}
