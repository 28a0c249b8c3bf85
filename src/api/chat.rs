//! /sync/chat handlers

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{parse_date, ApiError, ApiResult, AppState};
use crate::auth::AuthContext;
use crate::error::SyncError;
use crate::storage::chat;
use crate::sync::{apply_batch, Page};
use crate::types::{
    ChatMessagePatch, ChatSessionPatch, MessageFilter, NewChatMessage, NewChatSession,
    PageRequest, SessionFilter,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    /// "sessions" or "messages"
    #[serde(rename = "type")]
    kind: Option<String>,
    session_id: Option<String>,
    subject: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    last_synced_at: Option<String>,
}

/// GET /sync/chat: sessions by default, messages when a session is named
pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ChatQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = PageRequest {
        limit: query.limit,
        offset: query.offset,
    };
    let (limit, offset) = page.effective();
    let since = parse_date("lastSyncedAt", query.last_synced_at.as_deref())?;

    let wants_sessions =
        query.kind.as_deref() == Some("sessions") || query.session_id.is_none();

    if wants_sessions {
        let filter = SessionFilter {
            subject: query.subject,
            started_after: parse_date("startDate", query.start_date.as_deref())?,
            started_before: parse_date("endDate", query.end_date.as_deref())?,
            since,
        };
        let (sessions, total) = state.pool.with_connection(|conn| {
            chat::list_sessions(conn, auth.owner(), &filter, limit, offset)
        })?;
        let page = Page::new(sessions, total, limit, offset);
        Ok(Json(json!({"success": true, "data": page})))
    } else {
        let session_id = query.session_id;
        let filter = MessageFilter { session_id, since };
        let (messages, total) = state.pool.with_connection(|conn| {
            chat::list_messages(conn, auth.owner(), &filter, limit, offset)
        })?;
        let page = Page::new(messages, total, limit, offset);
        Ok(Json(json!({"success": true, "data": page})))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBatch {
    session_id: String,
    messages: Vec<NewChatMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ChatWrite {
    /// Create or fully replace one session
    Session(NewChatSession),
    /// Batch-create messages within one session
    Messages(MessageBatch),
}

/// POST /sync/chat
pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<ChatWrite>,
) -> ApiResult<Json<serde_json::Value>> {
    match body {
        ChatWrite::Session(input) => {
            let session = state
                .pool
                .with_connection(|conn| chat::upsert_session(conn, auth.owner(), &input))?;
            Ok(Json(json!({"success": true, "data": {"session": session}})))
        }
        ChatWrite::Messages(batch) => {
            let outcome = state.pool.with_connection(|conn| {
                apply_batch(&batch.messages, |message| {
                    chat::create_message(conn, auth.owner(), &batch.session_id, message)
                })
            })?;
            Ok(Json(json!({
                "success": true,
                "data": {
                    "created": outcome.succeeded,
                    "errors": outcome.errors,
                    "count": outcome.count,
                }
            })))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    session_id: String,
    #[serde(flatten)]
    patch: ChatSessionPatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUpdate {
    message_id: String,
    #[serde(flatten)]
    patch: ChatMessagePatch,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ChatUpdate {
    Session(SessionUpdate),
    Message(MessageUpdate),
}

/// PUT /sync/chat: single-entity patch
pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<ChatUpdate>,
) -> ApiResult<Json<serde_json::Value>> {
    match body {
        ChatUpdate::Session(update) => {
            let session = state.pool.with_connection(|conn| {
                chat::update_session(conn, auth.owner(), &update.session_id, &update.patch)
            })?;
            Ok(Json(json!({"success": true, "data": {"session": session}})))
        }
        ChatUpdate::Message(update) => {
            let message = state.pool.with_connection(|conn| {
                chat::update_message(conn, auth.owner(), &update.message_id, &update.patch)
            })?;
            Ok(Json(json!({"success": true, "data": {"message": message}})))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDeleteQuery {
    session_id: Option<String>,
    message_id: Option<String>,
}

/// DELETE /sync/chat: session cascade or single message
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ChatDeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(session_id) = query.session_id {
        let (deleted_session, deleted_messages) = state.pool.with_connection(|conn| {
            chat::delete_session_cascade(conn, auth.owner(), &session_id)
        })?;
        Ok(Json(json!({
            "success": true,
            "data": {
                "deletedSession": deleted_session,
                "deletedMessages": deleted_messages,
            }
        })))
    } else if let Some(message_id) = query.message_id {
        let deleted = state
            .pool
            .with_connection(|conn| chat::delete_message(conn, auth.owner(), &message_id))?;
        Ok(Json(json!({"success": true, "data": {"deleted": deleted}})))
    } else {
        Err(ApiError(SyncError::validation(
            "Either sessionId or messageId is required",
        )))
    }
}
