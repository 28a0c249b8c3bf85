//! /sync/voice handlers

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{parse_date, ApiError, ApiResult, AppState};
use crate::auth::AuthContext;
use crate::error::SyncError;
use crate::storage::voice;
use crate::sync::{apply_batch, Page, SyncMeta};
use crate::types::{
    CommandFilter, CommandSelector, ItemId, NewVoiceCommand, PageRequest, VoiceCommandPatch,
    VoiceSettingsPatch,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceQuery {
    /// "settings" (default) or "commands"
    #[serde(rename = "type")]
    kind: Option<String>,
    session_id: Option<String>,
    successful: Option<bool>,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    last_synced_at: Option<String>,
}

/// GET /sync/voice: settings singleton or command history
pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<VoiceQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    match query.kind.as_deref() {
        Some("settings") | None => {
            let (settings, created) = state
                .pool
                .with_connection(|conn| voice::get_or_create_settings(conn, auth.owner()))?;
            let sync = SyncMeta::now(1);
            Ok(Json(json!({
                "success": true,
                "data": {
                    "settings": settings,
                    "sync": {
                        "timestamp": sync.timestamp,
                        "created": created,
                    }
                }
            })))
        }
        Some("commands") => {
            let page = PageRequest {
                limit: query.limit,
                offset: query.offset,
            };
            let (limit, offset) = page.effective();
            let filter = CommandFilter {
                session_id: query.session_id,
                successful: query.successful,
                executed_after: parse_date("startDate", query.start_date.as_deref())?,
                executed_before: parse_date("endDate", query.end_date.as_deref())?,
                since: parse_date("lastSyncedAt", query.last_synced_at.as_deref())?,
            };
            let (commands, total) = state.pool.with_connection(|conn| {
                voice::list_commands(conn, auth.owner(), &filter, limit, offset)
            })?;
            let page = Page::new(commands, total, limit, offset);
            Ok(Json(json!({"success": true, "data": page})))
        }
        Some(other) => Err(ApiError(SyncError::validation(format!(
            "Invalid type: {}. Must be \"settings\" or \"commands\"",
            other
        )))),
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandBatch {
    commands: Vec<NewVoiceCommand>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum VoiceWrite {
    Commands(CommandBatch),
}

/// POST /sync/voice: batch-create command history
pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<VoiceWrite>,
) -> ApiResult<Json<serde_json::Value>> {
    let VoiceWrite::Commands(batch) = body;
    let outcome = state.pool.with_connection(|conn| {
        apply_batch(&batch.commands, |command| {
            voice::create_command(conn, auth.owner(), command)
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

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum VoiceUpdate {
    /// Upsert the settings singleton
    Settings(VoiceSettingsPatch),
    /// Patch one command by id
    Command(VoiceCommandPatch),
}

/// PUT /sync/voice
pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<VoiceUpdate>,
) -> ApiResult<Json<serde_json::Value>> {
    match body {
        VoiceUpdate::Settings(patch) => {
            let settings = state
                .pool
                .with_connection(|conn| voice::upsert_settings(conn, auth.owner(), &patch))?;
            Ok(Json(json!({"success": true, "data": {"settings": settings}})))
        }
        VoiceUpdate::Command(patch) => {
            let command = state
                .pool
                .with_connection(|conn| voice::update_command(conn, auth.owner(), &patch))?;
            Ok(Json(json!({"success": true, "data": {"command": command}})))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceDeleteQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    id: Option<ItemId>,
    session_id: Option<String>,
    older_than: Option<String>,
}

/// DELETE /sync/voice: commands by id, session, or age
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<VoiceDeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    if query.kind.as_deref() != Some("commands") {
        return Err(ApiError(SyncError::validation(
            "Invalid type. Only \"commands\" deletion is supported",
        )));
    }

    let selector = if let Some(id) = query.id {
        CommandSelector::ById(id)
    } else if let Some(session_id) = query.session_id {
        CommandSelector::BySession(session_id)
    } else if let Some(older_than) = query.older_than {
        let cutoff = parse_date("olderThan", Some(&older_than))?
            .ok_or_else(|| ApiError(SyncError::validation("Invalid olderThan value")))?;
        CommandSelector::OlderThan(cutoff)
    } else {
        return Err(ApiError(SyncError::validation(
            "Either id, sessionId, or olderThan parameter is required",
        )));
    };

    let deleted = state
        .pool
        .with_connection(|conn| voice::delete_commands(conn, auth.owner(), &selector))?;
    Ok(Json(json!({"success": true, "data": {"deleted": deleted}})))
}
