//! /sync/schedule handlers

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::{parse_date, parse_param, ApiError, ApiResult, AppState};
use crate::auth::AuthContext;
use crate::error::SyncError;
use crate::storage::schedule;
use crate::sync::{apply_batch, Page};
use crate::types::{
    ItemId, NewScheduleItem, PageRequest, ScheduleFilter, ScheduleItemPatch,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    status: Option<String>,
    priority: Option<String>,
    subject: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    last_synced_at: Option<String>,
}

/// GET /sync/schedule
pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = PageRequest {
        limit: query.limit,
        offset: query.offset,
    };
    let (limit, offset) = page.effective();

    let filter = ScheduleFilter {
        status: parse_param(query.status.as_deref())?,
        priority: parse_param(query.priority.as_deref())?,
        subject: query.subject,
        due_after: parse_date("startDate", query.start_date.as_deref())?,
        due_before: parse_date("endDate", query.end_date.as_deref())?,
        since: parse_date("lastSyncedAt", query.last_synced_at.as_deref())?,
    };

    let (items, total) = state
        .pool
        .with_connection(|conn| schedule::list_items(conn, auth.owner(), &filter, limit, offset))?;
    let page = Page::new(items, total, limit, offset);
    Ok(Json(json!({"success": true, "data": page})))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleCreateBody {
    items: Vec<NewScheduleItem>,
}

/// POST /sync/schedule: batch create
pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<ScheduleCreateBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let outcome = state.pool.with_connection(|conn| {
        apply_batch(&body.items, |item| {
            schedule::create_item(conn, auth.owner(), item)
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
pub struct ScheduleUpdateBody {
    items: Vec<ScheduleItemPatch>,
}

/// PUT /sync/schedule: batch patch; a missing item fails alone
pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<ScheduleUpdateBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let outcome = state.pool.with_connection(|conn| {
        apply_batch(&body.items, |patch| {
            schedule::update_item(conn, auth.owner(), patch)
        })
    })?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "updated": outcome.succeeded,
            "errors": outcome.errors,
            "count": outcome.count,
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleDeleteQuery {
    id: Option<ItemId>,
    /// Comma-separated list of ids
    ids: Option<String>,
}

/// DELETE /sync/schedule
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ScheduleDeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = if let Some(id) = query.id {
        state
            .pool
            .with_connection(|conn| schedule::delete_item(conn, auth.owner(), id))?
    } else if let Some(ids) = query.ids {
        let ids = ids
            .split(',')
            .map(|raw| {
                raw.trim().parse::<ItemId>().map_err(|_| {
                    ApiError(SyncError::validation(format!("Invalid id: {}", raw)))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        state
            .pool
            .with_connection(|conn| schedule::delete_items(conn, auth.owner(), &ids))?
    } else {
        return Err(ApiError(SyncError::validation(
            "Either id or ids parameter is required",
        )));
    };

    Ok(Json(json!({"success": true, "data": {"deleted": deleted}})))
}
