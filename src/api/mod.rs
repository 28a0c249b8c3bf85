//! HTTP surface for the sync protocol
//!
//! One read/write endpoint pair per entity family under `/sync/{family}`,
//! all converging on the shared response envelope. Every route requires a
//! Bearer sync token; the resolved owner identity is the only scope any
//! handler queries under.

mod chat;
mod schedule;
mod voice;

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthContext, TokenManager};
use crate::error::SyncError;
use crate::storage::StoragePool;
use crate::sync::sync_status;

/// Shared state injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<StoragePool>,
}

impl AppState {
    pub fn new(pool: Arc<StoragePool>) -> Self {
        Self { pool }
    }
}

/// Build the sync router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/sync/chat",
            get(chat::list)
                .post(chat::create)
                .put(chat::update)
                .delete(chat::delete),
        )
        .route(
            "/sync/schedule",
            get(schedule::list)
                .post(schedule::create)
                .put(schedule::update)
                .delete(schedule::delete),
        )
        .route(
            "/sync/voice",
            get(voice::list)
                .post(voice::create)
                .put(voice::update)
                .delete(voice::delete),
        )
        .route("/sync/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn status_handler(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<serde_json::Value>> {
    let status = state
        .pool
        .with_connection(|conn| sync_status(conn, auth.owner()))?;
    Ok(Json(serde_json::json!({
        "success": true,
        "stats": status,
    })))
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Handler result carrying the HTTP error mapping
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Wrapper turning [`SyncError`] into an HTTP response
#[derive(Debug)]
pub struct ApiError(pub SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Internal details stay in the log, not in the response body
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Authentication extractor
// ---------------------------------------------------------------------------

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError(SyncError::Unauthorized("Missing token".to_string())))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError(SyncError::Unauthorized("Missing token".to_string())))?;

        let claims = state
            .pool
            .with_connection(|conn| TokenManager::new(conn).validate(token))?
            .ok_or_else(|| ApiError(SyncError::Unauthorized("Invalid token".to_string())))?;

        Ok(AuthContext::from(claims))
    }
}

// ---------------------------------------------------------------------------
// Query parameter parsing
// ---------------------------------------------------------------------------

/// Parse an optional RFC3339 query parameter, rejecting malformed values
/// instead of silently ignoring them
pub(crate) fn parse_date(
    name: &str,
    value: Option<&str>,
) -> std::result::Result<Option<DateTime<Utc>>, ApiError> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| {
                ApiError(SyncError::validation(format!(
                    "Invalid {} value: {}",
                    name, raw
                )))
            }),
    }
}

/// Parse an optional enum-ish query parameter via FromStr
pub(crate) fn parse_param<T: std::str::FromStr<Err = String>>(
    value: Option<&str>,
) -> std::result::Result<Option<T>, ApiError> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ApiError(SyncError::validation(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("startDate", Some("not-a-date")).is_err());
        assert!(parse_date("startDate", None).unwrap().is_none());
        assert!(parse_date("startDate", Some("2026-01-15T10:00:00Z"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_parse_param_propagates_fromstr_error() {
        use crate::types::Priority;
        let parsed: Option<Priority> = parse_param(Some("urgent")).unwrap();
        assert_eq!(parsed, Some(Priority::Urgent));

        let result: std::result::Result<Option<Priority>, _> = parse_param(Some("sideways"));
        assert!(result.is_err());
    }
}
