//! System overview and user feedback for administrators.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use utoipa::OpenApi;

use crate::entities::feedback::FeedbackEntry;
use crate::entities::{ExportStore, FeedbackStore};
use crate::error::ServerError;
use crate::routes::v1::models::backend_report;
use crate::schemas::admin::status::{
    DatabaseStatsResponse, FeedbackEntryResponse, FeedbackListResponse, SystemStatusResponse,
};
use crate::state::AppState;

/// Feedback entries returned by the admin listing.
const FEEDBACK_PAGE: i64 = 20;

#[derive(OpenApi)]
#[openapi(
    paths(system_status, list_feedback),
    components(schemas(
        SystemStatusResponse,
        DatabaseStatsResponse,
        FeedbackListResponse,
        FeedbackEntryResponse
    ))
)]
pub struct StatusApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(system_status))
        .route("/feedback", get(list_feedback))
}

#[utoipa::path(
    get,
    path = "/admin/status",
    tag = "admin",
    responses(
        (status = 200, description = "Database counters and backend reachability", body = SystemStatusResponse),
        (status = 403, description = "Caller is not an administrator"),
    )
)]
pub async fn system_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemStatusResponse>, ServerError> {
    let now = Utc::now();
    let stats = state.store.database_stats(now - Duration::days(1)).await?;
    let backend = backend_report(&state.backend).await;
    Ok(Json(SystemStatusResponse {
        timestamp: now.to_rfc3339(),
        database: stats.to_response(),
        backend,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/feedback",
    tag = "admin",
    responses(
        (status = 200, description = "Most recent feedback, newest first", body = FeedbackListResponse),
        (status = 403, description = "Caller is not an administrator"),
    )
)]
pub async fn list_feedback(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FeedbackListResponse>, ServerError> {
    let entries = state.store.recent_feedback(FEEDBACK_PAGE).await?;
    Ok(Json(FeedbackListResponse {
        feedback: entries.iter().map(FeedbackEntry::to_response).collect(),
    }))
}
