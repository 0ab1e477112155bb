//! Data exports for administrators.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::ExportStore;
use crate::entities::export::{SessionExport, UserStats};
use crate::error::ServerError;
use crate::schemas::admin::export::{MessageExportResponse, SessionExportResponse, UserStatsResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(export_chat_data, export_user_stats),
    components(schemas(SessionExportResponse, MessageExportResponse, UserStatsResponse))
)]
pub struct ExportApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/export/chat-data", get(export_chat_data))
        .route("/export/user-stats", get(export_user_stats))
}

#[utoipa::path(
    get,
    path = "/admin/export/chat-data",
    tag = "admin",
    responses(
        (status = 200, description = "Every session with its transcript", body = Vec<SessionExportResponse>),
        (status = 403, description = "Caller is not an administrator"),
    )
)]
pub async fn export_chat_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionExportResponse>>, ServerError> {
    let sessions = state.store.export_chat_data().await?;
    Ok(Json(sessions.iter().map(SessionExport::to_response).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/export/user-stats",
    tag = "admin",
    responses(
        (status = 200, description = "Activity counters per user", body = Vec<UserStatsResponse>),
        (status = 403, description = "Caller is not an administrator"),
    )
)]
pub async fn export_user_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserStatsResponse>>, ServerError> {
    let stats = state.store.user_stats().await?;
    Ok(Json(stats.iter().map(UserStats::to_response).collect()))
}
