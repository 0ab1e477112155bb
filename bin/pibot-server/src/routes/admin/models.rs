//! Model downloads started by administrators.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::User;
use crate::error::ServerError;
use crate::generation::download::relay_pull;
use crate::schemas::admin::models::{PullModelRequest, PullModelResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(pull_model), components(schemas(PullModelRequest, PullModelResponse)))]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/models/pull", post(pull_model))
}

/// Start downloading a model on the backend. Progress is pushed to the
/// caller's WebSocket connections as `download_progress` events.
#[utoipa::path(
    post,
    path = "/admin/models/pull",
    tag = "admin",
    request_body = PullModelRequest,
    responses(
        (status = 200, description = "Download started", body = PullModelResponse),
        (status = 400, description = "Empty model name"),
        (status = 403, description = "Caller is not an administrator"),
    )
)]
pub async fn pull_model(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<PullModelRequest>,
) -> Result<Json<PullModelResponse>, ServerError> {
    let model = req.model_name.trim().to_owned();
    if model.is_empty() {
        return Err(ServerError::BadRequest("model name is required".into()));
    }

    info!(model = %model, admin = %user.username, "model download requested");
    let backend = Arc::clone(&state.backend);
    let sink = state.gateway.room(&user.id);
    let message = format!("Download started for {model}.");
    tokio::spawn(async move {
        relay_pull(&backend, &model, &sink).await;
    });

    Ok(Json(PullModelResponse { message }))
}
