use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;
use utoipa::OpenApi;

use crate::entities::config::default_parameters;
use crate::error::ServerError;
use crate::generation::OllamaBackend;
use crate::schemas::v1::models::{BackendStatusResponse, ModelsResponse};
use crate::schemas::v1::session::ParametersResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_models, backend_status, get_default_parameters),
    components(schemas(ModelsResponse, BackendStatusResponse))
)]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/models", get(list_models))
        .route("/backend/status", get(backend_status))
        .route("/default-parameters", get(get_default_parameters))
}

#[utoipa::path(
    get,
    path = "/v1/models",
    tag = "models",
    responses(
        (status = 200, description = "Installed models, or a fallback catalogue when the backend is unreachable", body = ModelsResponse),
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.backend.available_models().await,
    })
}

#[utoipa::path(
    get,
    path = "/v1/backend/status",
    tag = "models",
    responses(
        (status = 200, description = "Reachability of the generation backend", body = BackendStatusResponse),
    )
)]
pub async fn backend_status(State(state): State<Arc<AppState>>) -> Json<BackendStatusResponse> {
    Json(backend_report(&state.backend).await)
}

/// Reachability of `backend` and its installed models; shared with the admin
/// status page.
pub(crate) async fn backend_report(backend: &OllamaBackend) -> BackendStatusResponse {
    match backend.list_models().await {
        Ok(models) => BackendStatusResponse {
            status: "online".into(),
            models: Some(models),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "generation backend unreachable");
            BackendStatusResponse {
                status: "offline".into(),
                models: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/default-parameters",
    tag = "models",
    responses(
        (status = 200, description = "Parameters applied to new sessions", body = ParametersResponse),
    )
)]
pub async fn get_default_parameters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ParametersResponse>, ServerError> {
    let parameters = default_parameters(state.store.as_ref()).await?;
    Ok(Json(parameters.to_response()))
}
