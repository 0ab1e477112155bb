//! Runtime configuration (system prompt, session defaults).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::config::{
    DEFAULT_MAX_TOKENS_KEY, DEFAULT_MODEL_KEY, DEFAULT_REPEAT_PENALTY_KEY, DEFAULT_TEMPERATURE_KEY,
    DEFAULT_TOP_K_KEY, DEFAULT_TOP_P_KEY, SYSTEM_PROMPT_KEY,
};
use crate::entities::{ConfigStore, User};
use crate::error::ServerError;
use crate::schemas::admin::config::{ConfigEntry, SetConfigBody};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_config, get_config_value, set_config_value),
    components(schemas(ConfigEntry, SetConfigBody))
)]
pub struct ConfigApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/config", get(list_config))
        .route("/config/{key}", get(get_config_value).put(set_config_value))
}

/// Normalise a value for a known key, rejecting values the session defaults
/// could not use. Unknown keys are stored verbatim.
fn normalise_value(key: &str, value: &str) -> Result<String, ServerError> {
    let trimmed = value.trim();
    match key {
        DEFAULT_MODEL_KEY if trimmed.is_empty() => {
            Err(ServerError::BadRequest("default_model must not be empty".into()))
        }
        SYSTEM_PROMPT_KEY | DEFAULT_MODEL_KEY => Ok(trimmed.to_owned()),
        DEFAULT_TEMPERATURE_KEY | DEFAULT_TOP_P_KEY | DEFAULT_REPEAT_PENALTY_KEY => trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|_| trimmed.to_owned())
            .ok_or_else(|| ServerError::BadRequest(format!("{key} must be a number"))),
        DEFAULT_MAX_TOKENS_KEY | DEFAULT_TOP_K_KEY => trimmed
            .parse::<i64>()
            .map(|_| trimmed.to_owned())
            .map_err(|_| ServerError::BadRequest(format!("{key} must be an integer"))),
        _ => Ok(value.to_owned()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/config",
    tag = "admin",
    responses(
        (status = 200, description = "List of all configuration entries", body = Vec<ConfigEntry>),
        (status = 401, description = "Missing or invalid API token"),
        (status = 403, description = "Caller is not an administrator"),
    )
)]
pub async fn list_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ConfigEntry>>, ServerError> {
    let entries = state.store.list_config_values().await?;
    Ok(Json(
        entries
            .into_iter()
            .map(|(key, value)| ConfigEntry { key, value })
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/admin/config/{key}",
    tag = "admin",
    params(("key" = String, Path, description = "Config key")),
    responses(
        (status = 200, description = "Get a configuration entry by key", body = ConfigEntry),
        (status = 404, description = "Config key not found"),
    )
)]
pub async fn get_config_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ConfigEntry>, ServerError> {
    let value = state
        .store
        .get_config_value(&key)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("config key '{key}' not found")))?;
    Ok(Json(ConfigEntry { key, value }))
}

#[utoipa::path(
    put,
    path = "/admin/config/{key}",
    tag = "admin",
    params(("key" = String, Path, description = "Config key")),
    request_body = SetConfigBody,
    responses(
        (status = 200, description = "Stored configuration entry", body = ConfigEntry),
        (status = 400, description = "Value not valid for this key"),
    )
)]
pub async fn set_config_value(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<User>,
    Path(key): Path<String>,
    Json(body): Json<SetConfigBody>,
) -> Result<Json<ConfigEntry>, ServerError> {
    let value = normalise_value(&key, &body.value)?;
    state.store.set_config_value(&key, &value).await?;
    info!(key = %key, admin = %admin.username, "config updated");
    Ok(Json(ConfigEntry { key, value }))
}
