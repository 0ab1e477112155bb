use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::Utc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::entities::config::{DEFAULT_MODEL_KEY, default_parameters};
use crate::entities::{ChatMessage, ChatSession, ChatStore, ConfigStore, MessageRole, SessionStore, User};
use crate::error::ServerError;
use crate::schemas::v1::session::{
    CreateSessionRequest, MessageResponse, ParameterOverrides, ParametersResponse, SessionResponse,
};
use crate::state::AppState;

/// First assistant message of every new session.
pub const WELCOME_MESSAGE: &str = "Welcome to PiBot, how can I help you?";

#[derive(OpenApi)]
#[openapi(
    paths(create_session, list_sessions, delete_session, update_parameters, list_session_messages),
    components(schemas(
        CreateSessionRequest,
        ParameterOverrides,
        ParametersResponse,
        SessionResponse,
        MessageResponse
    ))
)]
pub struct SessionApi;

/// Register session routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", axum::routing::delete(delete_session))
        .route("/sessions/{id}/parameters", put(update_parameters))
        .route("/sessions/{id}/messages", get(list_session_messages))
}

/// Model for a new session: administrators may choose, everyone else gets
/// the configured default.
async fn resolve_model(state: &AppState, user: &User, requested: Option<String>) -> Result<String, ServerError> {
    if user.is_admin {
        if let Some(model) = requested.map(|m| m.trim().to_owned()).filter(|m| !m.is_empty()) {
            return Ok(model);
        }
    }
    Ok(state
        .store
        .get_config_value(DEFAULT_MODEL_KEY)
        .await?
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.default_model.clone()))
}

async fn find_owned(state: &AppState, id: &str, user: &User) -> Result<ChatSession, ServerError> {
    state
        .store
        .get_owned_session(id, &user.id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("session '{id}' not found")))
}

#[utoipa::path(
    post,
    path = "/v1/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created", body = SessionResponse),
        (status = 401, description = "Missing or invalid API token"),
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ServerError> {
    let model_name = resolve_model(&state, &user, req.model).await?;
    let parameters = req.parameters.apply(default_parameters(state.store.as_ref()).await?);

    let now = Utc::now();
    let session = ChatSession {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        title: format!("Chat with {model_name}"),
        model_name,
        parameters,
        created_at: now,
        updated_at: now,
    };
    state.store.create_session(session.clone()).await?;
    state
        .store
        .append_message(ChatMessage::new(&session.id, MessageRole::Assistant, WELCOME_MESSAGE))
        .await?;

    info!(session_id = %session.id, user_id = %user.id, model = %session.model_name, "session created");
    Ok(Json(session.to_response()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "Sessions of the caller", body = Vec<SessionResponse>),
        (status = 401, description = "Missing or invalid API token"),
    )
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<SessionResponse>>, ServerError> {
    let sessions = state.store.list_sessions_for_user(&user.id).await?;
    Ok(Json(sessions.iter().map(ChatSession::to_response).collect()))
}

#[utoipa::path(
    delete,
    path = "/v1/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session deleted", body = serde_json::Value),
        (status = 404, description = "No such session for the caller"),
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let session = find_owned(&state, &id, &user).await?;
    state.store.delete_session(&session.id).await?;
    info!(session_id = %session.id, user_id = %user.id, "session deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[utoipa::path(
    put,
    path = "/v1/sessions/{id}/parameters",
    tag = "sessions",
    params(("id" = String, Path, description = "Session id")),
    request_body = ParameterOverrides,
    responses(
        (status = 200, description = "Stored (clamped) parameters", body = ParametersResponse),
        (status = 404, description = "No such session for the caller"),
    )
)]
pub async fn update_parameters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(overrides): Json<ParameterOverrides>,
) -> Result<Json<ParametersResponse>, ServerError> {
    let session = find_owned(&state, &id, &user).await?;
    let parameters = overrides.apply(session.parameters);
    state
        .store
        .update_session_parameters(&session.id, parameters)
        .await?;
    Ok(Json(parameters.to_response()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{id}/messages",
    tag = "sessions",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Transcript in chronological order", body = Vec<MessageResponse>),
        (status = 404, description = "No such session for the caller"),
    )
)]
pub async fn list_session_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ServerError> {
    let session = find_owned(&state, &id, &user).await?;
    let messages = state.store.list_messages(&session.id).await?;
    Ok(Json(messages.iter().map(ChatMessage::to_response).collect()))
}
