use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::entities::user::{generate_token, is_unique_violation};
use crate::entities::{User, UserStore};
use crate::error::ServerError;
use crate::schemas::v1::users::{RegisterRequest, RegisterResponse, UserResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(register, me),
    components(schemas(RegisterRequest, RegisterResponse, UserResponse))
)]
pub struct UsersApi;

/// Registration is public; everything else requires a token.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(register))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users/me", get(me))
}

#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User created; the token is shown only once", body = RegisterResponse),
        (status = 400, description = "Invalid username or e-mail"),
        (status = 409, description = "Username or e-mail already registered"),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ServerError> {
    req.validate()?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username.trim().to_owned(),
        email: req.email.trim().to_owned(),
        api_token: generate_token(),
        is_admin: false,
        created_at: Utc::now(),
    };
    state.store.create_user(user.clone()).await.map_err(|e| {
        if is_unique_violation(&e) {
            ServerError::Conflict("username or e-mail already registered".into())
        } else {
            e.into()
        }
    })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(Json(RegisterResponse {
        id: user.id,
        username: user.username,
        api_token: user.api_token,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "users",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid API token"),
    )
)]
pub async fn me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(user.to_response())
}
