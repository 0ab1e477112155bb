pub mod feedback;
pub mod models;
pub mod ratings;
pub mod session;
pub mod users;

use crate::middleware::auth;
use crate::state::AppState;
use utoipa::OpenApi;

use axum::{Router, middleware};
use std::sync::Arc;

/// Routes nested under `/v1`. Everything except registration requires an API
/// token.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .merge(session::router())
        .merge(users::router())
        .merge(ratings::router())
        .merge(models::router())
        .merge(feedback::router())
        .route_layer(middleware::from_fn_with_state(state, auth::require_user));

    Router::new().merge(users::public_router()).merge(protected)
}

#[derive(OpenApi)]
#[openapi()]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = V1Api::openapi();
    spec.merge(feedback::FeedbackApi::openapi());
    spec.merge(models::ModelsApi::openapi());
    spec.merge(ratings::RatingsApi::openapi());
    spec.merge(session::SessionApi::openapi());
    spec.merge(users::UsersApi::openapi());
    spec
}
