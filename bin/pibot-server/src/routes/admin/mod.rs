pub mod config;
pub mod export;
pub mod models;
pub mod status;

use crate::middleware::auth;
use crate::state::AppState;

use axum::{Router, middleware};
use std::sync::Arc;
use utoipa::OpenApi;

/// Routes nested under `/admin`; callers must hold an administrator token.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(config::router())
        .merge(export::router())
        .merge(models::router())
        .merge(status::router())
        .route_layer(middleware::from_fn(auth::require_admin))
        .route_layer(middleware::from_fn_with_state(state, auth::require_user))
}

#[derive(OpenApi)]
#[openapi()]
pub struct AdminApi;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = AdminApi::openapi();
    spec.merge(config::ConfigApi::openapi());
    spec.merge(export::ExportApi::openapi());
    spec.merge(models::ModelsApi::openapi());
    spec.merge(status::StatusApi::openapi());
    spec
}
