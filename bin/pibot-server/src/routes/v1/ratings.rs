use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::Utc;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{ModelRating, RatingStore, SessionStore, User};
use crate::error::ServerError;
use crate::schemas::v1::ratings::{RateRequest, RatingResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(rate_session), components(schemas(RateRequest, RatingResponse)))]
pub struct RatingsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ratings", post(rate_session))
}

/// Rate the model of one of the caller's sessions. Rating again replaces the
/// previous score.
#[utoipa::path(
    post,
    path = "/v1/ratings",
    tag = "ratings",
    request_body = RateRequest,
    responses(
        (status = 200, description = "Rating stored", body = RatingResponse),
        (status = 400, description = "Rating outside 1 to 5"),
        (status = 404, description = "No such session for the caller"),
    )
)]
pub async fn rate_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<RateRequest>,
) -> Result<Json<RatingResponse>, ServerError> {
    req.validate()?;
    let session = state
        .store
        .get_owned_session(&req.session_id, &user.id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("session '{}' not found", req.session_id)))?;

    let rating = ModelRating {
        id: Uuid::new_v4().to_string(),
        session_id: session.id,
        user_id: user.id,
        model_name: session.model_name,
        rating: req.rating,
        created_at: Utc::now(),
    };
    state.store.upsert_rating(rating.clone()).await?;
    Ok(Json(rating.to_response()))
}

#[cfg(test)]
mod test {
    use crate::test_support::{call, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn rating_range_is_enforced() {
        let (app, _) = test_app().await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/ratings",
            Some("tok-alice"),
            Some(json!({"session_id": "s1", "rating": 6})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/ratings",
            Some("tok-alice"),
            Some(json!({"session_id": "s1", "rating": 4})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "tinyllama");
    }

    #[tokio::test]
    async fn cannot_rate_someone_elses_session() {
        let (app, _) = test_app().await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/ratings",
            Some("tok-root"),
            Some(json!({"session_id": "s1", "rating": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
