use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::{FeedbackStore, User};
use crate::error::ServerError;
use crate::schemas::v1::feedback::{FeedbackRequest, FeedbackResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(submit_feedback), components(schemas(FeedbackRequest, FeedbackResponse)))]
pub struct FeedbackApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/feedback", post(submit_feedback))
}

#[utoipa::path(
    post,
    path = "/v1/feedback",
    tag = "feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback recorded", body = FeedbackResponse),
        (status = 400, description = "Unknown type or priority, or title/description length out of range"),
    )
)]
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ServerError> {
    req.validate()?;
    let feedback = req.into_feedback(&user.id);
    state.store.create_feedback(feedback.clone()).await?;
    info!(user = %user.username, kind = %feedback.feedback_type, "feedback submitted");
    Ok(Json(feedback.to_response()))
}

#[cfg(test)]
mod test {
    use crate::test_support::{call, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn feedback_is_stored_for_the_caller() {
        let (app, _) = test_app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/feedback",
            Some("tok-alice"),
            Some(json!({
                "feedback_type": "feature",
                "title": "Dark mode",
                "description": "Please add a dark theme to the chat page.",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["priority"], "medium");
        assert_eq!(body["status"], "open");

        let (_, listing) = call(&app, Method::GET, "/admin/feedback", Some("tok-root"), None).await;
        assert_eq!(listing["feedback"][0]["username"], "alice");
        assert_eq!(listing["feedback"][0]["title"], "Dark mode");
    }

    #[tokio::test]
    async fn invalid_feedback_is_rejected() {
        let (app, _) = test_app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/feedback",
            Some("tok-alice"),
            Some(json!({
                "feedback_type": "rant",
                "title": "Dark mode",
                "description": "Please add a dark theme to the chat page.",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("feedback_type"));

        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/feedback",
            None,
            Some(json!({"feedback_type": "bug", "title": "Crash", "description": "crashes on start"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
