use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::entities::{Feedback, FeedbackPriority, FeedbackType};

/// A bug report or suggestion from a signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct FeedbackRequest {
    /// One of `bug`, `feature`, `improvement`, `general`.
    #[validate(custom(function = "known_feedback_type"))]
    pub feedback_type: String,
    #[validate(length(min = 5, max = 200, message = "title must be 5 to 200 characters"))]
    pub title: String,
    #[validate(length(min = 10, message = "description must be at least 10 characters"))]
    pub description: String,
    /// `low`, `medium` or `high`; `medium` when absent.
    #[validate(custom(function = "known_priority"))]
    pub priority: Option<String>,
}

impl FeedbackRequest {
    /// The request as a new feedback row. Call after [`Validate::validate`];
    /// unknown values fall back to `general` and `medium`.
    pub fn into_feedback(self, user_id: &str) -> Feedback {
        let feedback_type = FeedbackType::from_str(&self.feedback_type).unwrap_or(FeedbackType::General);
        let priority = self
            .priority
            .as_deref()
            .and_then(|p| FeedbackPriority::from_str(p).ok())
            .unwrap_or_default();
        Feedback::new(user_id, feedback_type, priority, self.title, self.description)
    }
}

fn known_feedback_type(value: &str) -> Result<(), ValidationError> {
    FeedbackType::from_str(value).map(|_| ()).map_err(|_| {
        ValidationError::new("feedback_type")
            .with_message("feedback_type must be bug, feature, improvement or general".into())
    })
}

fn known_priority(value: &str) -> Result<(), ValidationError> {
    FeedbackPriority::from_str(value).map(|_| ()).map_err(|_| {
        ValidationError::new("priority").with_message("priority must be low, medium or high".into())
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponse {
    pub id: String,
    pub feedback_type: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub created_at: String,
}

impl Feedback {
    pub fn to_response(&self) -> FeedbackResponse {
        FeedbackResponse {
            id: self.id.clone(),
            feedback_type: self.feedback_type.to_string(),
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority.to_string(),
            status: self.status.to_string(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
