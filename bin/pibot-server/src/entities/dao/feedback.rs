use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackType {
    Bug,
    Feature,
    Improvement,
    General,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Triage state; new feedback is always `open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

/// A row in the `user_feedback` table.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub id: String,
    pub user_id: String,
    pub feedback_type: FeedbackType,
    pub title: String,
    pub description: String,
    pub priority: FeedbackPriority,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feedback {
    /// New `open` feedback from `user_id`, stamped with a fresh id.
    pub fn new(
        user_id: impl Into<String>,
        feedback_type: FeedbackType,
        priority: FeedbackPriority,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            feedback_type,
            title: title.into(),
            description: description.into(),
            priority,
            status: FeedbackStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }
}
