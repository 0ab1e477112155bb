use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::export::DatabaseStats;
use crate::entities::feedback::FeedbackEntry;
use crate::schemas::v1::feedback::FeedbackResponse;
use crate::schemas::v1::models::BackendStatusResponse;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatabaseStatsResponse {
    pub total_users: i64,
    pub total_sessions: i64,
    pub total_messages: i64,
    pub total_ratings: i64,
    pub recent_sessions_24h: i64,
    pub recent_messages_24h: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemStatusResponse {
    pub timestamp: String,
    pub database: DatabaseStatsResponse,
    pub backend: BackendStatusResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedbackEntryResponse {
    pub username: String,
    #[serde(flatten)]
    pub feedback: FeedbackResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedbackListResponse {
    pub feedback: Vec<FeedbackEntryResponse>,
}

impl DatabaseStats {
    pub fn to_response(&self) -> DatabaseStatsResponse {
        DatabaseStatsResponse {
            total_users: self.total_users,
            total_sessions: self.total_sessions,
            total_messages: self.total_messages,
            total_ratings: self.total_ratings,
            recent_sessions_24h: self.recent_sessions,
            recent_messages_24h: self.recent_messages,
        }
    }
}

impl FeedbackEntry {
    pub fn to_response(&self) -> FeedbackEntryResponse {
        FeedbackEntryResponse {
            username: self.username.clone(),
            feedback: self.feedback.to_response(),
        }
    }
}
