use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::export::{MessageExport, SessionExport, UserStats};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionExportResponse {
    pub session_id: String,
    pub username: String,
    pub model: String,
    pub title: String,
    pub created_at: String,
    pub messages: Vec<MessageExportResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageExportResponse {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserStatsResponse {
    pub username: String,
    pub email: String,
    pub created_at: String,
    pub total_sessions: i64,
    pub total_messages: i64,
    pub ratings_given: i64,
    pub avg_rating_given: f64,
}

impl SessionExport {
    pub fn to_response(&self) -> SessionExportResponse {
        SessionExportResponse {
            session_id: self.id.clone(),
            username: self.username.clone(),
            model: self.model_name.clone(),
            title: self.title.clone(),
            created_at: self.created_at.to_rfc3339(),
            messages: self.messages.iter().map(MessageExport::to_response).collect(),
        }
    }
}

impl MessageExport {
    pub fn to_response(&self) -> MessageExportResponse {
        MessageExportResponse {
            role: self.role.clone(),
            content: self.content.clone(),
            timestamp: self.created_at.to_rfc3339(),
        }
    }
}

impl UserStats {
    pub fn to_response(&self) -> UserStatsResponse {
        UserStatsResponse {
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at.to_rfc3339(),
            total_sessions: self.total_sessions,
            total_messages: self.total_messages,
            ratings_given: self.ratings_given,
            avg_rating_given: (self.avg_rating_given * 100.0).round() / 100.0,
        }
    }
}
