use chrono::{DateTime, Utc};

/// A row in the `model_ratings` table; at most one per (session, user).
#[derive(Debug, Clone)]
pub struct ModelRating {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub model_name: String,
    /// 1 to 5.
    pub rating: i64,
    pub created_at: DateTime<Utc>,
}
