use chrono::{DateTime, Utc};

/// A row in the `users` table.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Bearer token presented on REST calls and the WebSocket handshake.
    pub api_token: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}
