use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::entities::{SqliteStore, parse_timestamp};

/// One session with its full transcript, as exported for administrators.
#[derive(Debug, Clone)]
pub struct SessionExport {
    pub id: String,
    pub username: String,
    pub model_name: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<MessageExport>,
}

#[derive(Debug, Clone)]
pub struct MessageExport {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user activity counters.
#[derive(Debug, Clone)]
pub struct UserStats {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub total_sessions: i64,
    pub total_messages: i64,
    pub ratings_given: i64,
    /// `0.0` when the user never rated anything.
    pub avg_rating_given: f64,
}

/// Whole-database counters for the admin status page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub total_users: i64,
    pub total_sessions: i64,
    pub total_messages: i64,
    pub total_ratings: i64,
    pub recent_sessions: i64,
    pub recent_messages: i64,
}

pub trait ExportStore: Send + Sync + 'static {
    fn export_chat_data(
        &self,
    ) -> impl Future<Output = Result<Vec<SessionExport>, sqlx::Error>> + Send;
    fn user_stats(&self) -> impl Future<Output = Result<Vec<UserStats>, sqlx::Error>> + Send;
    /// Row counts; `recent_*` count rows created at or after `since`.
    fn database_stats(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<DatabaseStats, sqlx::Error>> + Send;
}

impl ExportStore for SqliteStore {
    async fn export_chat_data(&self) -> Result<Vec<SessionExport>, sqlx::Error> {
        let sessions: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT s.id, u.username, s.model_name, s.title, s.created_at \
             FROM chat_sessions s JOIN users u ON u.id = s.user_id \
             ORDER BY s.created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let messages: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT session_id, role, content, created_at FROM chat_messages \
             ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_session: HashMap<String, Vec<MessageExport>> = HashMap::new();
        for (session_id, role, content, created_at) in messages {
            by_session.entry(session_id).or_default().push(MessageExport {
                role,
                content,
                created_at: parse_timestamp(&created_at, "chat_messages.created_at"),
            });
        }

        Ok(sessions
            .into_iter()
            .map(|(id, username, model_name, title, created_at)| SessionExport {
                messages: by_session.remove(&id).unwrap_or_default(),
                created_at: parse_timestamp(&created_at, "chat_sessions.created_at"),
                id,
                username,
                model_name,
                title,
            })
            .collect())
    }

    async fn user_stats(&self) -> Result<Vec<UserStats>, sqlx::Error> {
        let rows: Vec<(String, String, String, i64, i64, i64, Option<f64>)> = sqlx::query_as(
            "SELECT u.username, u.email, u.created_at, \
               (SELECT COUNT(*) FROM chat_sessions s WHERE s.user_id = u.id), \
               (SELECT COUNT(*) FROM chat_messages m JOIN chat_sessions s ON s.id = m.session_id \
                  WHERE s.user_id = u.id), \
               (SELECT COUNT(*) FROM model_ratings r WHERE r.user_id = u.id), \
               (SELECT AVG(r.rating) FROM model_ratings r WHERE r.user_id = u.id) \
             FROM users u ORDER BY u.username",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(username, email, created_at, total_sessions, total_messages, ratings_given, avg)| {
                    UserStats {
                        username,
                        email,
                        created_at: parse_timestamp(&created_at, "users.created_at"),
                        total_sessions,
                        total_messages,
                        ratings_given,
                        avg_rating_given: avg.unwrap_or(0.0),
                    }
                },
            )
            .collect())
    }

    async fn database_stats(&self, since: DateTime<Utc>) -> Result<DatabaseStats, sqlx::Error> {
        let since = since.to_rfc3339();
        let counts: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM users), \
               (SELECT COUNT(*) FROM chat_sessions), \
               (SELECT COUNT(*) FROM chat_messages), \
               (SELECT COUNT(*) FROM model_ratings), \
               (SELECT COUNT(*) FROM chat_sessions WHERE created_at >= ?1), \
               (SELECT COUNT(*) FROM chat_messages WHERE created_at >= ?1)",
        )
        .bind(&since)
        .fetch_one(&self.pool)
        .await?;

        Ok(DatabaseStats {
            total_users: counts.0,
            total_sessions: counts.1,
            total_messages: counts.2,
            total_ratings: counts.3,
            recent_sessions: counts.4,
            recent_messages: counts.5,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ChatMessage, ChatStore, MessageRole};
    use crate::test_support::seeded_store;

    #[tokio::test]
    async fn export_groups_messages_under_their_session() {
        let (store, session) = seeded_store().await;
        store
            .append_message(ChatMessage::new(&session.id, MessageRole::User, "q"))
            .await
            .unwrap();
        store
            .append_message(ChatMessage::new(&session.id, MessageRole::Assistant, "a"))
            .await
            .unwrap();

        let export = store.export_chat_data().await.unwrap();
        assert_eq!(export.len(), 1);
        assert_eq!(export[0].username, "alice");
        assert_eq!(export[0].messages.len(), 2);
        assert_eq!(export[0].messages[0].role, "user");

        let stats = store.user_stats().await.unwrap();
        assert_eq!(stats[0].total_sessions, 1);
        assert_eq!(stats[0].total_messages, 2);
        assert_eq!(stats[0].avg_rating_given, 0.0);
    }

    #[tokio::test]
    async fn database_stats_split_recent_activity() {
        let (store, session) = seeded_store().await;
        let mut old = ChatMessage::new(&session.id, MessageRole::User, "old question");
        old.created_at = Utc::now() - chrono::Duration::days(3);
        store.append_message(old).await.unwrap();
        store
            .append_message(ChatMessage::new(&session.id, MessageRole::User, "new question"))
            .await
            .unwrap();

        let stats = store
            .database_stats(Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(
            stats,
            DatabaseStats {
                total_users: 1,
                total_sessions: 1,
                total_messages: 2,
                total_ratings: 0,
                recent_sessions: 1,
                recent_messages: 1,
            }
        );
    }
}
