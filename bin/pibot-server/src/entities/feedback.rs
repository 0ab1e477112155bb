use std::future::Future;
use std::str::FromStr;

use crate::entities::{
    Feedback, FeedbackPriority, FeedbackStatus, FeedbackType, SqliteStore, parse_timestamp,
};

/// Feedback joined with the submitting user's name, for the admin listing.
#[derive(Debug, Clone)]
pub struct FeedbackEntry {
    pub feedback: Feedback,
    pub username: String,
}

pub trait FeedbackStore: Send + Sync + 'static {
    fn create_feedback(
        &self,
        feedback: Feedback,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    /// Newest first.
    fn recent_feedback(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<FeedbackEntry>, sqlx::Error>> + Send;
}

type FeedbackRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
);

impl FeedbackStore for SqliteStore {
    async fn create_feedback(&self, feedback: Feedback) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_feedback \
             (id, user_id, feedback_type, title, description, priority, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&feedback.id)
        .bind(&feedback.user_id)
        .bind(feedback.feedback_type.as_ref())
        .bind(&feedback.title)
        .bind(&feedback.description)
        .bind(feedback.priority.as_ref())
        .bind(feedback.status.as_ref())
        .bind(feedback.created_at.to_rfc3339())
        .bind(feedback.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_feedback(&self, limit: i64) -> Result<Vec<FeedbackEntry>, sqlx::Error> {
        let rows: Vec<FeedbackRow> = sqlx::query_as(
            "SELECT f.id, f.user_id, u.username, f.feedback_type, f.title, f.description, \
               f.priority, f.status, f.created_at, f.updated_at \
             FROM user_feedback f JOIN users u ON u.id = f.user_id \
             ORDER BY f.created_at DESC, f.rowid DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, user_id, username, kind, title, description, priority, status, created, updated)| {
                    FeedbackEntry {
                        feedback: Feedback {
                            feedback_type: FeedbackType::from_str(&kind).unwrap_or_else(|_| {
                                tracing::warn!(raw = %kind, feedback_id = %id, "unknown feedback type");
                                FeedbackType::General
                            }),
                            priority: FeedbackPriority::from_str(&priority).unwrap_or_default(),
                            status: FeedbackStatus::from_str(&status).unwrap_or_default(),
                            created_at: parse_timestamp(&created, "user_feedback.created_at"),
                            updated_at: parse_timestamp(&updated, "user_feedback.updated_at"),
                            id,
                            user_id,
                            title,
                            description,
                        },
                        username,
                    }
                },
            )
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::seeded_store;

    #[tokio::test]
    async fn recent_feedback_is_newest_first_and_limited() {
        let (store, _) = seeded_store().await;
        for title in ["first report", "second report", "third report"] {
            store
                .create_feedback(Feedback::new(
                    "u1",
                    FeedbackType::Bug,
                    FeedbackPriority::High,
                    title,
                    "the reply stopped halfway through",
                ))
                .await
                .unwrap();
        }

        let recent = store.recent_feedback(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].feedback.title, "third report");
        assert_eq!(recent[0].username, "alice");
        assert_eq!(recent[0].feedback.status, FeedbackStatus::Open);
        assert_eq!(recent[1].feedback.priority, FeedbackPriority::High);
    }

    #[tokio::test]
    async fn feedback_requires_a_known_user() {
        let (store, _) = seeded_store().await;
        let orphan = Feedback::new(
            "nobody",
            FeedbackType::General,
            FeedbackPriority::Low,
            "hello there",
            "feedback without an account",
        );
        assert!(store.create_feedback(orphan).await.is_err());
    }
}
