use std::future::Future;

use crate::entities::{ModelRating, SqliteStore};

pub trait RatingStore: Send + Sync + 'static {
    /// Insert a rating, or overwrite the score of the existing rating for the
    /// same (session, user) pair.
    fn upsert_rating(
        &self,
        rating: ModelRating,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

impl RatingStore for SqliteStore {
    async fn upsert_rating(&self, rating: ModelRating) -> Result<(), sqlx::Error> {
        let created_at = rating.created_at.to_rfc3339();
        sqlx::query(
            "INSERT INTO model_ratings (id, session_id, user_id, model_name, rating, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(session_id, user_id) DO UPDATE SET rating = ?5",
        )
        .bind(&rating.id)
        .bind(&rating.session_id)
        .bind(&rating.user_id)
        .bind(&rating.model_name)
        .bind(rating.rating)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
