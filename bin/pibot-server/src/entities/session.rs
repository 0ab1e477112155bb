use std::future::Future;

use crate::entities::{ChatSession, SessionParameters, SqliteStore, parse_timestamp};

pub trait SessionStore: Send + Sync + 'static {
    fn create_session(
        &self,
        session: ChatSession,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    /// Fetch a session only if it belongs to `user_id`.
    fn get_owned_session(
        &self,
        id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<ChatSession>, sqlx::Error>> + Send;
    fn list_sessions_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ChatSession>, sqlx::Error>> + Send;
    /// Store already-clamped parameters.
    fn update_session_parameters(
        &self,
        id: &str,
        parameters: SessionParameters,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    /// Delete a session together with its messages and ratings.
    fn delete_session(&self, id: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

type SessionRow = (
    String,
    String,
    String,
    String,
    f64,
    i64,
    f64,
    i64,
    f64,
    String,
    String,
);

const SESSION_COLUMNS: &str = "id, user_id, model_name, title, temperature, max_tokens, top_p, \
                               top_k, repeat_penalty, created_at, updated_at";

fn session_from_row(row: SessionRow) -> ChatSession {
    let (
        id,
        user_id,
        model_name,
        title,
        temperature,
        max_tokens,
        top_p,
        top_k,
        repeat_penalty,
        created_at,
        updated_at,
    ) = row;
    ChatSession {
        id,
        user_id,
        model_name,
        title,
        parameters: SessionParameters {
            temperature,
            max_tokens,
            top_p,
            top_k,
            repeat_penalty,
        },
        created_at: parse_timestamp(&created_at, "chat_sessions.created_at"),
        updated_at: parse_timestamp(&updated_at, "chat_sessions.updated_at"),
    }
}

impl SessionStore for SqliteStore {
    async fn create_session(&self, session: ChatSession) -> Result<(), sqlx::Error> {
        let created_at = session.created_at.to_rfc3339();
        let updated_at = session.updated_at.to_rfc3339();
        let p = session.parameters;
        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, model_name, title, temperature, max_tokens, \
             top_p, top_k, repeat_penalty, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.model_name)
        .bind(&session.title)
        .bind(p.temperature)
        .bind(p.max_tokens)
        .bind(p.top_p)
        .bind(p.top_k)
        .bind(p.repeat_penalty)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_owned_session(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?1 AND user_id = ?2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(session_from_row))
    }

    async fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<ChatSession>, sqlx::Error> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE user_id = ?1 \
             ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(session_from_row).collect())
    }

    async fn update_session_parameters(
        &self,
        id: &str,
        parameters: SessionParameters,
    ) -> Result<(), sqlx::Error> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE chat_sessions SET temperature = ?1, max_tokens = ?2, top_p = ?3, top_k = ?4, \
             repeat_penalty = ?5, updated_at = ?6 WHERE id = ?7",
        )
        .bind(parameters.temperature)
        .bind(parameters.max_tokens)
        .bind(parameters.top_p)
        .bind(parameters.top_k)
        .bind(parameters.repeat_penalty)
        .bind(&updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chat_messages WHERE session_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM model_ratings WHERE session_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chat_sessions WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
