use std::future::Future;

use crate::entities::{SqliteStore, User, parse_timestamp};

pub trait UserStore: Send + Sync + 'static {
    fn create_user(&self, user: User) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn get_user_by_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<User>, sqlx::Error>> + Send;
    fn get_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, sqlx::Error>> + Send;
    /// Replace a user's API token.
    fn set_user_token(
        &self,
        id: &str,
        token: &str,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

type UserRow = (String, String, String, String, bool, String);

fn user_from_row((id, username, email, api_token, is_admin, created_at): UserRow) -> User {
    User {
        id,
        username,
        email,
        api_token,
        is_admin,
        created_at: parse_timestamp(&created_at, "users.created_at"),
    }
}

impl UserStore for SqliteStore {
    async fn create_user(&self, user: User) -> Result<(), sqlx::Error> {
        let created_at = user.created_at.to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, username, email, api_token, is_admin, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.api_token)
        .bind(user.is_admin)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user_by_token(&self, token: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, api_token, is_admin, created_at \
             FROM users WHERE api_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, api_token, is_admin, created_at \
             FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn set_user_token(&self, id: &str, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET api_token = ?1 WHERE id = ?2")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Fresh opaque API token.
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// `true` when `err` is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
