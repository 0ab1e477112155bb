use std::future::Future;

use crate::entities::{SessionParameters, SqliteStore};

pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";
pub const DEFAULT_MODEL_KEY: &str = "default_model";
pub const DEFAULT_TEMPERATURE_KEY: &str = "default_temperature";
pub const DEFAULT_MAX_TOKENS_KEY: &str = "default_max_tokens";
pub const DEFAULT_TOP_P_KEY: &str = "default_top_p";
pub const DEFAULT_TOP_K_KEY: &str = "default_top_k";
pub const DEFAULT_REPEAT_PENALTY_KEY: &str = "default_repeat_penalty";

/// Seeded on first start when no system prompt is stored.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant running on a Raspberry Pi. \
                                         Be concise and helpful in your responses.";

pub trait ConfigStore: Send + Sync + 'static {
    fn get_config_value(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;
    fn set_config_value(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn list_config_values(
        &self,
    ) -> impl Future<Output = Result<Vec<(String, String)>, sqlx::Error>> + Send;
}

impl ConfigStore for SqliteStore {
    async fn get_config_value(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM config_store WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn set_config_value(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO config_store (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
        )
        .bind(key)
        .bind(value)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_config_values(&self) -> Result<Vec<(String, String)>, sqlx::Error> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM config_store ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

/// Admin-configured defaults for new sessions, falling back to the built-in
/// defaults for missing or unparsable entries.
pub async fn default_parameters<S: ConfigStore>(store: &S) -> Result<SessionParameters, sqlx::Error> {
    let builtin = SessionParameters::default();
    Ok(SessionParameters {
        temperature: parsed_or(store, DEFAULT_TEMPERATURE_KEY, builtin.temperature).await?,
        max_tokens: parsed_or(store, DEFAULT_MAX_TOKENS_KEY, builtin.max_tokens).await?,
        top_p: parsed_or(store, DEFAULT_TOP_P_KEY, builtin.top_p).await?,
        top_k: parsed_or(store, DEFAULT_TOP_K_KEY, builtin.top_k).await?,
        repeat_penalty: parsed_or(store, DEFAULT_REPEAT_PENALTY_KEY, builtin.repeat_penalty)
            .await?,
    }
    .clamped())
}

async fn parsed_or<S, T>(store: &S, key: &str, fallback: T) -> Result<T, sqlx::Error>
where
    S: ConfigStore,
    T: std::str::FromStr,
{
    Ok(store
        .get_config_value(key)
        .await?
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(fallback))
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        store.set_config_value(SYSTEM_PROMPT_KEY, "one").await.unwrap();
        store.set_config_value(SYSTEM_PROMPT_KEY, "two").await.unwrap();
        assert_eq!(
            store.get_config_value(SYSTEM_PROMPT_KEY).await.unwrap().as_deref(),
            Some("two")
        );
        assert_eq!(store.list_config_values().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn default_parameters_merge_and_clamp_admin_values() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        store.set_config_value(DEFAULT_TEMPERATURE_KEY, "9.5").await.unwrap();
        store.set_config_value(DEFAULT_TOP_K_KEY, "not a number").await.unwrap();

        let params = default_parameters(&store).await.unwrap();
        assert_eq!(params.temperature, 2.0);
        assert_eq!(params.top_k, SessionParameters::default().top_k);
        assert_eq!(params.max_tokens, SessionParameters::default().max_tokens);
    }
}
