//! First-start seeding: the system prompt and the administrator account.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::config::{DEFAULT_SYSTEM_PROMPT, SYSTEM_PROMPT_KEY};
use crate::entities::user::generate_token;
use crate::entities::{ConfigStore, User, UserStore};

/// Seed the system prompt when none is stored and make sure the configured
/// administrator exists. A configured admin token always wins over the stored
/// one; without one a token is generated on first start and logged once.
pub async fn run<S>(store: &S, config: &Config) -> Result<(), sqlx::Error>
where
    S: ConfigStore + UserStore,
{
    if store.get_config_value(SYSTEM_PROMPT_KEY).await?.is_none() {
        store
            .set_config_value(SYSTEM_PROMPT_KEY, DEFAULT_SYSTEM_PROMPT)
            .await?;
        info!("seeded default system prompt");
    }

    match store.get_user_by_username(&config.admin_username).await? {
        Some(admin) => {
            if let Some(token) = config.admin_token.as_deref() {
                if token != admin.api_token {
                    store.set_user_token(&admin.id, token).await?;
                    info!(username = %admin.username, "administrator token updated from configuration");
                }
            }
        }
        None => {
            let (api_token, generated) = match &config.admin_token {
                Some(token) => (token.clone(), false),
                None => (generate_token(), true),
            };
            let admin = User {
                id: Uuid::new_v4().to_string(),
                username: config.admin_username.clone(),
                email: format!("{}@localhost", config.admin_username),
                api_token,
                is_admin: true,
                created_at: Utc::now(),
            };
            store.create_user(admin.clone()).await?;
            if generated {
                warn!(
                    username = %admin.username,
                    api_token = %admin.api_token,
                    "created administrator with a generated token; set PIBOT_ADMIN_TOKEN to pin it"
                );
            } else {
                info!(username = %admin.username, "created administrator");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::SqliteStore;

    fn config(token: Option<&str>) -> Config {
        let mut config = Config::from_env();
        config.admin_username = "admin".into();
        config.admin_token = token.map(str::to_owned);
        config
    }

    #[tokio::test]
    async fn first_start_seeds_prompt_and_admin() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        run(&store, &config(Some("tok-admin"))).await.unwrap();

        assert_eq!(
            store.get_config_value(SYSTEM_PROMPT_KEY).await.unwrap().as_deref(),
            Some(DEFAULT_SYSTEM_PROMPT)
        );
        let admin = store.get_user_by_token("tok-admin").await.unwrap().unwrap();
        assert!(admin.is_admin);
    }

    #[tokio::test]
    async fn rerun_keeps_prompt_and_rotates_token() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        run(&store, &config(Some("first"))).await.unwrap();
        store.set_config_value(SYSTEM_PROMPT_KEY, "custom").await.unwrap();

        run(&store, &config(Some("second"))).await.unwrap();
        assert_eq!(
            store.get_config_value(SYSTEM_PROMPT_KEY).await.unwrap().as_deref(),
            Some("custom")
        );
        assert!(store.get_user_by_token("first").await.unwrap().is_none());
        assert!(store.get_user_by_token("second").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_token_is_generated_once() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        run(&store, &config(None)).await.unwrap();
        let first = store.get_user_by_username("admin").await.unwrap().unwrap();

        run(&store, &config(None)).await.unwrap();
        let second = store.get_user_by_username("admin").await.unwrap().unwrap();
        assert_eq!(first.api_token, second.api_token);
    }
}
