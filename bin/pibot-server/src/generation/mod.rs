//! Streaming generation: one user message in, a sequence of
//! [`GatewayEvent`]s out.

pub mod backend;
pub mod controller;
pub mod download;
pub mod events;
pub mod metrics;
pub mod registry;

pub use backend::{GenerationBackend, OllamaBackend};
pub use controller::{GenerationController, MessageRequest};
pub use events::{ClientCommand, EventSink, GatewayEvent};
pub use registry::{GenerationRegistry, InMemoryGenerationRegistry};

use std::future::Future;

use crate::entities::config::{DEFAULT_SYSTEM_PROMPT, SYSTEM_PROMPT_KEY};
use crate::entities::{ChatMessage, ChatSession, ChatStore, ConfigStore, SessionStore, SqliteStore};

/// The persistence a generation run needs.
pub trait GenerationStore: Send + Sync + 'static {
    fn owned_session(
        &self,
        session_id: &str,
        owner_id: &str,
    ) -> impl Future<Output = Result<Option<ChatSession>, sqlx::Error>> + Send;

    fn persist_message(&self, message: ChatMessage) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn system_prompt(&self) -> impl Future<Output = Result<String, sqlx::Error>> + Send;
}

impl GenerationStore for SqliteStore {
    async fn owned_session(&self, session_id: &str, owner_id: &str) -> Result<Option<ChatSession>, sqlx::Error> {
        self.get_owned_session(session_id, owner_id).await
    }

    async fn persist_message(&self, message: ChatMessage) -> Result<(), sqlx::Error> {
        self.append_message(message).await
    }

    async fn system_prompt(&self) -> Result<String, sqlx::Error> {
        Ok(self
            .get_config_value(SYSTEM_PROMPT_KEY)
            .await?
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::seeded_store;

    #[tokio::test]
    async fn system_prompt_falls_back_to_built_in_text() {
        let (store, _) = seeded_store().await;
        assert_eq!(store.system_prompt().await.unwrap(), DEFAULT_SYSTEM_PROMPT);

        store.set_config_value(SYSTEM_PROMPT_KEY, "Be terse.").await.unwrap();
        assert_eq!(store.system_prompt().await.unwrap(), "Be terse.");
    }

    #[tokio::test]
    async fn owned_session_checks_the_owner() {
        let (store, session) = seeded_store().await;
        assert!(store.owned_session(&session.id, "u1").await.unwrap().is_some());
        assert!(store.owned_session(&session.id, "u2").await.unwrap().is_none());
    }
}
