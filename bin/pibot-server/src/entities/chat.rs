use std::future::Future;
use std::str::FromStr;

use crate::entities::{ChatMessage, MessageRole, SqliteStore, parse_timestamp};

pub trait ChatStore: Send + Sync + 'static {
    fn append_message(&self, msg: ChatMessage)
    -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn list_messages(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, sqlx::Error>> + Send;
}

impl ChatStore for SqliteStore {
    async fn append_message(&self, msg: ChatMessage) -> Result<(), sqlx::Error> {
        let created_at = msg.created_at.to_rfc3339();
        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&msg.id)
        .bind(&msg.session_id)
        .bind(msg.role.as_ref())
        .bind(&msg.content)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, session_id, role, content, created_at \
             FROM chat_messages WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, session_id, role, content, created_at)| ChatMessage {
                role: MessageRole::from_str(&role).unwrap_or_else(|_| {
                    tracing::warn!(raw = %role, message_id = %id, "unknown message role; treating as assistant");
                    MessageRole::Assistant
                }),
                created_at: parse_timestamp(&created_at, "chat_messages.created_at"),
                id,
                session_id,
                content,
            })
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::seeded_store;

    #[tokio::test]
    async fn messages_come_back_in_insertion_order() {
        let (store, session) = seeded_store().await;
        store
            .append_message(ChatMessage::new(&session.id, MessageRole::User, "hi"))
            .await
            .unwrap();
        store
            .append_message(ChatMessage::new(&session.id, MessageRole::Assistant, "hello"))
            .await
            .unwrap();

        let messages = store.list_messages(&session.id).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["hi", "hello"]);
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }
}
