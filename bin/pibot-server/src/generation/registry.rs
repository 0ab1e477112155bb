//! Active-generation registry.
//!
//! At most one generation is tracked per owner. The cancel flag lives on the
//! [`GenerationSession`] itself, so a stop request only ever touches the
//! generation that was active when it arrived; a newer generation for the same
//! owner gets a fresh flag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

/// State for one in-flight generation.
#[derive(Debug)]
pub struct GenerationSession {
    pub id: Uuid,
    pub owner_id: String,
    pub chat_session_id: String,
    pub started_at: DateTime<Utc>,
    cancelled: AtomicBool,
    notify: Notify,
}

impl GenerationSession {
    fn new(owner_id: &str, chat_session_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_owned(),
            chat_session_id: chat_session_id.to_owned(),
            started_at: Utc::now(),
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not lost.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

pub trait GenerationRegistry: Send + Sync + 'static {
    /// Register a new generation for `owner_id`, replacing any existing entry.
    fn start(&self, owner_id: &str, chat_session_id: &str) -> Arc<GenerationSession>;

    /// Register a new generation unless one is already active for `owner_id`.
    fn try_start(&self, owner_id: &str, chat_session_id: &str) -> Option<Arc<GenerationSession>>;

    /// Set the cancel flag of the active generation. Returns `false` when
    /// nothing is active for `owner_id`.
    fn mark_cancelled(&self, owner_id: &str) -> bool;

    fn is_cancelled(&self, owner_id: &str) -> bool;

    fn is_active(&self, owner_id: &str) -> bool;

    /// Remove whatever is registered for `owner_id`. Idempotent.
    fn clear(&self, owner_id: &str);

    /// Remove the entry only if it is still `session`.
    fn release(&self, session: &GenerationSession);
}

#[derive(Debug, Default)]
pub struct InMemoryGenerationRegistry {
    sessions: Mutex<HashMap<String, Arc<GenerationSession>>>,
}

impl InMemoryGenerationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<GenerationSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GenerationRegistry for InMemoryGenerationRegistry {
    fn start(&self, owner_id: &str, chat_session_id: &str) -> Arc<GenerationSession> {
        let session = Arc::new(GenerationSession::new(owner_id, chat_session_id));
        self.sessions().insert(owner_id.to_owned(), Arc::clone(&session));
        session
    }

    fn try_start(&self, owner_id: &str, chat_session_id: &str) -> Option<Arc<GenerationSession>> {
        let mut sessions = self.sessions();
        if sessions.contains_key(owner_id) {
            return None;
        }
        let session = Arc::new(GenerationSession::new(owner_id, chat_session_id));
        sessions.insert(owner_id.to_owned(), Arc::clone(&session));
        Some(session)
    }

    fn mark_cancelled(&self, owner_id: &str) -> bool {
        match self.sessions().get(owner_id) {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }

    fn is_cancelled(&self, owner_id: &str) -> bool {
        self.sessions()
            .get(owner_id)
            .is_some_and(|session| session.is_cancelled())
    }

    fn is_active(&self, owner_id: &str) -> bool {
        self.sessions().contains_key(owner_id)
    }

    fn clear(&self, owner_id: &str) {
        self.sessions().remove(owner_id);
    }

    fn release(&self, session: &GenerationSession) {
        let mut sessions = self.sessions();
        if sessions
            .get(&session.owner_id)
            .is_some_and(|active| active.id == session.id)
        {
            sessions.remove(&session.owner_id);
        }
    }
}

/// Registry entry held for the lifetime of one generation run. Dropping it
/// releases the entry, so every exit path leaves the registry clean.
pub struct ActiveGeneration {
    registry: Arc<dyn GenerationRegistry>,
    session: Arc<GenerationSession>,
    released: bool,
}

impl ActiveGeneration {
    pub fn new(registry: Arc<dyn GenerationRegistry>, session: Arc<GenerationSession>) -> Self {
        Self {
            registry,
            session,
            released: false,
        }
    }

    pub fn session(&self) -> &GenerationSession {
        &self.session
    }

    pub fn release(&mut self) {
        if !self.released {
            self.registry.release(&self.session);
            self.released = true;
        }
    }
}

impl Drop for ActiveGeneration {
    fn drop(&mut self) {
        self.release();
    }
}
