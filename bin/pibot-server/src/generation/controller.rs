//! One message, end to end.
//!
//! Order of work for a `send_message`:
//! 1. Verify the chat session belongs to the sender.
//! 2. Register the generation (rejected while another one is active).
//! 3. Persist the user message.
//! 4. Optionally augment with web search, emitting progress events.
//! 5. Stream the backend response, emitting a chunk per record and checking
//!    the cancel flag before every line.
//! 6. Persist the reply and finish with exactly one terminal event:
//!    `message_complete` or `error`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::backend::{BackendError, GenerateRecord, GenerateRequest, GenerationBackend, LineStream};
use super::events::{ChunkEvent, CompletionEvent, EventSink, GatewayEvent};
use super::metrics::{StreamMetrics, nanos_to_millis};
use super::registry::{ActiveGeneration, GenerationRegistry};
use super::GenerationStore;
use crate::entities::{ChatMessage, ChatSession, MessageRole};
use crate::prompt;
use crate::search::{Augmenter, DEFAULT_MAX_RESULTS, SearchResult, format_results};

/// Appended to the partial reply when a generation is stopped.
pub const STOP_MARKER: &str = "\n\n[Generation stopped by user]";

const STOPPED_MESSAGE: &str = "Generation stopped by user";
const BUSY_MESSAGE: &str = "A response is already being generated. Stop it before sending another message.";
const INVALID_SESSION_MESSAGE: &str = "Invalid session";

const SEARCH_START_PAUSE: Duration = Duration::from_millis(500);
const SOURCE_PAUSE: Duration = Duration::from_millis(300);
const NO_RESULTS_PAUSE: Duration = Duration::from_millis(500);

/// A `send_message` from an authenticated owner.
#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub owner_id: String,
    pub session_id: String,
    pub message: String,
}

/// How the backend stream ended.
enum StreamOutcome {
    Completed(GenerateRecord),
    Cancelled,
    Failed(BackendError),
}

pub struct GenerationController<B, A, S> {
    backend: Arc<B>,
    augmenter: Arc<A>,
    store: Arc<S>,
    registry: Arc<dyn GenerationRegistry>,
    pacing: bool,
}

impl<B, A, S> Clone for GenerationController<B, A, S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            augmenter: Arc::clone(&self.augmenter),
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            pacing: self.pacing,
        }
    }
}

impl<B, A, S> GenerationController<B, A, S>
where
    B: GenerationBackend,
    A: Augmenter,
    S: GenerationStore,
{
    pub fn new(
        backend: Arc<B>,
        augmenter: Arc<A>,
        store: Arc<S>,
        registry: Arc<dyn GenerationRegistry>,
        pacing: bool,
    ) -> Self {
        Self {
            backend,
            augmenter,
            store,
            registry,
            pacing,
        }
    }

    pub async fn handle_message<E>(&self, request: MessageRequest, sink: &E)
    where
        E: EventSink + ?Sized,
    {
        let session = match self
            .store
            .owned_session(&request.session_id, &request.owner_id)
            .await
        {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!(owner_id = %request.owner_id, session_id = %request.session_id, "message for unknown or foreign session");
                sink.emit(GatewayEvent::error(INVALID_SESSION_MESSAGE));
                return;
            }
            Err(e) => {
                error!(error = %e, session_id = %request.session_id, "failed to load chat session");
                sink.emit(GatewayEvent::error("Failed to load the chat session."));
                return;
            }
        };

        let Some(entry) = self.registry.try_start(&request.owner_id, &session.id) else {
            info!(owner_id = %request.owner_id, "generation already active; message rejected");
            sink.emit(GatewayEvent::error(BUSY_MESSAGE));
            return;
        };
        let mut guard = ActiveGeneration::new(Arc::clone(&self.registry), entry);
        info!(
            owner_id = %request.owner_id,
            session_id = %session.id,
            generation_id = %guard.session().id,
            model = %session.model_name,
            "generation started"
        );

        let user_message = ChatMessage::new(&session.id, MessageRole::User, &request.message);
        if let Err(e) = self.store.persist_message(user_message).await {
            error!(error = %e, session_id = %session.id, "failed to persist user message");
            guard.release();
            sink.emit(GatewayEvent::error("Failed to save your message. Please try again."));
            return;
        }

        let search_block = self.augment(&request.message, sink).await;

        let system_prompt = match self.store.system_prompt().await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "failed to read system prompt");
                guard.release();
                sink.emit(GatewayEvent::error("Failed to load the system prompt."));
                return;
            }
        };
        let prompt = prompt::build(&system_prompt, &request.message, search_block.as_deref());

        let started = Instant::now();
        let mut metrics = StreamMetrics::new(started);
        let mut reply = String::new();

        if guard.session().is_cancelled() {
            self.finish_stopped(guard, &session, &reply, &metrics, sink).await;
            return;
        }

        let gen_request = GenerateRequest::streaming(&session.model_name, prompt, session.parameters);
        // A cold model can take a while to answer; a stop must not wait for it.
        let opened = tokio::select! {
            biased;
            _ = guard.session().cancelled() => None,
            opened = self.backend.generate(&gen_request) => Some(opened),
        };
        let lines = match opened {
            Some(Ok(lines)) => lines,
            Some(Err(e)) => {
                self.finish_failed(guard, &session, e, sink);
                return;
            }
            None => {
                self.finish_stopped(guard, &session, &reply, &metrics, sink).await;
                return;
            }
        };

        sink.emit(GatewayEvent::StreamingStart {
            model: session.model_name.clone(),
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            session_id: session.id.clone(),
        });

        match self
            .stream_reply(lines, &guard, &mut reply, &mut metrics, sink)
            .await
        {
            StreamOutcome::Completed(last) => {
                self.finish_completed(guard, &session, &reply, &metrics, last, sink)
                    .await
            }
            StreamOutcome::Cancelled => {
                self.finish_stopped(guard, &session, &reply, &metrics, sink)
                    .await
            }
            StreamOutcome::Failed(e) => self.finish_failed(guard, &session, e, sink),
        }
    }

    /// Run the search step when the message calls for it. Returns the
    /// formatted block for the prompt, or `None` to use the plain template.
    async fn augment<E>(&self, message: &str, sink: &E) -> Option<String>
    where
        E: EventSink + ?Sized,
    {
        if !self.augmenter.should_augment(message) {
            return None;
        }

        sink.emit(GatewayEvent::WebSearchStart {
            message: "Initiating web search for current information...".to_owned(),
        });
        self.pause(SEARCH_START_PAUSE).await;
        sink.emit(GatewayEvent::WebSearchProgress {
            message: "Connecting to search engine...".to_owned(),
        });

        match self.augmenter.search(message, DEFAULT_MAX_RESULTS).await {
            Some(results) => {
                self.report_sources(&results, sink).await;
                sink.emit(GatewayEvent::WebSearchComplete {
                    message: format!(
                        "Successfully gathered information from {} sources. Analyzing and generating response...",
                        results.len()
                    ),
                    results_count: results.len(),
                });
                Some(format_results(&results))
            }
            None => {
                sink.emit(GatewayEvent::WebSearchProgress {
                    message: "No current web results found for this query.".to_owned(),
                });
                self.pause(NO_RESULTS_PAUSE).await;
                sink.emit(GatewayEvent::WebSearchComplete {
                    message: "Web search completed. Using available knowledge to answer your question..."
                        .to_owned(),
                    results_count: 0,
                });
                None
            }
        }
    }

    async fn report_sources<E>(&self, results: &[SearchResult], sink: &E)
    where
        E: EventSink + ?Sized,
    {
        let total = results.len();
        sink.emit(GatewayEvent::WebSearchProgress {
            message: format!("Found {total} relevant sources. Extracting content..."),
        });
        for (i, result) in results.iter().enumerate() {
            let title: String = result.title.chars().take(40).collect();
            sink.emit(GatewayEvent::WebSearchProgress {
                message: format!("Processing source {}/{total}: {title}...", i + 1),
            });
            self.pause(SOURCE_PAUSE).await;
        }
    }

    async fn pause(&self, duration: Duration) {
        if self.pacing {
            tokio::time::sleep(duration).await;
        }
    }

    async fn stream_reply<E>(
        &self,
        mut lines: LineStream,
        guard: &ActiveGeneration,
        reply: &mut String,
        metrics: &mut StreamMetrics,
        sink: &E,
    ) -> StreamOutcome
    where
        E: EventSink + ?Sized,
    {
        let generation = guard.session();
        loop {
            let next = tokio::select! {
                biased;
                _ = generation.cancelled() => return StreamOutcome::Cancelled,
                line = lines.next() => line,
            };
            if generation.is_cancelled() {
                return StreamOutcome::Cancelled;
            }

            let raw = match next {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => return StreamOutcome::Failed(e),
                None => return StreamOutcome::Failed(BackendError::Incomplete),
            };
            let record: GenerateRecord = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    debug!(error = %e, line = %raw, "skipping malformed backend line");
                    continue;
                }
            };
            if let Some(message) = record.error {
                return StreamOutcome::Failed(BackendError::Generation(message));
            }

            if let Some(chunk) = record.response.as_deref().filter(|c| !c.is_empty()) {
                reply.push_str(chunk);
                let stats = metrics.record(chunk, Instant::now());
                if let Some(ttft) = stats.time_to_first_token {
                    sink.emit(GatewayEvent::FirstToken {
                        time_to_first_token: ttft,
                    });
                }
                sink.emit(GatewayEvent::MessageChunk(ChunkEvent {
                    chunk: chunk.to_owned(),
                    token_count: stats.token_count,
                    tokens_per_second: Some(stats.tokens_per_second),
                    elapsed_time: Some(stats.elapsed),
                    chunk_size: Some(chunk.chars().count()),
                    words_in_chunk: Some(chunk.split_whitespace().count()),
                    stopped: false,
                }));
            }

            if record.done {
                return StreamOutcome::Completed(record);
            }
        }
    }

    async fn finish_completed<E>(
        &self,
        mut guard: ActiveGeneration,
        session: &ChatSession,
        reply: &str,
        metrics: &StreamMetrics,
        last: GenerateRecord,
        sink: &E,
    ) where
        E: EventSink + ?Sized,
    {
        let message = ChatMessage::new(&session.id, MessageRole::Assistant, reply);
        if let Err(e) = self.store.persist_message(message).await {
            error!(error = %e, session_id = %session.id, "failed to persist assistant reply");
            guard.release();
            sink.emit(GatewayEvent::error("Failed to save the response."));
            return;
        }
        guard.release();

        let now = Instant::now();
        let completion = CompletionEvent {
            model: session.model_name.clone(),
            total_tokens: metrics.token_count(),
            total_time: metrics.total_time(now),
            tokens_per_second: metrics.average_rate(now),
            time_to_first_token: metrics.time_to_first_token(),
            ollama_eval_count: last.eval_count,
            ollama_eval_duration_ms: last.eval_duration.map(nanos_to_millis),
            ollama_prompt_eval_count: last.prompt_eval_count,
            ollama_prompt_eval_duration_ms: last.prompt_eval_duration.map(nanos_to_millis),
            ..Default::default()
        };
        info!(
            session_id = %session.id,
            total_tokens = completion.total_tokens,
            total_time = completion.total_time,
            tokens_per_second = completion.tokens_per_second,
            "generation completed"
        );
        sink.emit(GatewayEvent::MessageComplete(completion));
    }

    async fn finish_stopped<E>(
        &self,
        mut guard: ActiveGeneration,
        session: &ChatSession,
        reply: &str,
        metrics: &StreamMetrics,
        sink: &E,
    ) where
        E: EventSink + ?Sized,
    {
        if !reply.trim().is_empty() {
            let content = format!("{reply}{STOP_MARKER}");
            let message = ChatMessage::new(&session.id, MessageRole::Assistant, content);
            if let Err(e) = self.store.persist_message(message).await {
                error!(error = %e, session_id = %session.id, "failed to persist partial reply");
            }
            sink.emit(GatewayEvent::MessageChunk(ChunkEvent {
                chunk: STOP_MARKER.to_owned(),
                token_count: metrics.token_count(),
                stopped: true,
                ..Default::default()
            }));
        }
        guard.release();
        info!(session_id = %session.id, partial_tokens = metrics.token_count(), "generation stopped by user");

        sink.emit(GatewayEvent::GenerationStopped {
            session_id: session.id.clone(),
            message: STOPPED_MESSAGE.to_owned(),
        });
        let now = Instant::now();
        sink.emit(GatewayEvent::MessageComplete(CompletionEvent {
            model: session.model_name.clone(),
            total_tokens: metrics.token_count(),
            total_time: metrics.total_time(now),
            tokens_per_second: metrics.average_rate(now),
            time_to_first_token: metrics.time_to_first_token(),
            message: Some(STOPPED_MESSAGE.to_owned()),
            stopped: true,
            ..Default::default()
        }));
    }

    fn finish_failed<E>(&self, mut guard: ActiveGeneration, session: &ChatSession, err: BackendError, sink: &E)
    where
        E: EventSink + ?Sized,
    {
        guard.release();
        warn!(error = %err, session_id = %session.id, model = %session.model_name, "generation failed");
        sink.emit(GatewayEvent::error(err.user_message(&session.model_name)));
    }
}
