//! Ollama-compatible generation backend.
//!
//! `POST {base}/api/generate` with `stream: true` answers with one JSON record
//! per line. [`OllamaBackend::generate`] hands those lines back as a stream;
//! interpreting them is the controller's job.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::entities::SessionParameters;

/// Catalogue served when the backend cannot list its installed models.
pub const FALLBACK_MODELS: &[&str] = &[
    "tinyllama",
    "llama2",
    "llama2:13b",
    "codellama",
    "mistral",
    "mixtral",
    "phi",
    "neural-chat",
    "openchat",
    "vicuna",
];

const TAGS_TIMEOUT: Duration = Duration::from_secs(5);
const PULL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

impl GenerateRequest {
    pub fn streaming(model: &str, prompt: String, parameters: SessionParameters) -> Self {
        Self {
            model: model.to_owned(),
            prompt,
            stream: true,
            options: parameters.into(),
        }
    }
}

/// Sampling options in the backend's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub num_predict: i64,
    pub top_p: f64,
    pub top_k: i64,
    pub repeat_penalty: f64,
}

impl From<SessionParameters> for GenerateOptions {
    fn from(p: SessionParameters) -> Self {
        Self {
            temperature: p.temperature,
            num_predict: p.max_tokens,
            top_p: p.top_p,
            top_k: p.top_k,
            repeat_penalty: p.repeat_penalty,
        }
    }
}

/// One line of a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerateRecord {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Nanoseconds.
    #[serde(default)]
    pub eval_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Nanoseconds.
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

/// One line of a streaming `/api/pull` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullRecord {
    #[serde(default)]
    pub status: String,
    /// Bytes of the layer currently downloading.
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("could not connect to backend: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("backend request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("backend reported an error: {0}")]
    Generation(String),
    #[error("stream ended before the final record")]
    Incomplete,
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else if err.is_connect() {
            Self::Connect(err)
        } else {
            Self::Http(err)
        }
    }
}

impl BackendError {
    /// Text shown to the user in the `error` event.
    pub fn user_message(&self, model: &str) -> String {
        match self {
            Self::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                format!("Model \"{model}\" not found in Ollama. Please check available models.")
            }
            Self::Status { status, .. } if *status == StatusCode::BAD_REQUEST => {
                "Invalid request to Ollama. Check model parameters.".to_owned()
            }
            Self::Status { status, .. } => {
                format!("Failed to get response from Ollama. Status: {}", status.as_u16())
            }
            Self::Connect(_) => "Failed to connect to Ollama. Make sure Ollama is running.".to_owned(),
            Self::Timeout(_) => "Request to Ollama timed out. Try again.".to_owned(),
            other => format!("Error: {other}"),
        }
    }
}

/// Raw response lines, blank lines dropped.
pub type LineStream = BoxStream<'static, Result<String, BackendError>>;

pub trait GenerationBackend: Send + Sync + 'static {
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<LineStream, BackendError>> + Send;
}

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    /// Names of installed models.
    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(TAGS_TIMEOUT)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        let tags: TagsResponse = resp.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Start downloading `model`; progress records arrive one per line.
    pub async fn pull(&self, model: &str) -> Result<LineStream, BackendError> {
        debug!(model, "sending pull request");
        let resp = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .timeout(PULL_TIMEOUT)
            .json(&PullRequest {
                name: model,
                stream: true,
            })
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        Ok(split_lines(Box::pin(resp.bytes_stream())))
    }

    /// Installed models, or [`FALLBACK_MODELS`] when none can be listed.
    pub async fn available_models(&self) -> Vec<String> {
        match self.list_models().await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => {
                debug!("backend lists no models; serving fallback catalogue");
                fallback_models()
            }
            Err(e) => {
                warn!(error = %e, "failed to list backend models; serving fallback catalogue");
                fallback_models()
            }
        }
    }
}

pub fn fallback_models() -> Vec<String> {
    FALLBACK_MODELS.iter().map(|m| (*m).to_owned()).collect()
}

impl GenerationBackend for OllamaBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<LineStream, BackendError> {
        debug!(model = %request.model, prompt_len = request.prompt.len(), "sending generate request");
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        Ok(split_lines(Box::pin(resp.bytes_stream())))
    }
}

struct LineBuffer<S> {
    inner: S,
    buf: Vec<u8>,
    exhausted: bool,
}

/// Re-frame a byte stream into trimmed, non-blank lines. Bytes are buffered
/// until a newline so multi-byte characters split across reads survive.
pub fn split_lines<S, E>(bytes: S) -> LineStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<BackendError>,
{
    let state = LineBuffer {
        inner: bytes,
        buf: Vec::new(),
        exhausted: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(pos) = st.buf.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = st.buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_owned();
                if line.is_empty() {
                    continue;
                }
                return Some((Ok(line), st));
            }
            if st.exhausted {
                let rest = std::mem::take(&mut st.buf);
                let line = String::from_utf8_lossy(&rest).trim().to_owned();
                return (!line.is_empty()).then_some((Ok(line), st));
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.exhausted = true;
                    st.buf.clear();
                    return Some((Err(e.into()), st));
                }
                None => st.exhausted = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn chunks(parts: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes, BackendError>> + Send + Unpin + 'static {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))))
    }

    #[tokio::test]
    async fn lines_are_reassembled_across_reads() {
        let lines: Vec<String> = split_lines(chunks(vec![
            &b"{\"a\":"[..],
            &b"1}\n\n{\"b\""[..],
            &b":2}\n{\"c\":3}"[..],
        ]))
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":3}"#]);
    }

    #[tokio::test]
    async fn multibyte_characters_split_between_reads_survive() {
        // "é" is 0xC3 0xA9.
        let lines: Vec<String> = split_lines(chunks(vec![&b"caf\xC3"[..], &b"\xA9\n"[..]]))
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["café"]);
    }

    #[tokio::test]
    async fn read_error_ends_the_stream() {
        let parts = stream::iter(vec![
            Ok(Bytes::from_static(b"one\n")),
            Err(BackendError::Incomplete),
            Ok(Bytes::from_static(b"two\n")),
        ]);
        let items: Vec<_> = split_lines(parts).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(BackendError::Incomplete)));
    }

    #[test]
    fn parameters_map_to_backend_options() {
        let options = GenerateOptions::from(SessionParameters::default());
        let value = serde_json::to_value(options).unwrap();
        assert_eq!(value["num_predict"], 2048);
        assert_eq!(value["top_k"], 40);
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn records_tolerate_missing_fields() {
        let rec: GenerateRecord = serde_json::from_str(r#"{"response":"Hi"}"#).unwrap();
        assert_eq!(rec.response.as_deref(), Some("Hi"));
        assert!(!rec.done);
        assert_eq!(rec.eval_duration, None);
    }

    #[test]
    fn status_errors_map_to_user_messages() {
        let not_found = BackendError::Status {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        };
        assert_eq!(
            not_found.user_message("phi"),
            "Model \"phi\" not found in Ollama. Please check available models."
        );
        let other = BackendError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert_eq!(
            other.user_message("phi"),
            "Failed to get response from Ollama. Status: 502"
        );
        assert_eq!(
            BackendError::Incomplete.user_message("phi"),
            "Error: stream ended before the final record"
        );
    }

    async fn spawn_fake_ollama(seen: Arc<Mutex<Option<Value>>>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route(
                "/api/generate",
                post(move |Json(body): Json<Value>| {
                    let seen = Arc::clone(&seen);
                    async move {
                        let missing = body["model"] == "ghost";
                        *seen.lock().unwrap() = Some(body);
                        if missing {
                            return (AxumStatus::NOT_FOUND, String::from("model not found"));
                        }
                        (
                            AxumStatus::OK,
                            "{\"response\":\"Hi\",\"done\":false}\n{\"response\":\" there\",\"done\":true,\"eval_duration\":1000000}\n"
                                .to_owned(),
                        )
                    }
                }),
            )
            .route(
                "/api/tags",
                get(|| async { Json(json!({"models": [{"name": "tinyllama:latest"}]})) }),
            );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn generate_posts_options_and_streams_lines() {
        let seen = Arc::new(Mutex::new(None));
        let base = spawn_fake_ollama(Arc::clone(&seen)).await;
        let backend = OllamaBackend::new(&base, Duration::from_secs(5)).unwrap();

        let request = GenerateRequest::streaming("tinyllama", "hello".into(), SessionParameters::default());
        let lines: Vec<String> = backend
            .generate(&request)
            .await
            .unwrap()
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines.len(), 2);

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["options"]["num_predict"], 2048);
    }

    #[tokio::test]
    async fn missing_model_is_a_status_error() {
        let base = spawn_fake_ollama(Arc::new(Mutex::new(None))).await;
        let backend = OllamaBackend::new(&base, Duration::from_secs(5)).unwrap();
        let request = GenerateRequest::streaming("ghost", "hello".into(), SessionParameters::default());
        let err = backend.generate(&request).await.err().unwrap();
        assert!(matches!(err, BackendError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn models_are_listed_or_fall_back() {
        let base = spawn_fake_ollama(Arc::new(Mutex::new(None))).await;
        let backend = OllamaBackend::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(backend.available_models().await, vec!["tinyllama:latest"]);

        let offline = OllamaBackend::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        assert!(offline.list_models().await.is_err());
        assert_eq!(offline.available_models().await.len(), FALLBACK_MODELS.len());
    }
}
