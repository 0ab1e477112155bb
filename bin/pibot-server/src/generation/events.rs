//! Events pushed to connected clients while a message is processed.
//!
//! On the wire every event is `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    WebSearchStart {
        message: String,
    },
    WebSearchProgress {
        message: String,
    },
    WebSearchComplete {
        message: String,
        results_count: usize,
    },
    StreamingStart {
        model: String,
        /// Unix time in seconds.
        timestamp: f64,
        session_id: String,
    },
    FirstToken {
        time_to_first_token: f64,
    },
    MessageChunk(ChunkEvent),
    MessageComplete(CompletionEvent),
    GenerationStopped {
        session_id: String,
        message: String,
    },
    Error {
        message: String,
    },
    DownloadProgress(DownloadProgress),
}

impl GatewayEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MessageComplete(_) | Self::Error { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkEvent {
    pub chunk: String,
    pub token_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words_in_chunk: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stopped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletionEvent {
    pub model: String,
    pub total_tokens: u64,
    pub total_time: f64,
    pub tokens_per_second: f64,
    pub time_to_first_token: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_eval_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_eval_duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_prompt_eval_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_prompt_eval_duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stopped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Starting,
    Downloading,
    Completed,
    Error,
}

/// Progress of an administrator-requested model download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub model: String,
    pub status: DownloadStatus,
    pub message: String,
    /// Percent of the current layer, 0 to 100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Commands a client sends over the socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    SendMessage { session_id: String, message: String },
    StopGeneration { session_id: String },
}

/// Destination for the events of one generation run.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GatewayEvent);
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_event_and_data_envelope() {
        let value = serde_json::to_value(GatewayEvent::WebSearchComplete {
            message: "done".into(),
            results_count: 2,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"event": "web_search_complete", "data": {"message": "done", "results_count": 2}})
        );
    }

    #[test]
    fn stop_marker_chunk_omits_rate_fields() {
        let value = serde_json::to_value(GatewayEvent::MessageChunk(ChunkEvent {
            chunk: "x".into(),
            token_count: 4,
            stopped: true,
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(
            value,
            json!({"event": "message_chunk", "data": {"chunk": "x", "token_count": 4, "stopped": true}})
        );
    }

    #[test]
    fn regular_chunks_do_not_carry_stopped() {
        let value = serde_json::to_value(ChunkEvent {
            chunk: "hi".into(),
            token_count: 1,
            tokens_per_second: Some(0.0),
            ..Default::default()
        })
        .unwrap();
        assert!(value.get("stopped").is_none());
    }

    #[test]
    fn download_progress_is_tagged_like_other_events() {
        let value = serde_json::to_value(GatewayEvent::DownloadProgress(DownloadProgress {
            model: "phi".into(),
            status: DownloadStatus::Starting,
            message: "Starting download of phi...".into(),
            progress: 0,
            completed: None,
            total: None,
        }))
        .unwrap();
        assert_eq!(
            value,
            json!({"event": "download_progress", "data": {
                "model": "phi",
                "status": "starting",
                "message": "Starting download of phi...",
                "progress": 0
            }})
        );
    }

    #[test]
    fn client_commands_parse_by_type() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"stop_generation","session_id":"s1"}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::StopGeneration {
                session_id: "s1".into()
            }
        );
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"dance"}"#).is_err());
    }
}
