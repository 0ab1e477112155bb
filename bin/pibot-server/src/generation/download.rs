//! Model downloads relayed as `download_progress` events.

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::backend::{BackendError, OllamaBackend, PullRecord};
use super::events::{DownloadProgress, DownloadStatus, EventSink, GatewayEvent};

/// Pull `model` through the backend and report every progress record to
/// `sink`. Exactly one `completed` or `error` event ends the run; the final
/// status is returned.
pub async fn relay_pull<E>(backend: &OllamaBackend, model: &str, sink: &E) -> DownloadStatus
where
    E: EventSink + ?Sized,
{
    info!(model, "model download started");
    sink.emit(GatewayEvent::DownloadProgress(progress(
        model,
        DownloadStatus::Starting,
        format!("Starting download of {model}..."),
        0,
    )));

    let mut lines = match backend.pull(model).await {
        Ok(lines) => lines,
        Err(BackendError::Status { status, body }) => {
            warn!(model, %status, "backend refused model download");
            return fail(model, format!("Failed to start download: {body}"), sink);
        }
        Err(e) => return fail(model, format!("Download failed: {e}"), sink),
    };

    while let Some(line) = lines.next().await {
        let raw = match line {
            Ok(raw) => raw,
            Err(e) => return fail(model, format!("Download failed: {e}"), sink),
        };
        let record: PullRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, line = %raw, "skipping malformed pull line");
                continue;
            }
        };
        if let Some(message) = record.error {
            return fail(model, format!("Download failed: {message}"), sink);
        }

        let pct = percent(record.completed, record.total);
        let message = if record.status.is_empty() {
            format!("Downloading: {pct}%")
        } else {
            format!("{}: {pct}%", record.status)
        };
        sink.emit(GatewayEvent::DownloadProgress(DownloadProgress {
            completed: Some(record.completed),
            total: Some(record.total),
            ..progress(model, DownloadStatus::Downloading, message, pct)
        }));

        if record.status.to_lowercase().contains("success") {
            info!(model, "model download completed");
            sink.emit(GatewayEvent::DownloadProgress(progress(
                model,
                DownloadStatus::Completed,
                format!("Successfully downloaded {model}!"),
                100,
            )));
            return DownloadStatus::Completed;
        }
    }

    fail(model, format!("Download failed: {}", BackendError::Incomplete), sink)
}

fn percent(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = u128::from(completed) * 100 / u128::from(total);
    pct.min(100) as u8
}

fn progress(model: &str, status: DownloadStatus, message: String, percent: u8) -> DownloadProgress {
    DownloadProgress {
        model: model.to_owned(),
        status,
        message,
        progress: percent,
        completed: None,
        total: None,
    }
}

fn fail<E>(model: &str, message: String, sink: &E) -> DownloadStatus
where
    E: EventSink + ?Sized,
{
    warn!(model, %message, "model download failed");
    sink.emit(GatewayEvent::DownloadProgress(progress(
        model,
        DownloadStatus::Error,
        message,
        0,
    )));
    DownloadStatus::Error
}
