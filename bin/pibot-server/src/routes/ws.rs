//! Real-time chat transport.
//!
//! `GET /ws?token=…` upgrades to a WebSocket. Client frames are JSON
//! [`ClientCommand`]s; server frames are JSON [`GatewayEvent`]s. Each
//! `send_message` runs in its own task so a `stop_generation` on the same
//! connection is handled while the reply is still streaming.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::entities::User;
use crate::error::ServerError;
use crate::generation::{ClientCommand, GatewayEvent, MessageRequest};
use crate::middleware::auth::{authenticate, request_token};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    req: Request,
) -> Result<Response, ServerError> {
    // Authenticate before looking at the upgrade so bad tokens get a 401.
    let token = request_token(req.headers(), req.uri().query());
    let user = authenticate(&state, token).await?;
    let ws = ws.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: User) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut events) = state.gateway.join(&user.id);
    info!(
        user_id = %user.id,
        %connection_id,
        connections = state.gateway.connection_count(&user.id),
        "client connected"
    );

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode gateway event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_command(&state, &user, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "websocket read failed");
                break;
            }
        }
    }

    if state.gateway.leave(&user.id, connection_id) && state.registry.mark_cancelled(&user.id) {
        info!(user_id = %user.id, "last connection closed; active generation cancelled");
    }
    writer.abort();
    info!(user_id = %user.id, %connection_id, "client disconnected");
}

fn handle_command(state: &Arc<AppState>, user: &User, raw: &str) {
    let command = match serde_json::from_str::<ClientCommand>(raw) {
        Ok(command) => command,
        Err(e) => {
            debug!(error = %e, "unrecognised client frame");
            state
                .gateway
                .emit_to(&user.id, GatewayEvent::error("Unrecognised command"));
            return;
        }
    };

    match command {
        ClientCommand::SendMessage { session_id, message } => {
            let controller = state.controller.clone();
            let sink = state.gateway.room(&user.id);
            let request = MessageRequest {
                owner_id: user.id.clone(),
                session_id,
                message,
            };
            tokio::spawn(async move {
                controller.handle_message(request, &sink).await;
            });
        }
        ClientCommand::StopGeneration { session_id } => {
            if state.registry.mark_cancelled(&user.id) {
                info!(user_id = %user.id, %session_id, "stop requested");
            } else {
                state
                    .gateway
                    .emit_to(&user.id, GatewayEvent::error("No active generation to stop"));
            }
        }
    }
}
