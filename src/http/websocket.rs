//! Conversation WebSocket.
//!
//! # Responsibilities
//! - Accept the upgrade on `/ws/{connection_id}` and track the socket
//! - Run one orchestrator turn per `message` frame
//! - Forward each envelope as one JSON text frame, then `{"type":"done"}`
//! - Answer `ping` with `pong`; report unparsable frames without closing
//!
//! # Design Decisions
//! - One turn at a time per socket; frames received mid-turn wait
//! - A failed send ends the session; in-flight tool tasks finish on their own

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::server::AppState;
use crate::tools::CallContext;

/// Frames accepted from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Message {
        content: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    Ping,
}

/// Control frames sent alongside result envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    Pong,
    Done,
    Error { error: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(connection_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, state))
}

async fn handle_socket(mut socket: WebSocket, connection_id: String, state: AppState) {
    let _guard = state.connections.register(&connection_id);

    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket receive failed");
                break;
            }
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let sent = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Ping) => send_json(&mut socket, &ControlFrame::Pong).await,
            Ok(ClientMessage::Message { content, user_id }) => {
                let ctx = CallContext::new(user_id, Some(connection_id.clone()));
                run_turn(&mut socket, &state, content, ctx).await
            }
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Invalid client frame");
                let frame = ControlFrame::Error {
                    error: format!("invalid message: {e}"),
                };
                send_json(&mut socket, &frame).await
            }
        };

        if let Err(e) = sent {
            tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket send failed, closing");
            break;
        }
    }
}

async fn run_turn(
    socket: &mut WebSocket,
    state: &AppState,
    content: String,
    ctx: CallContext,
) -> Result<(), axum::Error> {
    let turn_id = Uuid::new_v4();
    tracing::info!(
        turn_id = %turn_id,
        connection_id = ctx.connection_id.as_deref().unwrap_or_default(),
        user_id = ctx.user_id.as_deref().unwrap_or("anonymous"),
        "Turn started"
    );

    let mut replies = std::pin::pin!(state.orchestrator.stream_reply(content, ctx));
    let mut sent = 0usize;
    while let Some(envelope) = replies.next().await {
        send_json(socket, &envelope).await?;
        sent += 1;
    }
    tracing::info!(turn_id = %turn_id, envelopes = sent, "Turn finished");
    send_json(socket, &ControlFrame::Done).await
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).map_err(axum::Error::new)?;
    socket.send(Message::Text(text.into())).await
}
