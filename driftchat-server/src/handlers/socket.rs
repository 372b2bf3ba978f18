//! Push-channel endpoint: one WebSocket per client session.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use shared::{ClientFrame, ServerFrame};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;

/// WebSocket upgrade handler for `/ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drives one connection: a forwarder task drains the outbound buffer into
/// the socket while this task parses inbound frames into the relay.
///
/// Malformed payloads are logged and dropped without closing the
/// connection. On any close path the registry entry is removed before the
/// close is reported, so the relay never broadcasts to a dead target that
/// it could have known about.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "connection established");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<ServerFrame>(state.config.channel_capacity);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        debug!("socket send failed, client disconnected");
                        break;
                    }
                }
                Err(err) => error!(error = %err, "failed to serialize outbound frame"),
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                debug!(%connection_id, "client sent close frame");
                break;
            }
            Ok(_) => continue,
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket error");
                break;
            }
        };

        match serde_json::from_str::<ClientFrame>(&text) {
            Ok(frame) => state.relay.submit(connection_id, frame, &outbound_tx).await,
            Err(err) => {
                metrics::counter!("relay_malformed_frames_total").increment(1);
                error!(%connection_id, error = %err, "dropping malformed frame");
            }
        }
    }

    // Remove the registration before reporting the close upward.
    match state.registry.unregister(connection_id).await {
        Some(participant_id) => {
            info!(%connection_id, participant_id, "participant disconnected");
        }
        None => info!(%connection_id, "connection closed"),
    }
    send_task.abort();
}
