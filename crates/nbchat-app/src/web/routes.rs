use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{Json, Response},
    routing::get,
    Router,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::bridge::{BridgeHandle, ClientMessage, ServerMessage};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub bridge: BridgeHandle,
    /// Every controller push, fanned out to all connected clients
    pub events: broadcast::Sender<ServerMessage>,
}

/// Create router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /ws - WebSocket endpoint
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    log::info!("client {} connected", client_id);

    // Subscribe before asking for state so the replies are not missed
    let mut events = state.events.subscribe();
    for initial in [
        ClientMessage::GetConfig,
        ClientMessage::GetSessions,
        ClientMessage::GetContext,
    ] {
        if state.bridge.send(initial).is_err() {
            log::warn!("controller is gone, closing client {}", client_id);
            return;
        }
    }

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Replies meant for this client only
    let (direct_tx, direct_rx) = mpsc::unbounded_channel();

    let send_task = tokio::spawn(async move {
        forward_pushes(client_id, events, direct_rx, &mut ws_sink).await;
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            WsMessage::Text(text) => match decode_frame(&text) {
                Ok(client_msg) => {
                    if state.bridge.send(client_msg).is_err() {
                        break;
                    }
                }
                Err(reply) => {
                    log::warn!("client {} sent an unreadable message", client_id);
                    let _ = direct_tx.send(reply);
                }
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    log::info!("client {} disconnected", client_id);
    send_task.abort();
}

/// Parse one text frame, or produce the error reply for its sender
fn decode_frame(text: &str) -> Result<ClientMessage, ServerMessage> {
    serde_json::from_str(text).map_err(|e| ServerMessage::Error {
        message: format!("Unreadable message: {}", e),
    })
}

/// Write controller pushes and this client's own replies to its socket
async fn forward_pushes<S>(
    client_id: Uuid,
    mut events: broadcast::Receiver<ServerMessage>,
    mut direct: mpsc::UnboundedReceiver<ServerMessage>,
    sink: &mut S,
) where
    S: Sink<WsMessage> + Unpin,
{
    loop {
        let msg = tokio::select! {
            received = events.recv() => match received {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("client {} fell behind, skipped {} updates", client_id, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(msg) = direct.recv() => msg,
        };

        if let Ok(json) = serde_json::to_string(&msg) {
            if sink.send(WsMessage::Text(json)).await.is_err() {
                break;
            }
        }
    }
}
