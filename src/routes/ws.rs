use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{debug, info};

use crate::realtime::{HubMessage, Transport};
use crate::state::AppState;

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// First server frame is a `welcome` message with the connection id; after
/// that every frame is a JSON object discriminated by `type`. Server
/// shutdown arrives as a close frame carrying the reason. Inbound client
/// frames are ignored apart from close; the hub is broadcast-only.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (id, mut rx) = state.hub.register(Transport::Ws);

    let welcome = json!({ "type": "welcome", "connectionId": id }).to_string();
    if socket.send(Message::Text(welcome.into())).await.is_err() {
        state.hub.unregister(id);
        return;
    }
    info!(connection_id = %id, "websocket client connected");

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(HubMessage::Frame(frame)) => {
                    // frame.data is pre-serialized JSON; event names are
                    // validated to [A-Za-z0-9_.-] so this composes safely.
                    let text = format!(
                        r#"{{"type":"{}","payload":{}}}"#,
                        frame.event, frame.data
                    );
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(HubMessage::Close { reason }) => {
                    let _ = socket
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
                None => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.unregister(id);
    debug!(connection_id = %id, "websocket client disconnected");
}
