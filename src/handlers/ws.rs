//! WebSocket handler: connection lifecycle and room commands.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::handlers::http::AppState;
use crate::models::{ClientMessage, Room, ServerEvent};
use crate::services::{ConnectionId, EventHub};

/// GET /ws — upgrade and hand the socket to the hub.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let conn = ConnectionId::new();
    info!(%conn, "ws connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerEvent>();
    state.hub().register(conn, tx);

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => route_client_message(state.hub(), conn, client_msg),
                Err(e) => debug!(%conn, error = %e, "ignoring malformed client message"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.hub().deregister(conn);
    send_task.abort();
    info!(%conn, "ws disconnected");
}

/// Apply one client command to the hub.
pub fn route_client_message(hub: &EventHub, conn: ConnectionId, msg: ClientMessage) {
    match msg {
        ClientMessage::JoinUserRoom(user_id) => hub.join(conn, Room::user(user_id)),
        ClientMessage::JoinBlogsRoom => hub.join(conn, Room::AllBlogs),
        ClientMessage::UserTyping(payload) => hub.relay_typing(conn, payload),
        ClientMessage::UserStoppedTyping(payload) => hub.relay_stopped_typing(conn, payload),
    }
}
