//! WebSocket endpoint for live connections.
//!
//! A connection marks the user online, flushes messages that were stored
//! Sent while they were away, and then streams the user's message topic
//! plus the global presence topic until the socket closes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use courier_fanout::{Event, Topic};

use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: String,
}

/// Create the WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(websocket_handler))
}

pub async fn websocket_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: String, state: Arc<GatewayState>) {
    // Subscribe before flushing so no event published during the flush is
    // missed
    let mut message_events = state.event_bus.subscribe(Topic::messages_for(&user_id));
    let mut presence_events = state.event_bus.subscribe(Topic::Presence);

    if let Err(error) = state.presence_service.connect(&user_id).await {
        warn!(%error, user_id, "failed to mark user online");
    }

    flush_undelivered(&state, &user_id).await;

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = message_events.recv() => {
                if !forward_event(&mut sink, &user_id, event).await {
                    break;
                }
            }
            event = presence_events.recv() => {
                if !forward_event(&mut sink, &user_id, event).await {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(error)) => {
                        debug!(%error, user_id, "websocket read error");
                        break;
                    }
                    // Clients write through the REST surface; socket
                    // payloads are ignored
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if let Err(error) = state.presence_service.disconnect(&user_id).await {
        warn!(%error, user_id, "failed to mark user offline");
    }

    info!(user_id, "websocket connection closed");
}

/// Transition messages stored Sent while the user was away, reporting
/// per-item failures without aborting the rest.
async fn flush_undelivered(state: &Arc<GatewayState>, user_id: &str) {
    match state.message_service.find_undelivered_messages(user_id).await {
        Ok(pending) if !pending.is_empty() => {
            let report = state.message_service.mark_messages_delivered(&pending).await;
            info!(
                user_id,
                delivered = report.delivered.len(),
                failed = report.failures.len(),
                "flushed undelivered messages"
            );
        }
        Ok(_) => {}
        Err(error) => warn!(%error, user_id, "failed to load undelivered messages"),
    }
}

/// Forward one bus event to the socket. Returns false when the connection
/// should be torn down.
async fn forward_event(
    sink: &mut SplitSink<WebSocket, Message>,
    user_id: &str,
    event: Result<Event, broadcast::error::RecvError>,
) -> bool {
    match event {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(payload) => sink.send(Message::Text(payload)).await.is_ok(),
            Err(error) => {
                warn!(%error, user_id, "failed to serialize event");
                true
            }
        },
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            warn!(user_id, skipped, "websocket subscriber lagging");
            true
        }
        Err(broadcast::error::RecvError::Closed) => false,
    }
}
