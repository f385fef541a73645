//! Message REST endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use courier_database::{ChatMessage, MediaMetadata, MessageKind};
use courier_messaging::SendMessageRequest;

use crate::error::GatewayResult;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub sender_id: String,
    pub recipient_id: String,
    pub content: Option<String>,
    pub kind: Option<String>,
    pub media: Option<MediaMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadBody {
    pub sender_id: String,
    pub recipient_id: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: Option<String>,
    pub kind: String,
    pub status: String,
    pub media: Option<MediaMetadata>,
    pub created_at: String,
    pub read_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

impl From<ChatMessage> for MessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.public_id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            content: message.content,
            kind: message.kind.to_string(),
            status: message.status.to_string(),
            media: message.media,
            created_at: message.created_at,
            read_at: message.read_at,
        }
    }
}

/// Send a direct message. Media messages carry an opaque reference already
/// stored by the external upload collaborator.
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<SendMessageBody>,
) -> GatewayResult<Json<MessageResponse>> {
    let kind = body
        .kind
        .as_deref()
        .map(MessageKind::from)
        .unwrap_or(MessageKind::Text);

    let message = state
        .message_service
        .send_message(SendMessageRequest {
            sender_id: body.sender_id,
            recipient_id: body.recipient_id,
            content: body.content,
            kind,
            media: body.media,
        })
        .await?;

    Ok(Json(message.into()))
}

/// Conversation history between two users in send order. An absent
/// conversation yields an empty list, not an error.
pub async fn get_chat_messages(
    State(state): State<Arc<GatewayState>>,
    Path((sender_id, recipient_id)): Path<(String, String)>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let messages = state
        .message_service
        .find_chat_messages(&sender_id, &recipient_id)
        .await?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// Count messages from `sender` that never reached `recipient`'s device
pub async fn count_unread_messages(
    State(state): State<Arc<GatewayState>>,
    Path((sender_id, recipient_id)): Path<(String, String)>,
) -> GatewayResult<Json<UnreadCountResponse>> {
    let count = state
        .message_service
        .count_unread_messages(&recipient_id, &sender_id)
        .await?;

    Ok(Json(UnreadCountResponse { count }))
}

/// Mark the sender's messages to the recipient as read and return the
/// mutated subset for read-receipt display
pub async fn mark_messages_read(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<MarkReadBody>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let messages = state
        .message_service
        .mark_messages_read_and_return(&body.sender_id, &body.recipient_id)
        .await?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// Single delivery acknowledgment from a client
pub async fn mark_message_delivered(
    State(state): State<Arc<GatewayState>>,
    Path(message_id): Path<String>,
) -> GatewayResult<Json<Option<MessageResponse>>> {
    let message = state
        .message_service
        .mark_message_delivered(&message_id)
        .await?;

    Ok(Json(message.map(MessageResponse::from)))
}
