//! Message entity definitions

use serde::{Deserialize, Serialize};

/// A direct message between two users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub public_id: String,
    pub room_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: Option<String>,
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub media: Option<MediaMetadata>,
    pub created_at: String,
    pub read_at: Option<String>,
}

/// Metadata for a media message. The referenced object is uploaded and
/// validated by an external collaborator; this core never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub url: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
}

/// New message record handed to the message store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub room_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: Option<String>,
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub media: Option<MediaMetadata>,
}

/// Delivery state of a message.
///
/// Sent means the record is stored but never reached the recipient's live
/// connection; Delivered means it reached the device unread; Read means the
/// recipient opened it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
        }
    }

    /// Whether moving to `next` advances the lifecycle. Status only ever
    /// moves forward along Sent -> Delivered -> Read; every transition in
    /// the service layer goes through this predicate.
    pub fn can_advance_to(&self, next: MessageStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl From<&str> for MessageStatus {
    fn from(s: &str) -> Self {
        match s {
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            _ => MessageStatus::Sent,
        }
    }
}

impl ToString for MessageStatus {
    fn to_string(&self) -> String {
        self.as_str().to_string()
    }
}

/// Kind of message payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, MessageKind::Text)
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "video" => MessageKind::Video,
            "audio" => MessageKind::Audio,
            _ => MessageKind::Text,
        }
    }
}

impl ToString for MessageKind {
    fn to_string(&self) -> String {
        self.as_str().to_string()
    }
}

impl NewMessage {
    pub fn validate(&self) -> Result<(), String> {
        if self.sender_id == self.recipient_id {
            return Err("Sender and recipient must differ".to_string());
        }

        match self.kind {
            MessageKind::Text => {
                let empty = self
                    .content
                    .as_deref()
                    .map(|c| c.trim().is_empty())
                    .unwrap_or(true);
                if empty {
                    return Err("Text message content cannot be empty".to_string());
                }
            }
            _ => {
                if self.media.is_none() {
                    return Err("Media message requires media metadata".to_string());
                }
            }
        }

        Ok(())
    }
}
