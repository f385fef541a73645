//! Repository for message data access operations.

use crate::entities::{ChatMessage, MediaMetadata, MessageKind, MessageStatus, NewMessage};
use crate::types::{MessagingError, MessagingResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

const MESSAGE_COLUMNS: &str = "id, public_id, room_id, sender_id, recipient_id, content, kind, \
                               status, media_url, file_name, file_size, mime_type, created_at, read_at";

/// Repository for message database operations
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new message. This is the only write path for new records;
    /// the creation timestamp is stamped here.
    pub async fn create(&self, message: &NewMessage) -> MessagingResult<ChatMessage> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let media = message.media.as_ref();

        let result = sqlx::query(
            "INSERT INTO messages (public_id, room_id, sender_id, recipient_id, content, kind,
                                   status, media_url, file_name, file_size, mime_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&message.room_id)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(&message.content)
        .bind(message.kind.to_string())
        .bind(message.status.to_string())
        .bind(media.map(|m| m.url.clone()))
        .bind(media.and_then(|m| m.file_name.clone()))
        .bind(media.and_then(|m| m.file_size))
        .bind(media.and_then(|m| m.mime_type.clone()))
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        let message_id = result.last_insert_rowid();

        info!(
            message_id = message_id,
            public_id = %public_id,
            room_id = %message.room_id,
            sender_id = %message.sender_id,
            recipient_id = %message.recipient_id,
            status = message.status.as_str(),
            "created new message"
        );

        Ok(ChatMessage {
            id: message_id,
            public_id,
            room_id: message.room_id.clone(),
            sender_id: message.sender_id.clone(),
            recipient_id: message.recipient_id.clone(),
            content: message.content.clone(),
            kind: message.kind,
            status: message.status,
            media: message.media.clone(),
            created_at: now,
            read_at: None,
        })
    }

    /// Find all messages in a room in creation order
    pub async fn find_by_room(&self, room_id: &str) -> MessagingResult<Vec<ChatMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE room_id = ?
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        rows.iter().map(map_message).collect()
    }

    /// Find a message by its public id
    pub async fn find_by_public_id(&self, public_id: &str) -> MessagingResult<Option<ChatMessage>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        row.as_ref().map(map_message).transpose()
    }

    /// Find messages addressed to a recipient in a given status
    pub async fn find_by_recipient_and_status(
        &self,
        recipient_id: &str,
        status: MessageStatus,
    ) -> MessagingResult<Vec<ChatMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE recipient_id = ? AND status = ?
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(recipient_id)
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        rows.iter().map(map_message).collect()
    }

    /// Count messages from a sender to a recipient in a given status
    pub async fn count_by_recipient_sender_status(
        &self,
        recipient_id: &str,
        sender_id: &str,
        status: MessageStatus,
    ) -> MessagingResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM messages
             WHERE recipient_id = ? AND sender_id = ? AND status = ?",
        )
        .bind(recipient_id)
        .bind(sender_id)
        .bind(status.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        row.try_get("count")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))
    }

    /// Status-transition write keyed by the message identifier. Last writer
    /// wins per single message; callers gate transitions through
    /// `MessageStatus::can_advance_to`.
    pub async fn set_status(
        &self,
        public_id: &str,
        status: MessageStatus,
        read_at: Option<&str>,
    ) -> MessagingResult<()> {
        sqlx::query("UPDATE messages SET status = ?, read_at = ? WHERE public_id = ?")
            .bind(status.to_string())
            .bind(read_at)
            .bind(public_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

fn map_message(row: &sqlx::sqlite::SqliteRow) -> MessagingResult<ChatMessage> {
    let kind: String = row
        .try_get("kind")
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

    let media_url: Option<String> = row
        .try_get("media_url")
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

    let media = media_url.map(|url| -> MessagingResult<MediaMetadata> {
        Ok(MediaMetadata {
            url,
            file_name: row
                .try_get("file_name")
                .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
            file_size: row
                .try_get("file_size")
                .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
            mime_type: row
                .try_get("mime_type")
                .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
        })
    });

    Ok(ChatMessage {
        id: row
            .try_get("id")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
        room_id: row
            .try_get("room_id")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
        sender_id: row
            .try_get("sender_id")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
        recipient_id: row
            .try_get("recipient_id")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
        content: row
            .try_get("content")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
        kind: MessageKind::from(kind.as_str()),
        status: MessageStatus::from(status.as_str()),
        media: media.transpose()?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
        read_at: row
            .try_get("read_at")
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?,
    })
}
