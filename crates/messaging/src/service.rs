//! Message lifecycle service.

use std::sync::Arc;

use courier_database::{
    ChatMessage, MediaMetadata, MessageKind, MessageRepository, MessageStatus, MessagingError,
    MessagingResult, NewMessage, RoomRepository,
};
use courier_fanout::{Event, EventBus, Topic};
use courier_presence::PresenceService;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Request to send a direct message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub recipient_id: String,
    pub content: Option<String>,
    pub kind: MessageKind,
    pub media: Option<MediaMetadata>,
}

/// Per-item outcome report for a bulk delivery pass
#[derive(Debug, Default)]
pub struct BulkDeliveryReport {
    pub delivered: Vec<ChatMessage>,
    pub failures: Vec<DeliveryFailure>,
}

/// A single message whose delivery transition could not be persisted
#[derive(Debug)]
pub struct DeliveryFailure {
    pub public_id: String,
    pub error: String,
}

/// Service orchestrating the message delivery state machine
pub struct MessageService {
    messages: MessageRepository,
    rooms: RoomRepository,
    presence: Arc<PresenceService>,
    events: EventBus,
}

impl MessageService {
    /// Create a new message service instance
    pub fn new(pool: SqlitePool, presence: Arc<PresenceService>, events: EventBus) -> Self {
        Self {
            messages: MessageRepository::new(pool.clone()),
            rooms: RoomRepository::new(pool),
            presence,
            events,
        }
    }

    /// Store a new message, resolving (or creating) the room and choosing
    /// the initial status from the recipient's presence: Delivered when the
    /// recipient is online, Sent otherwise. The recipient's live socket is
    /// assumed to deliver immediately when already connected; a disconnect
    /// between the presence read and actual delivery leaves the stored
    /// status slightly optimistic, which downstream read receipts dominate.
    pub async fn send_message(&self, request: SendMessageRequest) -> MessagingResult<ChatMessage> {
        let mut new_message = NewMessage {
            room_id: String::new(),
            sender_id: request.sender_id,
            recipient_id: request.recipient_id,
            content: request.content,
            kind: request.kind,
            status: MessageStatus::Sent,
            media: request.media,
        };

        // Validate before resolving the room so a rejected send cannot
        // create one as a side effect
        if let Err(e) = new_message.validate() {
            return Err(MessagingError::ValidationError(e));
        }

        new_message.room_id = self
            .rooms
            .create_for_pair(&new_message.sender_id, &new_message.recipient_id)
            .await?;

        // Point-in-time read; a failed presence lookup must not block the
        // send, it only downgrades the initial status to Sent.
        let recipient_online = match self.presence.is_online(&new_message.recipient_id).await {
            Ok(online) => online,
            Err(error) => {
                warn!(%error, recipient_id = %new_message.recipient_id, "presence lookup failed, assuming offline");
                false
            }
        };

        if recipient_online {
            new_message.status = MessageStatus::Delivered;
        }

        let stored = self.messages.create(&new_message).await?;

        self.events.publish(
            Topic::messages_for(&stored.recipient_id),
            Event::MessageCreated {
                message: stored.clone(),
            },
        );

        Ok(stored)
    }

    /// Mark a single message as delivered. Unknown identifiers and messages
    /// already past Sent are silent no-ops; the status never regresses.
    pub async fn mark_message_delivered(
        &self,
        public_id: &str,
    ) -> MessagingResult<Option<ChatMessage>> {
        let Some(message) = self.messages.find_by_public_id(public_id).await? else {
            debug!(public_id, "delivery ack for unknown message ignored");
            return Ok(None);
        };

        if !message.status.can_advance_to(MessageStatus::Delivered) {
            return Ok(None);
        }

        self.messages
            .set_status(public_id, MessageStatus::Delivered, None)
            .await?;

        let delivered = ChatMessage {
            status: MessageStatus::Delivered,
            ..message
        };

        self.events.publish(
            Topic::messages_for(&delivered.sender_id),
            Event::MessageDelivered {
                message: delivered.clone(),
            },
        );

        Ok(Some(delivered))
    }

    /// Apply the delivery transition to each message independently. One
    /// item's persistence failure is recorded and never aborts its siblings.
    pub async fn mark_messages_delivered(&self, messages: &[ChatMessage]) -> BulkDeliveryReport {
        let mut report = BulkDeliveryReport::default();

        for message in messages {
            if !message.status.can_advance_to(MessageStatus::Delivered) {
                continue;
            }

            match self
                .messages
                .set_status(&message.public_id, MessageStatus::Delivered, None)
                .await
            {
                Ok(()) => {
                    let delivered = ChatMessage {
                        status: MessageStatus::Delivered,
                        ..message.clone()
                    };
                    self.events.publish(
                        Topic::messages_for(&delivered.sender_id),
                        Event::MessageDelivered {
                            message: delivered.clone(),
                        },
                    );
                    report.delivered.push(delivered);
                }
                Err(error) => {
                    warn!(public_id = %message.public_id, %error, "delivery transition failed");
                    report.failures.push(DeliveryFailure {
                        public_id: message.public_id.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Mark every message in the pair's room that is addressed to the
    /// recipient and not yet Read as Read, stamping the read time. A missing
    /// room is a no-op. Returns how many messages were updated.
    pub async fn mark_messages_read(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> MessagingResult<usize> {
        let updated = self
            .read_room_messages(sender_id, recipient_id, false)
            .await?;
        Ok(updated.len())
    }

    /// As `mark_messages_read`, but restricted to messages sent by
    /// `sender_id` (a directional read receipt), returning the mutated
    /// subset. The subset is published to the sender's topic after all
    /// updates are persisted.
    pub async fn mark_messages_read_and_return(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> MessagingResult<Vec<ChatMessage>> {
        let updated = self
            .read_room_messages(sender_id, recipient_id, true)
            .await?;

        if !updated.is_empty() {
            self.events.publish(
                Topic::messages_for(sender_id),
                Event::MessagesRead {
                    messages: updated.clone(),
                },
            );
        }

        Ok(updated)
    }

    async fn read_room_messages(
        &self,
        sender_id: &str,
        recipient_id: &str,
        sender_only: bool,
    ) -> MessagingResult<Vec<ChatMessage>> {
        let Some(room_id) = self.rooms.find_by_pair(sender_id, recipient_id).await? else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();

        for message in self.messages.find_by_room(&room_id).await? {
            if message.recipient_id != recipient_id {
                continue;
            }
            if sender_only && message.sender_id != sender_id {
                continue;
            }
            if !message.status.can_advance_to(MessageStatus::Read) {
                continue;
            }

            let read_at = chrono::Utc::now().to_rfc3339();
            self.messages
                .set_status(&message.public_id, MessageStatus::Read, Some(&read_at))
                .await?;

            updated.push(ChatMessage {
                status: MessageStatus::Read,
                read_at: Some(read_at),
                ..message
            });
        }

        Ok(updated)
    }

    /// Count messages from a sender to a recipient that never reached the
    /// device. Delivered-but-unread messages are intentionally excluded:
    /// Sent is the "never arrived" signal, distinct from "arrived unopened".
    pub async fn count_unread_messages(
        &self,
        recipient_id: &str,
        sender_id: &str,
    ) -> MessagingResult<i64> {
        self.messages
            .count_by_recipient_sender_status(recipient_id, sender_id, MessageStatus::Sent)
            .await
    }

    /// Conversation history for a pair of users in send order. An absent
    /// room yields an empty history and creates nothing.
    pub async fn find_chat_messages(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> MessagingResult<Vec<ChatMessage>> {
        match self.rooms.find_by_pair(user_a, user_b).await? {
            Some(room_id) => self.messages.find_by_room(&room_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Messages stored Sent for a recipient, i.e. those that never reached
    /// a live connection. Used to flush deliveries when the user connects.
    pub async fn find_undelivered_messages(
        &self,
        recipient_id: &str,
    ) -> MessagingResult<Vec<ChatMessage>> {
        self.messages
            .find_by_recipient_and_status(recipient_id, MessageStatus::Sent)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_database::{Presence, RegisterUserRequest, UserRepository};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    struct TestContext {
        service: MessageService,
        presence: Arc<PresenceService>,
        events: EventBus,
        _temp_dir: TempDir,
    }

    async fn create_test_context() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_messaging.db");
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePool::connect(&db_url).await.unwrap();

        sqlx::query(
            "CREATE TABLE users (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                presence TEXT NOT NULL DEFAULT 'offline',
                last_seen_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                public_id TEXT NOT NULL UNIQUE,
                pair_key TEXT NOT NULL UNIQUE,
                user_low TEXT NOT NULL,
                user_high TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                public_id TEXT NOT NULL UNIQUE,
                room_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL,
                content TEXT,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                media_url TEXT,
                file_name TEXT,
                file_size INTEGER,
                mime_type TEXT,
                created_at TEXT NOT NULL,
                read_at TEXT
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        let users = UserRepository::new(pool.clone());
        for (id, name) in [("alice", "Alice"), ("bob", "Bob")] {
            users
                .register(&RegisterUserRequest {
                    id: id.to_string(),
                    display_name: name.to_string(),
                })
                .await
                .unwrap();
        }

        let events = EventBus::new();
        let presence = Arc::new(PresenceService::new(pool.clone(), events.clone()));
        let service = MessageService::new(pool, presence.clone(), events.clone());

        TestContext {
            service,
            presence,
            events,
            _temp_dir: temp_dir,
        }
    }

    fn text(sender: &str, recipient: &str, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            sender_id: sender.to_string(),
            recipient_id: recipient.to_string(),
            content: Some(content.to_string()),
            kind: MessageKind::Text,
            media: None,
        }
    }

    #[tokio::test]
    async fn test_send_to_offline_recipient_is_sent() {
        let ctx = create_test_context().await;

        let message = ctx.service.send_message(text("alice", "bob", "hi")).await.unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
        assert!(message.read_at.is_none());
    }

    #[tokio::test]
    async fn test_send_to_online_recipient_is_delivered() {
        let ctx = create_test_context().await;
        ctx.presence.connect("bob").await.unwrap();

        let message = ctx.service.send_message(text("alice", "bob", "hi")).await.unwrap();
        assert_eq!(message.status, MessageStatus::Delivered);
    }

    #[tokio::test]
    async fn test_send_to_unknown_recipient_is_sent() {
        let ctx = create_test_context().await;

        let message = ctx
            .service
            .send_message(text("alice", "nobody", "hi"))
            .await
            .unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn test_send_rejects_empty_text() {
        let ctx = create_test_context().await;

        let result = ctx.service.send_message(text("alice", "bob", "   ")).await;
        assert!(matches!(result, Err(MessagingError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_both_directions_share_one_room() {
        let ctx = create_test_context().await;

        let first = ctx.service.send_message(text("alice", "bob", "hi")).await.unwrap();
        let second = ctx.service.send_message(text("bob", "alice", "hey")).await.unwrap();

        assert_eq!(first.room_id, second.room_id);
    }

    #[tokio::test]
    async fn test_send_publishes_to_recipient_topic() {
        let ctx = create_test_context().await;
        let mut rx = ctx.events.subscribe(Topic::messages_for("bob"));

        let sent = ctx.service.send_message(text("alice", "bob", "hi")).await.unwrap();

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for message event")
            .unwrap();

        match event {
            Event::MessageCreated { message } => {
                assert_eq!(message.public_id, sent.public_id);
                // The record is already queryable when the event arrives
                let history = ctx
                    .service
                    .find_chat_messages("alice", "bob")
                    .await
                    .unwrap();
                assert!(history.iter().any(|m| m.public_id == sent.public_id));
            }
            other => panic!("unexpected event: {}", other.event_type_name()),
        }
    }

    #[tokio::test]
    async fn test_deliver_single_advances_only_sent() {
        let ctx = create_test_context().await;

        let message = ctx.service.send_message(text("alice", "bob", "hi")).await.unwrap();
        assert_eq!(message.status, MessageStatus::Sent);

        let delivered = ctx
            .service
            .mark_message_delivered(&message.public_id)
            .await
            .unwrap();
        assert_eq!(delivered.unwrap().status, MessageStatus::Delivered);

        // Second ack is a no-op
        let again = ctx
            .service
            .mark_message_delivered(&message.public_id)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_deliver_never_regresses_read() {
        let ctx = create_test_context().await;

        let message = ctx.service.send_message(text("alice", "bob", "hi")).await.unwrap();
        ctx.service
            .mark_messages_read_and_return("alice", "bob")
            .await
            .unwrap();

        let result = ctx
            .service
            .mark_message_delivered(&message.public_id)
            .await
            .unwrap();
        assert!(result.is_none());

        let history = ctx.service.find_chat_messages("alice", "bob").await.unwrap();
        assert_eq!(history[0].status, MessageStatus::Read);
        assert!(history[0].read_at.is_some());
    }

    #[tokio::test]
    async fn test_deliver_unknown_message_is_silent() {
        let ctx = create_test_context().await;

        let result = ctx.service.mark_message_delivered("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_bulk_delivery_skips_advanced_messages() {
        let ctx = create_test_context().await;

        let first = ctx.service.send_message(text("alice", "bob", "one")).await.unwrap();
        let second = ctx.service.send_message(text("alice", "bob", "two")).await.unwrap();
        ctx.service
            .mark_messages_read_and_return("alice", "bob")
            .await
            .unwrap();
        let third = ctx.service.send_message(text("alice", "bob", "three")).await.unwrap();

        let pending = ctx.service.find_undelivered_messages("bob").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].public_id, third.public_id);

        // Feeding already-read messages through the bulk path must not
        // regress them
        let all = vec![first, second, third];
        let report = ctx.service.mark_messages_delivered(&all).await;
        assert_eq!(report.delivered.len(), 1);
        assert!(report.failures.is_empty());

        let history = ctx.service.find_chat_messages("alice", "bob").await.unwrap();
        assert_eq!(history[0].status, MessageStatus::Read);
        assert_eq!(history[1].status, MessageStatus::Read);
        assert_eq!(history[2].status, MessageStatus::Delivered);
    }

    #[tokio::test]
    async fn test_mark_read_is_directional() {
        let ctx = create_test_context().await;

        ctx.service.send_message(text("alice", "bob", "from alice")).await.unwrap();
        ctx.service.send_message(text("bob", "alice", "from bob")).await.unwrap();

        // Alice reads bob's messages: only bob -> alice flips
        let read = ctx
            .service
            .mark_messages_read_and_return("bob", "alice")
            .await
            .unwrap();

        assert_eq!(read.len(), 1);
        assert_eq!(read[0].sender_id, "bob");
        assert_eq!(read[0].recipient_id, "alice");
        assert_eq!(read[0].status, MessageStatus::Read);
        assert!(read[0].read_at.is_some());

        let history = ctx.service.find_chat_messages("alice", "bob").await.unwrap();
        let alices = history.iter().find(|m| m.sender_id == "alice").unwrap();
        assert_eq!(alices.status, MessageStatus::Sent);
        assert!(alices.read_at.is_none());
    }

    #[tokio::test]
    async fn test_mark_read_publishes_receipt_to_sender() {
        let ctx = create_test_context().await;
        let mut rx = ctx.events.subscribe(Topic::messages_for("alice"));

        ctx.service.send_message(text("alice", "bob", "hi")).await.unwrap();
        ctx.service
            .mark_messages_read_and_return("alice", "bob")
            .await
            .unwrap();

        // Skip the MessageCreated that send_message published to bob only;
        // alice's topic sees just the receipt
        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for read receipt")
            .unwrap();

        match event {
            Event::MessagesRead { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].status, MessageStatus::Read);
            }
            other => panic!("unexpected event: {}", other.event_type_name()),
        }
    }

    #[tokio::test]
    async fn test_mark_read_without_room_is_noop() {
        let ctx = create_test_context().await;

        let count = ctx.service.mark_messages_read("alice", "bob").await.unwrap();
        assert_eq!(count, 0);

        let read = ctx
            .service
            .mark_messages_read_and_return("alice", "bob")
            .await
            .unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn test_count_unread_counts_sent_only() {
        let ctx = create_test_context().await;

        ctx.service.send_message(text("alice", "bob", "one")).await.unwrap();
        ctx.service.send_message(text("alice", "bob", "two")).await.unwrap();

        assert_eq!(
            ctx.service.count_unread_messages("bob", "alice").await.unwrap(),
            2
        );

        // Delivery (not reading) already clears the count: Sent means
        // "never reached the device"
        let pending = ctx.service.find_undelivered_messages("bob").await.unwrap();
        ctx.service.mark_messages_delivered(&pending).await;

        assert_eq!(
            ctx.service.count_unread_messages("bob", "alice").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_history_for_absent_room_is_empty_and_creates_nothing() {
        let ctx = create_test_context().await;

        let history = ctx.service.find_chat_messages("alice", "bob").await.unwrap();
        assert!(history.is_empty());

        // The read path must not have created a room as a side effect
        let count = ctx.service.mark_messages_read("alice", "bob").await.unwrap();
        assert_eq!(count, 0);
        let history = ctx.service.find_chat_messages("alice", "bob").await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_conversation_scenario() {
        let ctx = create_test_context().await;

        // Bob is online, Alice is offline
        ctx.presence.connect("bob").await.unwrap();

        let hi = ctx.service.send_message(text("alice", "bob", "hi")).await.unwrap();
        assert_eq!(hi.status, MessageStatus::Delivered);

        let hey = ctx.service.send_message(text("bob", "alice", "hey")).await.unwrap();
        assert_eq!(hey.status, MessageStatus::Sent);

        let history = ctx.service.find_chat_messages("alice", "bob").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content.as_deref(), Some("hi"));
        assert_eq!(history[1].content.as_deref(), Some("hey"));

        // Alice reads Bob's messages
        ctx.service
            .mark_messages_read_and_return("bob", "alice")
            .await
            .unwrap();

        assert_eq!(
            ctx.service.count_unread_messages("alice", "bob").await.unwrap(),
            0
        );
    }
}
