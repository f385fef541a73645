//! Event and topic types for real-time fanout.

use courier_database::{ChatMessage, Presence};
use serde::{Deserialize, Serialize};

/// Address for a published event. The presence topic is global; message
/// topics are per recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Presence,
    Messages(String),
}

impl Topic {
    /// Get the unique key for this topic
    pub fn key(&self) -> String {
        match self {
            Topic::Presence => "presence".to_string(),
            Topic::Messages(user_id) => format!("messages:{user_id}"),
        }
    }

    /// Topic carrying messages addressed to a user
    pub fn messages_for(user_id: impl Into<String>) -> Self {
        Topic::Messages(user_id.into())
    }
}

/// Events published by the presence and messaging services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A user's presence changed
    PresenceChanged {
        user_id: String,
        presence: Presence,
        last_seen_at: String,
    },

    /// A message was stored
    MessageCreated { message: ChatMessage },

    /// A stored message reached the recipient's device
    MessageDelivered { message: ChatMessage },

    /// The recipient opened a batch of messages
    MessagesRead { messages: Vec<ChatMessage> },
}

impl Event {
    /// Get event type name for logging
    pub fn event_type_name(&self) -> &'static str {
        match self {
            Event::PresenceChanged { .. } => "presence_changed",
            Event::MessageCreated { .. } => "message_created",
            Event::MessageDelivered { .. } => "message_delivered",
            Event::MessagesRead { .. } => "messages_read",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_keys() {
        assert_eq!(Topic::Presence.key(), "presence");
        assert_eq!(Topic::messages_for("bob").key(), "messages:bob");
        assert_ne!(Topic::messages_for("bob"), Topic::messages_for("alice"));
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = Event::PresenceChanged {
            user_id: "alice".to_string(),
            presence: Presence::Online,
            last_seen_at: "2026-01-01T00:00:00+00:00".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PresenceChanged");
        assert_eq!(json["data"]["user_id"], "alice");
        assert_eq!(json["data"]["presence"], "online");
    }
}
