//! Courier Fanout Crate
//!
//! Topic-addressed event publication for the live-connection layer. The bus
//! decouples write paths from subscribers: `publish` enqueues onto an
//! unbounded channel and returns immediately, and a dedicated dispatch task
//! drains the queue into per-topic broadcast channels. Publishing to a topic
//! with no subscriber is not an error.

pub mod events;

pub use events::{Event, Topic};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

const SUBSCRIBER_BUFFER: usize = 256;

struct Envelope {
    topic: String,
    event: Event,
}

type TopicMap = Arc<RwLock<HashMap<String, broadcast::Sender<Event>>>>;

/// Handle to the fanout bus. Cheap to clone; all clones feed the same
/// dispatch task.
#[derive(Clone)]
pub struct EventBus {
    queue: mpsc::UnboundedSender<Envelope>,
    topics: TopicMap,
}

impl EventBus {
    /// Create the bus and spawn its dispatch task on the current runtime
    pub fn new() -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let topics: TopicMap = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(dispatch(rx, topics.clone()));

        Self { queue, topics }
    }

    /// Enqueue an event for a topic. Never blocks and never fails the
    /// caller; the write path must not depend on subscriber health.
    pub fn publish(&self, topic: Topic, event: Event) {
        let envelope = Envelope {
            topic: topic.key(),
            event,
        };

        if self.queue.send(envelope).is_err() {
            debug!(topic = %topic.key(), "event bus dispatch task gone, dropping event");
        }
    }

    /// Subscribe to a topic, creating its channel on first use
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        let key = topic.key();
        let mut topics = self.topics.write().expect("topic map poisoned");

        topics
            .entry(key)
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0)
            .subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<Envelope>, topics: TopicMap) {
    while let Some(envelope) = rx.recv().await {
        let sender = {
            let topics = topics.read().expect("topic map poisoned");
            topics.get(&envelope.topic).cloned()
        };

        match sender {
            Some(sender) => {
                // A send error only means every subscriber is gone
                if sender.send(envelope.event).is_err() {
                    debug!(topic = %envelope.topic, "no live subscribers, dropping event");
                }
            }
            None => {
                debug!(topic = %envelope.topic, "no subscribers registered, dropping event");
            }
        }
    }
}
