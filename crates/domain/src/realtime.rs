use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};

use crate::chat::ParticipantRef;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Payload fanned out to live connections when a message is appended.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct NewMessageEvent {
    pub thread_id: String,
    pub message: MessageBroadcast,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MessageBroadcast {
    pub sender: ParticipantRef,
    pub content: String,
    pub sent_at_ms: i64,
}

/// Process-local fan-out index from thread id to live subscribers.
///
/// Holds no message history and survives nothing: every subscription is
/// re-established on reconnect, and the persisted store remains the
/// source of truth for anything a disconnected participant missed.
pub struct ChatRealtimeHub {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<NewMessageEvent>>>,
}

impl Default for ChatRealtimeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChatRealtimeHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub async fn subscribe(&self, thread_id: &str) -> broadcast::Receiver<NewMessageEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(thread_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Best-effort delivery to current subscribers of `thread_id`.
    /// Returns the number of receivers the event reached; a thread with
    /// no subscribers drops the event and its channel entry.
    pub async fn publish(&self, thread_id: &str, event: NewMessageEvent) -> usize {
        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(thread_id) {
                Some(sender) => sender.send(event).unwrap_or(0),
                None => return 0,
            }
        };
        if delivered == 0 {
            let mut channels = self.channels.write().await;
            if let Some(sender) = channels.get(thread_id) {
                if sender.receiver_count() == 0 {
                    channels.remove(thread_id);
                }
            }
        }
        delivered
    }

    pub async fn subscriber_count(&self, thread_id: &str) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(thread_id)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}

/// Join bookkeeping for a single live connection. A connection that
/// requests the same thread twice keeps exactly one subscription, so it
/// never sees duplicate deliveries. Dropping the connection drops its
/// receivers, which is all the unsubscribe the hub needs.
#[derive(Default)]
pub struct ThreadSubscriptions {
    joined: HashSet<String>,
}

impl ThreadSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a join; returns false when the connection was already
    /// subscribed to the thread.
    pub fn join(&mut self, thread_id: &str) -> bool {
        self.joined.insert(thread_id.to_string())
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.joined.contains(thread_id)
    }
}
