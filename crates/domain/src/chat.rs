use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::chat::ChatRepository;
use crate::ports::users::UserDirectory;
use crate::realtime::{ChatRealtimeHub, MessageBroadcast, NewMessageEvent};
use crate::util::now_ms;

const MAX_CONTENT_LENGTH: usize = 2_000;

/// A persisted conversation between a fixed set of participants.
///
/// Two-participant threads are unique per unordered pair; the store
/// enforces that under concurrent creation. Threads are never deleted,
/// only appended to and read-flipped.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatThread {
    pub thread_id: String,
    pub participants: Vec<String>,
    pub messages: Vec<ChatMessage>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl ChatThread {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|id| id == user_id)
    }

    /// Messages awaiting `user_id`'s acknowledgment: unread and sent by
    /// someone else.
    pub fn unread_for(&self, user_id: &str) -> u64 {
        self.messages
            .iter()
            .filter(|message| !message.read && message.sender_id != user_id)
            .count() as u64
    }
}

/// Owned exclusively by its parent thread. `read` only ever flips
/// false to true, and only when a non-sender opens the thread.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_id: String,
    pub content: String,
    pub read: bool,
    pub sent_at_ms: i64,
}

/// Weak reference to a user resolved for rendering only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantRef {
    pub user_id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MessageView {
    pub sender: ParticipantRef,
    pub content: String,
    pub read: bool,
    pub sent_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub participants: Vec<ParticipantRef>,
    pub last_message: Option<MessageView>,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ThreadView {
    pub thread_id: String,
    pub participants: Vec<ParticipantRef>,
    pub messages: Vec<MessageView>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Orchestrates thread lookup/creation, message append, read-state
/// transitions and fan-out. The only component that mutates the thread
/// store; the realtime hub is notified after a successful append and a
/// failed publish never fails the operation that triggered it.
#[derive(Clone)]
pub struct ChatService {
    repository: Arc<dyn ChatRepository>,
    users: Arc<dyn UserDirectory>,
    realtime: Arc<ChatRealtimeHub>,
}

impl ChatService {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        users: Arc<dyn UserDirectory>,
        realtime: Arc<ChatRealtimeHub>,
    ) -> Self {
        Self {
            repository,
            users,
            realtime,
        }
    }

    pub async fn list_threads(&self, actor: &ActorIdentity) -> DomainResult<Vec<ThreadSummary>> {
        let threads = self
            .repository
            .find_threads_by_participant(&actor.user_id)
            .await?;

        let mut summaries = Vec::with_capacity(threads.len());
        for thread in threads {
            let participants = self.participant_refs(&thread).await?;
            let last_message = match thread.messages.last() {
                Some(message) => Some(self.message_view(&participants, message)),
                None => None,
            };
            summaries.push(ThreadSummary {
                thread_id: thread.thread_id,
                participants,
                last_message,
                updated_at_ms: thread.updated_at_ms,
            });
        }
        Ok(summaries)
    }

    /// Fetches a thread and marks every unread message from other
    /// senders as read, atomically with the fetch. A missing thread and
    /// a thread the actor does not belong to fail identically.
    pub async fn open_thread(
        &self,
        actor: &ActorIdentity,
        thread_id: &str,
    ) -> DomainResult<ThreadView> {
        let thread = self
            .repository
            .open_thread(thread_id, &actor.user_id)
            .await?
            .ok_or(DomainError::AccessDenied)?;
        if !thread.has_participant(&actor.user_id) {
            return Err(DomainError::AccessDenied);
        }

        let participants = self.participant_refs(&thread).await?;
        let messages = thread
            .messages
            .iter()
            .map(|message| self.message_view(&participants, message))
            .collect();
        Ok(ThreadView {
            thread_id: thread.thread_id,
            participants,
            messages,
            created_at_ms: thread.created_at_ms,
            updated_at_ms: thread.updated_at_ms,
        })
    }

    pub async fn send_message(
        &self,
        actor: &ActorIdentity,
        thread_id: &str,
        content: &str,
    ) -> DomainResult<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::InvalidInput(
                "message content is required".into(),
            ));
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(DomainError::InvalidInput(format!(
                "message content exceeds max length of {MAX_CONTENT_LENGTH}"
            )));
        }

        let thread = self
            .repository
            .find_thread(thread_id)
            .await?
            .ok_or(DomainError::AccessDenied)?;
        if !thread.has_participant(&actor.user_id) {
            return Err(DomainError::AccessDenied);
        }

        let message = ChatMessage {
            sender_id: actor.user_id.clone(),
            content: content.to_string(),
            read: false,
            sent_at_ms: now_ms(),
        };
        let message = self
            .repository
            .append_message(thread_id, &message)
            .await?
            .ok_or(DomainError::AccessDenied)?;

        let sender = self.participant_ref(&actor.user_id).await?;
        self.realtime
            .publish(
                thread_id,
                NewMessageEvent {
                    thread_id: thread_id.to_string(),
                    message: MessageBroadcast {
                        sender,
                        content: message.content.clone(),
                        sent_at_ms: message.sent_at_ms,
                    },
                },
            )
            .await;

        Ok(message)
    }

    /// Returns the existing one-to-one thread for the pair, creating an
    /// empty one on first contact. Safe under concurrent calls for the
    /// same pair: the store resolves the race to a single thread.
    pub async fn start_or_get_thread(
        &self,
        actor: &ActorIdentity,
        other_user_id: &str,
    ) -> DomainResult<ChatThread> {
        let other_user_id = other_user_id.trim();
        if other_user_id.is_empty() {
            return Err(DomainError::InvalidInput("user id is required".into()));
        }
        if other_user_id == actor.user_id {
            return Err(DomainError::InvalidInput(
                "cannot start a chat with yourself".into(),
            ));
        }

        if let Some(existing) = self
            .repository
            .find_pair_thread(&actor.user_id, other_user_id)
            .await?
        {
            return Ok(existing);
        }

        let now = now_ms();
        let thread = ChatThread {
            thread_id: crate::util::uuid_v7_without_dashes(),
            participants: vec![actor.user_id.clone(), other_user_id.to_string()],
            messages: Vec::new(),
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.repository.create_pair_thread(&thread).await
    }

    /// Membership check with no read-state side effect, for callers
    /// (live subscriptions) that must not mark anything read.
    pub async fn assert_participant(
        &self,
        actor: &ActorIdentity,
        thread_id: &str,
    ) -> DomainResult<()> {
        let thread = self
            .repository
            .find_thread(thread_id)
            .await?
            .ok_or(DomainError::AccessDenied)?;
        if !thread.has_participant(&actor.user_id) {
            return Err(DomainError::AccessDenied);
        }
        Ok(())
    }

    async fn participant_refs(&self, thread: &ChatThread) -> DomainResult<Vec<ParticipantRef>> {
        let mut refs = Vec::with_capacity(thread.participants.len());
        for user_id in &thread.participants {
            refs.push(self.participant_ref(user_id).await?);
        }
        Ok(refs)
    }

    async fn participant_ref(&self, user_id: &str) -> DomainResult<ParticipantRef> {
        let name = self
            .users
            .find_user(user_id)
            .await?
            .map(|profile| profile.name)
            .unwrap_or_else(|| user_id.to_string());
        Ok(ParticipantRef {
            user_id: user_id.to_string(),
            name,
        })
    }

    fn message_view(&self, participants: &[ParticipantRef], message: &ChatMessage) -> MessageView {
        let sender = participants
            .iter()
            .find(|participant| participant.user_id == message.sender_id)
            .cloned()
            .unwrap_or_else(|| ParticipantRef {
                user_id: message.sender_id.clone(),
                name: message.sender_id.clone(),
            });
        MessageView {
            sender,
            content: message.content.clone(),
            read: message.read,
            sent_at_ms: message.sent_at_ms,
        }
    }
}
