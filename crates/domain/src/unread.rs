use std::sync::Arc;

use crate::DomainResult;
use crate::ports::chat::ChatRepository;

/// Derives the badge count shown on every page view: messages across
/// the user's threads that are unread and were sent by someone else.
/// Reads the store, never writes it. A blank user id (anonymous
/// caller) counts as zero rather than an error.
#[derive(Clone)]
pub struct UnreadTracker {
    repository: Arc<dyn ChatRepository>,
}

impl UnreadTracker {
    pub fn new(repository: Arc<dyn ChatRepository>) -> Self {
        Self { repository }
    }

    pub async fn count_unread(&self, user_id: &str) -> DomainResult<u64> {
        if user_id.trim().is_empty() {
            return Ok(0);
        }
        let threads = self.repository.find_threads_by_participant(user_id).await?;
        Ok(threads
            .iter()
            .map(|thread| thread.unread_for(user_id))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ChatThread};
    use crate::testing::MemoryChatRepository;

    fn message(sender: &str, read: bool) -> ChatMessage {
        ChatMessage {
            sender_id: sender.to_string(),
            content: "x".to_string(),
            read,
            sent_at_ms: 1_000,
        }
    }

    async fn seeded_repo() -> Arc<MemoryChatRepository> {
        let repo = Arc::new(MemoryChatRepository::default());
        let thread = ChatThread {
            thread_id: "t-1".to_string(),
            participants: vec!["alice".to_string(), "bob".to_string()],
            messages: Vec::new(),
            created_at_ms: 0,
            updated_at_ms: 0,
        };
        repo.create_pair_thread(&thread).await.expect("thread");
        repo.append_message("t-1", &message("alice", false))
            .await
            .expect("append");
        repo.append_message("t-1", &message("alice", false))
            .await
            .expect("append");
        repo.append_message("t-1", &message("bob", false))
            .await
            .expect("append");
        repo
    }

    #[tokio::test]
    async fn counts_only_unread_from_other_senders() {
        let repo = seeded_repo().await;
        let tracker = UnreadTracker::new(repo);
        assert_eq!(tracker.count_unread("bob").await.expect("count"), 2);
        assert_eq!(tracker.count_unread("alice").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn unknown_and_anonymous_users_count_zero() {
        let repo = seeded_repo().await;
        let tracker = UnreadTracker::new(repo);
        assert_eq!(tracker.count_unread("stranger").await.expect("count"), 0);
        assert_eq!(tracker.count_unread("").await.expect("count"), 0);
        assert_eq!(tracker.count_unread("   ").await.expect("count"), 0);
    }
}
