use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use flatmate_domain::DomainResult;
use flatmate_domain::chat::{ChatMessage, ChatThread};
use flatmate_domain::identity::UserProfile;
use flatmate_domain::ports::BoxFuture;
use flatmate_domain::ports::chat::ChatRepository;
use flatmate_domain::ports::users::UserDirectory;

/// Thread store for the `memory` data backend. Thread documents are
/// keyed by id; the pair index maps the sorted participant pair of a
/// one-to-one thread to its id so create-if-absent stays race-free.
#[derive(Default)]
pub struct InMemoryChatRepository {
    threads: Arc<RwLock<HashMap<String, ChatThread>>>,
    pair_index: Arc<RwLock<HashMap<(String, String), String>>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }
}

impl ChatRepository for InMemoryChatRepository {
    fn find_thread(&self, thread_id: &str) -> BoxFuture<'_, DomainResult<Option<ChatThread>>> {
        let thread_id = thread_id.to_string();
        let threads = self.threads.clone();
        Box::pin(async move {
            let threads = threads.read().await;
            Ok(threads.get(&thread_id).cloned())
        })
    }

    fn find_threads_by_participant(
        &self,
        user_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<ChatThread>>> {
        let user_id = user_id.to_string();
        let threads = self.threads.clone();
        Box::pin(async move {
            let mut output: Vec<_> = threads
                .read()
                .await
                .values()
                .filter(|thread| thread.has_participant(&user_id))
                .cloned()
                .collect();
            output.sort_by(|a, b| {
                b.updated_at_ms
                    .cmp(&a.updated_at_ms)
                    .then_with(|| a.thread_id.cmp(&b.thread_id))
            });
            Ok(output)
        })
    }

    fn find_pair_thread(
        &self,
        a: &str,
        b: &str,
    ) -> BoxFuture<'_, DomainResult<Option<ChatThread>>> {
        let key = Self::pair_key(a, b);
        let pair_index = self.pair_index.clone();
        let threads = self.threads.clone();
        Box::pin(async move {
            let Some(thread_id) = pair_index.read().await.get(&key).cloned() else {
                return Ok(None);
            };
            let threads = threads.read().await;
            Ok(threads.get(&thread_id).cloned())
        })
    }

    fn create_pair_thread(
        &self,
        thread: &ChatThread,
    ) -> BoxFuture<'_, DomainResult<ChatThread>> {
        let thread = thread.clone();
        let pair_index = self.pair_index.clone();
        let threads = self.threads.clone();
        Box::pin(async move {
            // the index write lock spans the check and the insert, so a
            // losing racer is handed the winner's thread
            let mut pair_index = pair_index.write().await;
            if thread.participants.len() == 2 {
                let key = Self::pair_key(&thread.participants[0], &thread.participants[1]);
                if let Some(existing_id) = pair_index.get(&key) {
                    let threads = threads.read().await;
                    if let Some(existing) = threads.get(existing_id) {
                        return Ok(existing.clone());
                    }
                }
                pair_index.insert(key, thread.thread_id.clone());
            }
            let mut threads = threads.write().await;
            threads.insert(thread.thread_id.clone(), thread.clone());
            Ok(thread)
        })
    }

    fn append_message(
        &self,
        thread_id: &str,
        message: &ChatMessage,
    ) -> BoxFuture<'_, DomainResult<Option<ChatMessage>>> {
        let thread_id = thread_id.to_string();
        let message = message.clone();
        let threads = self.threads.clone();
        Box::pin(async move {
            let mut threads = threads.write().await;
            let Some(thread) = threads.get_mut(&thread_id) else {
                return Ok(None);
            };
            let mut message = message;
            if let Some(last) = thread.messages.last() {
                // timestamps never run backwards within a thread
                message.sent_at_ms = message.sent_at_ms.max(last.sent_at_ms);
            }
            thread.updated_at_ms = thread.updated_at_ms.max(message.sent_at_ms);
            thread.messages.push(message.clone());
            Ok(Some(message))
        })
    }

    fn open_thread(
        &self,
        thread_id: &str,
        reader_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<ChatThread>>> {
        let thread_id = thread_id.to_string();
        let reader_id = reader_id.to_string();
        let threads = self.threads.clone();
        Box::pin(async move {
            let mut threads = threads.write().await;
            let Some(thread) = threads.get_mut(&thread_id) else {
                return Ok(None);
            };
            if thread.has_participant(&reader_id) {
                for message in &mut thread.messages {
                    if message.sender_id != reader_id {
                        message.read = true;
                    }
                }
            }
            Ok(Some(thread.clone()))
        })
    }
}

/// User profiles owned by the identity provider. Chat code only reads
/// from this; `upsert` exists for seeding and tests.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, profile: UserProfile) {
        let mut users = self.users.write().await;
        users.insert(profile.user_id.clone(), profile);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
        let user_id = user_id.to_string();
        let users = self.users.clone();
        Box::pin(async move {
            let users = users.read().await;
            Ok(users.get(&user_id).cloned())
        })
    }
}
