//! In-memory port implementations backing the domain test suites.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::DomainResult;
use crate::chat::{ChatMessage, ChatThread};
use crate::identity::UserProfile;
use crate::ports::BoxFuture;
use crate::ports::chat::ChatRepository;
use crate::ports::users::UserDirectory;

#[derive(Default)]
pub(crate) struct MemoryChatRepository {
    threads: Arc<RwLock<HashMap<String, ChatThread>>>,
    pair_index: Arc<RwLock<HashMap<(String, String), String>>>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl ChatRepository for MemoryChatRepository {
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
        let key = pair_key(a, b);
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
            // pair lock held across check and insert: the losing racer
            // sees the winner's thread instead of creating a second one
            let mut pair_index = pair_index.write().await;
            if thread.participants.len() == 2 {
                let key = pair_key(&thread.participants[0], &thread.participants[1]);
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

pub(crate) struct MemoryUserDirectory {
    users: HashMap<String, UserProfile>,
}

impl MemoryUserDirectory {
    pub(crate) fn with_names(entries: &[(&str, &str)]) -> Self {
        let users = entries
            .iter()
            .map(|(user_id, name)| ((*user_id).to_string(), UserProfile::named(*user_id, *name)))
            .collect();
        Self { users }
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn find_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
        let user = self.users.get(user_id).cloned();
        Box::pin(async move { Ok(user) })
    }
}
