use crate::DomainResult;
use crate::chat::{ChatMessage, ChatThread};

/// Persistence boundary for chat threads.
///
/// Every method that mutates a thread is a single atomic operation on
/// the store: concurrent appends and opens against the same thread must
/// serialize, and two concurrent `create_pair_thread` calls for the
/// same unordered pair must converge on one thread. Implementations
/// over a document store get this from the store's per-document update;
/// the in-memory backend holds a write lock across the read-modify-write.
pub trait ChatRepository: Send + Sync {
    fn find_thread(
        &self,
        thread_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<ChatThread>>>;

    /// Threads containing `user_id`, most recently updated first.
    fn find_threads_by_participant(
        &self,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<ChatThread>>>;

    /// Looks up the one-to-one thread for the unordered pair `{a, b}`.
    fn find_pair_thread(
        &self,
        a: &str,
        b: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<ChatThread>>>;

    /// Creates a two-participant thread, unless one already exists for
    /// the same unordered pair, in which case the existing thread is
    /// returned. Atomic check-then-create keyed by the sorted pair.
    fn create_pair_thread(
        &self,
        thread: &ChatThread,
    ) -> crate::ports::BoxFuture<'_, DomainResult<ChatThread>>;

    /// Appends `message` and bumps `updated_at_ms`. The stored
    /// `sent_at_ms` is clamped so timestamps never decrease within a
    /// thread. Returns `None` when the thread does not exist.
    fn append_message(
        &self,
        thread_id: &str,
        message: &ChatMessage,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<ChatMessage>>>;

    /// Fetches the thread and, when `reader_id` is a participant, marks
    /// every unread message from other senders as read in the same
    /// operation. When the reader is not a participant the thread is
    /// returned untouched (the caller decides how to surface that).
    /// Returns `None` when the thread does not exist.
    fn open_thread(
        &self,
        thread_id: &str,
        reader_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<ChatThread>>>;
}
