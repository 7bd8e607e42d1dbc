use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use swipe_protocol::ConversationEntry;

/// Handle to the shared mutable conversation log.
///
/// The log is owned by the host; the orchestrator, the external engine and
/// the renderer all hold clones of this handle and therefore the same
/// underlying container. Every mutation the orchestrator performs keeps the
/// container identity intact — restores clear and repopulate in place,
/// they never swap the allocation out from under the other holders.
///
/// Access is closure-scoped so a guard can never be held across an await:
/// the engine is entitled to mutate the log while the orchestrator is
/// suspended, and every post-await read must re-fetch state by identity.
#[derive(Clone, Default)]
pub struct SharedLog {
    inner: Arc<Mutex<Vec<ConversationEntry>>>,
}

impl SharedLog {
    pub fn new(entries: Vec<ConversationEntry>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(entries)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&[ConversationEntry]) -> R) -> R {
        let guard = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<ConversationEntry>) -> R) -> R {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn len(&self) -> usize {
        self.with(<[ConversationEntry]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.with(<[ConversationEntry]>::is_empty)
    }

    /// Value-copy of the current contents.
    pub fn entries(&self) -> Vec<ConversationEntry> {
        self.with(<[ConversationEntry]>::to_vec)
    }
}
