use chrono::DateTime;
use chrono::Utc;
use swipe_protocol::ConversationEntry;

use crate::conversation::SharedLog;

/// Full value-copy of the conversation log, taken immediately before a
/// generation cycle begins and consulted only for cancellation/failure
/// recovery. Dropped on successful completion.
///
/// Handles are threaded through the cycle that owns them — there is no
/// process-wide "current backup" anywhere, so independent sessions (and a
/// future with overlapping cycles) need no redesign here.
pub struct SnapshotHandle {
    entries: Vec<ConversationEntry>,
    taken_at: DateTime<Utc>,
}

impl SnapshotHandle {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }
}

/// Deep value-copy of the current log contents. Purely local and
/// synchronous; runs before any mutation so an allocation failure aborts
/// the cycle with the log untouched.
pub fn capture(log: &SharedLog) -> SnapshotHandle {
    SnapshotHandle {
        entries: log.entries(),
        taken_at: Utc::now(),
    }
}

/// Replace the entire contents of `log` with the snapshot's copy.
///
/// Clear-then-repopulate, not a container swap: external holders of the
/// same handle must keep observing the same container.
pub fn restore(log: &SharedLog, handle: &SnapshotHandle) {
    log.with_mut(|entries| {
        entries.clear();
        entries.extend(handle.entries.iter().cloned());
    });
}
