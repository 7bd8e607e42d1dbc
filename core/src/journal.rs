use async_trait::async_trait;

use crate::conversation::SharedLog;

/// The external persistence layer. Opaque, and adversarial from the
/// orchestrator's point of view: a save may race its own debounced
/// auto-save and corrupt the log's contents as a side effect. Callers on
/// the cycle-resolution path never invoke this directly — they go through
/// the guarded save sequence, which compares and restores around each
/// call.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn persist(&self, log: &SharedLog) -> anyhow::Result<()>;
}

/// Persistence for hosts that have none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJournal;

#[async_trait]
impl Journal for NoopJournal {
    async fn persist(&self, _log: &SharedLog) -> anyhow::Result<()> {
        Ok(())
    }
}
