use async_trait::async_trait;
use swipe_protocol::CycleId;
use swipe_protocol::EngineSignal;

use crate::conversation::SharedLog;

/// The external generation engine, as narrow as the host actually exposes
/// it. The engine is opaque: it cannot be parameterized beyond what the
/// log's tail contains, it mutates the shared log on its own schedule
/// while [`Engine::append_and_generate`] is awaited, and its internal
/// cleanup after a stop is untrusted — the orchestrator repairs log state
/// itself regardless of what the engine did.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Run one foreground, streaming generation against the current tail
    /// of `log`. On success exactly one new Agent-role entry has been
    /// appended at the tail. The engine may also touch the log through its
    /// own save hooks during the await.
    async fn append_and_generate(&self, log: &SharedLog) -> anyhow::Result<()>;

    /// Ask the in-flight generation to stop. Idempotent, fire-and-forget;
    /// safe to call when nothing is running.
    fn request_stop(&self);

    /// Subscribe to this engine's lifecycle signals. Taken out once per
    /// cycle, before the generate call starts, and dropped when the cycle
    /// resolves so no callback leaks across cycles.
    ///
    /// `cycle` tells the host adapter which cycle is about to run: halts
    /// that originate from this cycle's own foreground generation must be
    /// stamped with it, halts triggered by anything else carry `None` (or
    /// a foreign id) so the orchestrator knows not to trust its own view
    /// of the log's shape.
    fn subscribe(&self, cycle: CycleId) -> EngineSubscription;
}

/// Per-cycle subscription over the engine's lifecycle signals.
///
/// Cardinality: `Halted` 0..1 per cycle, `Trace` 0..n (last wins).
/// Dropping the subscription detaches the listener.
pub struct EngineSubscription {
    rx: async_channel::Receiver<EngineSignal>,
}

impl EngineSubscription {
    pub fn new(rx: async_channel::Receiver<EngineSignal>) -> Self {
        Self { rx }
    }

    /// Next signal, or `None` once the engine has dropped its sender side.
    pub async fn recv(&mut self) -> Option<EngineSignal> {
        self.rx.recv().await.ok()
    }

    /// Non-blocking drain of signals already buffered at resolution time.
    pub fn try_recv(&mut self) -> Option<EngineSignal> {
        self.rx.try_recv().ok()
    }
}
