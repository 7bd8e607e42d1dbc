#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use swipe_core::Engine;
use swipe_core::EngineSubscription;
use swipe_core::Journal;
use swipe_core::RenderHints;
use swipe_core::SharedLog;
use swipe_core::ViewSink;
use swipe_protocol::ConversationEntry;
use swipe_protocol::CycleId;
use swipe_protocol::EngineSignal;
use swipe_protocol::Event;
use swipe_protocol::EventMsg;
use swipe_protocol::HaltedSignal;
use swipe_protocol::SpeakerRole;
use swipe_protocol::TraceSegment;
use tokio::time::timeout;

/// What the stub engine does when its generate call runs.
#[derive(Clone)]
pub enum EngineScript {
    /// Append one Agent entry with this text and complete.
    Reply(String),
    /// Emit these trace segments, then reply.
    TraceThenReply(Vec<String>, String),
    /// Sleep briefly (so another request can race in), then reply.
    DelayedReply(String),
    /// Complete without appending anything.
    Silent,
    /// Append an Agent entry with whitespace-only content.
    BlankReply,
    /// Fail the generate call outright.
    Fail(String),
    /// Mutate the log mid-flight (partial append plus an in-place edit,
    /// the way an untrusted save hook would), fire the halted signal
    /// stamped with the running cycle, and never complete.
    MutateThenHaltOwned,
    /// Fire an unattributed halted signal and never complete.
    HaltForeign,
    /// Never complete on its own; fires an owned halted signal when a
    /// stop is requested.
    PendUntilStopped,
}

/// Scriptable external engine. Records the log shape it was handed at each
/// generate call so tests can assert what the engine actually saw.
pub struct StubEngine {
    script: Mutex<EngineScript>,
    signal_tx: Mutex<Option<async_channel::Sender<EngineSignal>>>,
    current_cycle: Mutex<Option<CycleId>>,
    pub seen_logs: Mutex<Vec<Vec<(SpeakerRole, String, bool)>>>,
    pub stop_requests: AtomicUsize,
}

impl StubEngine {
    pub fn new(script: EngineScript) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            signal_tx: Mutex::new(None),
            current_cycle: Mutex::new(None),
            seen_logs: Mutex::new(Vec::new()),
            stop_requests: AtomicUsize::new(0),
        })
    }

    pub fn set_script(&self, script: EngineScript) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = script;
    }

    /// The (role, content, is_scaffold) triples of the log as handed to
    /// the `call`-th generate invocation.
    pub fn seen_log(&self, call: usize) -> Vec<(SpeakerRole, String, bool)> {
        self.seen_logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)[call]
            .clone()
    }

    async fn send_signal(&self, signal: EngineSignal) {
        let tx = self
            .signal_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(tx) = tx {
            tx.send(signal).await.ok();
        }
    }
}

#[async_trait]
impl Engine for StubEngine {
    async fn append_and_generate(&self, log: &SharedLog) -> anyhow::Result<()> {
        let seen = log.with(|entries| {
            entries
                .iter()
                .map(|e| (e.role, e.content.clone(), e.is_scaffold()))
                .collect::<Vec<_>>()
        });
        self.seen_logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(seen);

        let script = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match script {
            EngineScript::Reply(text) => {
                log.with_mut(|entries| entries.push(ConversationEntry::agent(text)));
                Ok(())
            }
            EngineScript::TraceThenReply(segments, text) => {
                for segment in segments {
                    self.send_signal(EngineSignal::Trace(TraceSegment { text: segment }))
                        .await;
                }
                // Give the driver a poll gap so the signals are observed
                // as signals, not just drained afterwards.
                tokio::task::yield_now().await;
                log.with_mut(|entries| entries.push(ConversationEntry::agent(text)));
                Ok(())
            }
            EngineScript::DelayedReply(text) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                log.with_mut(|entries| entries.push(ConversationEntry::agent(text)));
                Ok(())
            }
            EngineScript::Silent => Ok(()),
            EngineScript::BlankReply => {
                log.with_mut(|entries| entries.push(ConversationEntry::agent("   ")));
                Ok(())
            }
            EngineScript::Fail(message) => Err(anyhow::anyhow!(message)),
            EngineScript::MutateThenHaltOwned => {
                // Untrusted mid-flight mutation: a partial tail append and
                // an in-place edit of an earlier entry.
                log.with_mut(|entries| {
                    if let Some(first) = entries.first_mut() {
                        first.content = "auto-save mangled this".to_string();
                    }
                    entries.push(ConversationEntry::agent("partial out"));
                });
                let cycle = *self
                    .current_cycle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                self.send_signal(EngineSignal::Halted(HaltedSignal { cycle }))
                    .await;
                futures::future::pending::<()>().await;
                unreachable!("pending generate resolved");
            }
            EngineScript::HaltForeign => {
                self.send_signal(EngineSignal::Halted(HaltedSignal { cycle: None }))
                    .await;
                futures::future::pending::<()>().await;
                unreachable!("pending generate resolved");
            }
            EngineScript::PendUntilStopped => {
                futures::future::pending::<()>().await;
                unreachable!("pending generate resolved");
            }
        }
    }

    fn request_stop(&self) {
        self.stop_requests.fetch_add(1, Ordering::SeqCst);
        let script = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if matches!(script, EngineScript::PendUntilStopped) {
            let cycle = *self
                .current_cycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let tx = self
                .signal_tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(tx) = tx {
                tx.try_send(EngineSignal::Halted(HaltedSignal { cycle })).ok();
            }
        }
    }

    fn subscribe(&self, cycle: CycleId) -> EngineSubscription {
        let (tx, rx) = async_channel::unbounded();
        *self
            .signal_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        *self
            .current_cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(cycle);
        EngineSubscription::new(rx)
    }
}

/// Renderer that records every call it receives.
#[derive(Default)]
pub struct RecordingView {
    pub ops: Mutex<Vec<String>>,
}

impl RecordingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count_of(&self, prefix: &str) -> usize {
        self.ops()
            .iter()
            .filter(|op| op.starts_with(prefix))
            .count()
    }

    fn record(&self, op: String) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

impl ViewSink for RecordingView {
    fn rebuild_view(&self, log: &SharedLog) {
        self.record(format!("rebuild:{}", log.len()));
    }

    fn render_one(&self, index: usize, _entry: &ConversationEntry, hints: RenderHints) {
        self.record(format!("render:{index}:swipe={}", hints.swipe_update));
    }

    fn mark_inert(&self, index: usize) {
        self.record(format!("mark_inert:{index}"));
    }

    fn clear_inert(&self, index: usize) {
        self.record(format!("clear_inert:{index}"));
    }
}

/// Journal that just counts saves.
#[derive(Default)]
pub struct CountingJournal {
    pub saves: AtomicUsize,
}

impl CountingJournal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Journal for CountingJournal {
    async fn persist(&self, _log: &SharedLog) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Journal that corrupts one entry's content as a side effect of every
/// save, the way a racing debounced auto-save would.
pub struct CorruptingJournal {
    pub target: usize,
    pub saves: AtomicUsize,
}

impl CorruptingJournal {
    pub fn new(target: usize) -> Arc<Self> {
        Arc::new(Self {
            target,
            saves: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Journal for CorruptingJournal {
    async fn persist(&self, log: &SharedLog) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let target = self.target;
        log.with_mut(|entries| {
            if let Some(entry) = entries.get_mut(target) {
                entry.content = "stale auto-save".to_string();
            }
        });
        Ok(())
    }
}

/// Waits for the next event matching `predicate`, timing out to surface
/// hung cycles quickly during tests.
pub async fn wait_for_event<F>(rx: &async_channel::Receiver<Event>, mut predicate: F) -> EventMsg
where
    F: FnMut(&EventMsg) -> bool,
{
    loop {
        let event = match timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => panic!("event stream ended unexpectedly: {err}"),
            Err(err) => panic!("timeout waiting for event: {err}"),
        };
        if predicate(&event.msg) {
            return event.msg;
        }
    }
}

/// Drain everything currently buffered on the event channel.
pub fn drain_events(rx: &async_channel::Receiver<Event>) -> Vec<EventMsg> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event.msg);
    }
    out
}
