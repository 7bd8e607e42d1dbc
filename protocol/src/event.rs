use serde::Deserialize;
use serde::Serialize;

use crate::models::CycleId;

/// Signals an external generation engine emits while a cycle is in flight.
///
/// Cardinality per cycle: `Halted` fires zero or one time, asynchronously
/// and independently of the awaited generation future; `Trace` fires zero
/// or more times and only the last value is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineSignal {
    Halted(HaltedSignal),
    Trace(TraceSegment),
}

/// The engine stopped generating before its main future resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltedSignal {
    /// Which cycle the stop belongs to. `None` (or a foreign id) means
    /// ownership cannot be confirmed — some other feature triggered the
    /// stop — and only conservative cleanup is safe.
    pub cycle: Option<CycleId>,
}

/// One completed reasoning/trace segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSegment {
    pub text: String,
}

/// Event emitted by the orchestrator towards its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Cycle the event belongs to.
    pub cycle: CycleId,
    pub msg: EventMsg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventMsg {
    CycleStarted(CycleStartedEvent),
    SwipeCommitted(SwipeCommittedEvent),
    CycleAborted(CycleAbortedEvent),
    /// User-visible informational notice (cancellation included). Not an
    /// error dialog.
    Notice(NoticeEvent),
    /// The guarded save found the persistence layer corrupted the log and
    /// restored it from the pre-write copy.
    CorruptionRepaired(CorruptionRepairedEvent),
    /// State may be inconsistent (ambiguous external stop); the user
    /// should be advised to refresh.
    StateWarning(StateWarningEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStartedEvent {
    pub target_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeCommittedEvent {
    pub target_index: usize,
    /// Index of the committed alternative within the target entry.
    pub alternative: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleAbortedEvent {
    pub reason: AbortReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The caller asked the cycle to stop.
    UserStop,
    /// The engine's own halted signal fired.
    EngineHalted,
    /// An awaited step failed; recovery ran before the error surfaced.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeEvent {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionRepairedEvent {
    /// Which guarded save pass caught the mismatch (zero-based).
    pub pass: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateWarningEvent {
    pub message: String,
}
