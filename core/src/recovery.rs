use std::ops::Range;

use swipe_protocol::AbortReason;
use swipe_protocol::ConversationEntry;
use swipe_protocol::CorruptionRepairedEvent;
use swipe_protocol::CycleAbortedEvent;
use swipe_protocol::CycleId;
use swipe_protocol::EntryId;
use swipe_protocol::Event;
use swipe_protocol::EventMsg;
use swipe_protocol::NoticeEvent;
use swipe_protocol::SpeakerRole;
use swipe_protocol::StateWarningEvent;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::conversation::SharedLog;
use crate::engine::Engine;
use crate::journal::Journal;
use crate::ledger;
use crate::ledger::DisplaySnapshot;
use crate::snapshot;
use crate::snapshot::SnapshotHandle;
use crate::truncation;
use crate::truncation::HiddenTail;
use crate::view::ViewSink;

/// Lifecycle of one swipe cycle. `Running` while the engine drive is
/// awaited; the three intermediate states converge on `Resolved` through
/// exactly one pass of the cleanup or commit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleState {
    Running,
    Completing,
    Cancelling,
    Failing,
    Resolved,
}

/// Ephemeral state for one swipe operation. Created when the swipe is
/// requested, destroyed when the cycle resolves.
pub(crate) struct GenerationCycle {
    pub id: CycleId,
    pub target_index: usize,
    pub target_id: EntryId,
    pub role: SpeakerRole,
    /// Pre-cycle copy of the whole log; the single source of truth for
    /// what the log should look like after an abort.
    pub snapshot: Option<SnapshotHandle>,
    pub pre_display: DisplaySnapshot,
    pub reserved_alt: usize,
    /// Renderer-space indices tagged inert for the cycle's duration.
    pub stale: Range<usize>,
    pub state: CycleState,
    /// The in-flight engine call belongs to this cycle. Set for the span
    /// of the drive await; a halted signal can only be attributed while
    /// it is up and its cycle id matches.
    pub engine_owns_cycle: bool,
    pub cleanup_performed: bool,
}

/// Everything the recovery routine touches, borrowed from the session.
pub(crate) struct RecoveryCtx<'a> {
    pub log: &'a SharedLog,
    pub engine: &'a dyn Engine,
    pub view: &'a dyn ViewSink,
    pub journal: &'a dyn Journal,
    pub tx_event: &'a async_channel::Sender<Event>,
    pub save_passes: usize,
}

/// Revert everything a cancelled or failed cycle did to the shared log.
///
/// Idempotent: the `cleanup_performed` guard makes repeated invocations —
/// an explicit stop racing the engine's own halted event — no-ops after
/// the first. Tolerates a cycle that never progressed past scaffold
/// insertion: the snapshot restore simply has less to erase.
///
/// Returns how many corruption repairs the guarded save sequence made.
pub(crate) async fn cleanup_after_abort(
    ctx: &RecoveryCtx<'_>,
    cycle: &mut GenerationCycle,
    reason: AbortReason,
) -> usize {
    if cycle.cleanup_performed {
        debug!(cycle = %cycle.id, "cleanup already performed, ignoring repeat signal");
        return 0;
    }
    debug!(
        cycle = %cycle.id,
        target_index = cycle.target_index,
        role = ?cycle.role,
        state = ?cycle.state,
        ?reason,
        "aborting generation cycle"
    );
    cycle.cleanup_performed = true;
    cycle.state = match reason {
        AbortReason::Error => CycleState::Failing,
        AbortReason::UserStop | AbortReason::EngineHalted => CycleState::Cancelling,
    };

    // Listener detachment happened when the drive returned and dropped
    // its engine subscription; from here on no signal can reach the cycle.

    // The engine may still be running its own teardown. Ask it to stop
    // (idempotent) but do not wait for it: its internal cleanup is
    // untrusted, and the log is repaired here regardless.
    ctx.engine.request_stop();

    // Full replace from the pre-cycle snapshot rather than reversing each
    // mutation step individually.
    if let Some(handle) = cycle.snapshot.as_ref() {
        debug!(
            cycle = %cycle.id,
            entries = handle.len(),
            taken_at = %handle.taken_at(),
            "restoring pre-cycle snapshot"
        );
        snapshot::restore(ctx.log, handle);
    } else {
        warn!(cycle = %cycle.id, "no snapshot to restore; cycle aborted before capture");
    }

    for index in cycle.stale.clone() {
        ctx.view.clear_inert(index);
    }

    // The log was wholesale-replaced; incremental patching of the view
    // cannot be trusted after that.
    ctx.view.rebuild_view(ctx.log);

    let repairs = guarded_persist(
        ctx.journal,
        ctx.log,
        ctx.save_passes,
        ctx.tx_event,
        cycle.id,
    )
    .await;

    cycle.snapshot = None;
    cycle.state = CycleState::Resolved;

    ctx.tx_event
        .send(Event {
            cycle: cycle.id,
            msg: EventMsg::CycleAborted(CycleAbortedEvent { reason }),
        })
        .await
        .ok();
    ctx.tx_event
        .send(Event {
            cycle: cycle.id,
            msg: EventMsg::Notice(NoticeEvent {
                message: "Generation stopped. The conversation was restored.".to_string(),
            }),
        })
        .await
        .ok();

    repairs
}

/// Conservative cleanup for a stop whose ownership could not be
/// confirmed. An unrelated stop does not imply this cycle's truncation is
/// still in its expected shape, so the snapshot is deliberately not
/// force-replayed. Only the orchestrator's own mutations are unwound —
/// scaffold out, hidden tail back, reserved placeholder dropped — and the
/// user is warned that whatever the engine did in the meantime stays.
pub(crate) async fn cleanup_after_ambiguous_stop(
    ctx: &RecoveryCtx<'_>,
    cycle: &mut GenerationCycle,
    hidden: HiddenTail,
) {
    if cycle.cleanup_performed {
        return;
    }
    cycle.cleanup_performed = true;
    cycle.state = CycleState::Cancelling;

    ctx.log
        .with_mut(|entries| entries.retain(|entry| !entry.is_scaffold()));
    truncation::restore_tail(ctx.log, hidden);
    ctx.log.with_mut(|entries| {
        if let Some(entry) = entries.iter_mut().find(|e| e.id == cycle.target_id) {
            ledger::discard_alternative(entry, cycle.reserved_alt);
        }
    });

    for index in cycle.stale.clone() {
        ctx.view.clear_inert(index);
    }

    cycle.snapshot = None;
    cycle.state = CycleState::Resolved;

    ctx.tx_event
        .send(Event {
            cycle: cycle.id,
            msg: EventMsg::StateWarning(StateWarningEvent {
                message: "Generation was stopped by another feature; the conversation may be \
                          inconsistent. Consider reloading it."
                    .to_string(),
            }),
        })
        .await
        .ok();
}

/// Persist with the external layer, then defensively re-check its work.
///
/// Per pass: capture a pre-write copy, call the external save, compare the
/// post-save contents entry-by-entry; on any mismatch restore from the
/// copy immediately. At least two passes are run — the external layer is
/// known to race its own debounced auto-save, and a second guarded save
/// overwrites a stale write that slipped in after the first.
///
/// Returns the number of corruption repairs made. A persist error is
/// logged and skips the compare for that pass; the in-memory log is
/// already correct and a later pass may still succeed.
pub(crate) async fn guarded_persist(
    journal: &dyn Journal,
    log: &SharedLog,
    passes: usize,
    tx_event: &async_channel::Sender<Event>,
    cycle_id: CycleId,
) -> usize {
    let mut repairs = 0;
    for pass in 0..passes.max(2) {
        let pre_write = snapshot::capture(log);
        if let Err(err) = journal.persist(log).await {
            warn!(cycle = %cycle_id, pass, "guarded save failed: {err:#}");
            continue;
        }
        let corrupted = log.with(|entries| contents_differ(entries, pre_write.entries()));
        if corrupted {
            error!(
                cycle = %cycle_id,
                pass,
                "persistence corrupted the log during save; restoring pre-write copy"
            );
            snapshot::restore(log, &pre_write);
            repairs += 1;
            tx_event
                .send(Event {
                    cycle: cycle_id,
                    msg: EventMsg::CorruptionRepaired(CorruptionRepairedEvent { pass }),
                })
                .await
                .ok();
        }
    }
    repairs
}

fn contents_differ(current: &[ConversationEntry], expected: &[ConversationEntry]) -> bool {
    if current.len() != expected.len() {
        return true;
    }
    current
        .iter()
        .zip(expected)
        .any(|(a, b)| a.content != b.content)
}
