use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use swipe_protocol::AbortReason;
use swipe_protocol::ConversationEntry;
use swipe_protocol::CycleId;
use swipe_protocol::CycleStartedEvent;
use swipe_protocol::EntryId;
use swipe_protocol::Event;
use swipe_protocol::EventMsg;
use swipe_protocol::SpeakerRole;
use swipe_protocol::SwipeCommittedEvent;
use swipe_protocol::SwipeMetadata;
use swipe_protocol::SwipeOutcome;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::config::SwipeConfig;
use crate::conversation::SharedLog;
use crate::driver;
use crate::driver::DriveOutcome;
use crate::engine::Engine;
use crate::error::SwipeErr;
use crate::error::SwipeResult;
use crate::journal::Journal;
use crate::ledger;
use crate::navigation;
use crate::recovery;
use crate::recovery::CycleState;
use crate::recovery::GenerationCycle;
use crate::recovery::RecoveryCtx;
use crate::snapshot;
use crate::truncation;
use crate::view::RenderHints;
use crate::view::ViewSink;

#[derive(Default)]
struct SessionState {
    cycle_in_flight: Option<CycleId>,
    /// The caller asked for a stop; attributes the next owned halt.
    stop_requested: bool,
    /// Out-of-bounds `active_index` repairs made at cycle start.
    clamp_repairs: u64,
    /// Corrupted saves caught and reverted by the guarded save sequence.
    corruption_repairs: u64,
}

/// Orchestrates swipe navigation and swipe generation over a conversation
/// log it shares with an external engine, renderer and persistence layer.
///
/// One session drives one log. Exactly one generation cycle may be in
/// flight at a time; callers are expected to serialize (a loading state in
/// the UI, typically), and a second request while one is live is rejected
/// as [`SwipeErr::CycleInFlight`] rather than corrupting the first.
pub struct SwipeSession {
    log: SharedLog,
    engine: Arc<dyn Engine>,
    view: Arc<dyn ViewSink>,
    journal: Arc<dyn Journal>,
    config: SwipeConfig,
    tx_event: async_channel::Sender<Event>,
    state: Mutex<SessionState>,
}

impl SwipeSession {
    /// Returns the session and the receiving end of its event stream.
    pub fn new(
        log: SharedLog,
        engine: Arc<dyn Engine>,
        view: Arc<dyn ViewSink>,
        journal: Arc<dyn Journal>,
        config: SwipeConfig,
    ) -> (Arc<Self>, async_channel::Receiver<Event>) {
        let (tx_event, rx_event) = async_channel::unbounded();
        let session = Arc::new(Self {
            log,
            engine,
            view,
            journal,
            config,
            tx_event,
            state: Mutex::new(SessionState::default()),
        });
        (session, rx_event)
    }

    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// How many out-of-bounds `active_index` values were clamped.
    pub fn clamp_repairs(&self) -> u64 {
        self.state().clamp_repairs
    }

    /// How many corrupted saves the guarded sequence caught and reverted.
    pub fn corruption_repairs(&self) -> u64 {
        self.state().corruption_repairs
    }

    /// Ask the engine to stop whatever it is generating. Idempotent; the
    /// actual cancellation arrives through the engine's halted signal and
    /// is handled by the in-flight cycle.
    pub fn request_stop(&self) {
        self.state().stop_requested = true;
        self.engine.request_stop();
    }

    /// Move to the next alternative of the entry at `index`, or generate a
    /// new one when the entry is already showing its last alternative.
    pub async fn swipe_forward(&self, index: usize) -> SwipeResult<SwipeOutcome> {
        self.reject_if_cycle_in_flight()?;
        let (active, len) = self.alternative_bounds(index)?;
        if active + 1 < len {
            return self.navigate(index, active + 1).await;
        }
        self.run_generation_cycle(index).await
    }

    /// Move to the previous alternative of the entry at `index`. Never
    /// generates; [`SwipeOutcome::AtStart`] when there is nothing before
    /// the current alternative.
    pub async fn swipe_back(&self, index: usize) -> SwipeResult<SwipeOutcome> {
        self.reject_if_cycle_in_flight()?;
        let (active, _len) = self.alternative_bounds(index)?;
        if active == 0 {
            return Ok(SwipeOutcome::AtStart);
        }
        self.navigate(index, active - 1).await
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While a cycle holds the log truncated, the reserved placeholder is
    /// part of the target's alternatives; navigating into it (or starting
    /// a second cycle) would corrupt the cycle's bookkeeping. Callers are
    /// expected to serialize; this makes the violation loud.
    fn reject_if_cycle_in_flight(&self) -> SwipeResult<()> {
        if let Some(existing) = self.state().cycle_in_flight {
            error!(%existing, "swipe requested while a cycle is in flight");
            return Err(SwipeErr::CycleInFlight);
        }
        Ok(())
    }

    fn alternative_bounds(&self, index: usize) -> SwipeResult<(usize, usize)> {
        self.log.with(|entries| {
            let len = entries.len();
            let entry = entries
                .get(index)
                .ok_or(SwipeErr::InvalidTarget { index, len })?;
            Ok((entry.active_index, entry.alternatives.len()))
        })
    }

    /// Synchronous navigation across existing alternatives. Repaints the
    /// one entry and persists; a failed save is logged, not fatal — the
    /// in-memory log is already correct and the next save will carry it.
    async fn navigate(&self, index: usize, target_alt: usize) -> SwipeResult<SwipeOutcome> {
        let entry = self.log.with_mut(|entries| {
            let len = entries.len();
            let entry = entries
                .get_mut(index)
                .ok_or(SwipeErr::InvalidTarget { index, len })?;
            navigation::step_to(entry, target_alt)?;
            Ok::<_, SwipeErr>(entry.clone())
        })?;

        self.view.render_one(
            index,
            &entry,
            RenderHints {
                swipe_update: true,
                force_index: Some(index),
            },
        );

        if let Err(err) = self.journal.persist(&self.log).await {
            warn!("save after swipe navigation failed: {err:#}");
        }

        Ok(SwipeOutcome::Navigated {
            index,
            active: target_alt,
        })
    }

    /// Pre-mutation eligibility checks for a generation request. Nothing
    /// here touches the log.
    fn eligible_target(&self, index: usize) -> SwipeResult<(EntryId, SpeakerRole, String)> {
        if self.config.generation_blocked() {
            return Err(SwipeErr::ExternalConflict(
                "an active feature is incompatible with swipe generation".to_string(),
            ));
        }
        self.log.with(|entries| {
            let len = entries.len();
            let entry = entries
                .get(index)
                .ok_or(SwipeErr::InvalidTarget { index, len })?;
            if !entry.is_swipeable() {
                return Err(SwipeErr::IneligibleTarget { index });
            }
            Ok((entry.id, entry.role, entry.content.clone()))
        })
    }

    async fn run_generation_cycle(&self, target_index: usize) -> SwipeResult<SwipeOutcome> {
        let (target_id, role, current_content) = self.eligible_target(target_index)?;
        // Reject a missing direction template before any mutation.
        let direction = truncation::build_direction(&self.config, role, &current_content)?;

        let cycle_id = CycleId::new();
        {
            let mut state = self.state();
            if let Some(existing) = state.cycle_in_flight {
                error!(%existing, "swipe requested while a cycle is in flight");
                return Err(SwipeErr::CycleInFlight);
            }
            state.cycle_in_flight = Some(cycle_id);
            state.stop_requested = false;
        }

        let result = self
            .drive_cycle(cycle_id, target_index, target_id, role, direction)
            .await;

        self.state().cycle_in_flight = None;
        result
    }

    async fn drive_cycle(
        &self,
        cycle_id: CycleId,
        target_index: usize,
        target_id: EntryId,
        role: SpeakerRole,
        direction: String,
    ) -> SwipeResult<SwipeOutcome> {
        // Capture before the first mutation; this copy is what recovery
        // replays, wholesale, on any abort.
        let snapshot = snapshot::capture(&self.log);
        let original_len = snapshot.len();

        let (pre_display, reserved_alt, clamped) = self.log.with_mut(|entries| {
            let entry = &mut entries[target_index];
            let clamped = ledger::normalize_active_index(entry);
            let pre_display = ledger::display_snapshot(entry);
            let reserved_alt = ledger::reserve_alternative(entry);
            (pre_display, reserved_alt, clamped)
        });
        if clamped {
            self.state().clamp_repairs += 1;
        }

        self.send_event(cycle_id, EventMsg::CycleStarted(CycleStartedEvent { target_index }))
            .await;

        // Tag the still-on-screen tail inert so the engine's own
        // tail-matching cannot target entries we are about to hide.
        let stale = truncation::stale_range(target_index, original_len);
        for index in stale.clone() {
            self.view.mark_inert(index);
        }

        let hidden = truncation::hide_tail(&self.log, target_index, role);
        truncation::append_scaffold(&self.log, direction);
        debug!(
            cycle = %cycle_id,
            target_index,
            hidden = hidden.len(),
            "log truncated, driving engine"
        );

        let mut cycle = GenerationCycle {
            id: cycle_id,
            target_index,
            target_id,
            role,
            snapshot: Some(snapshot),
            pre_display,
            reserved_alt,
            stale,
            state: CycleState::Running,
            engine_owns_cycle: true,
            cleanup_performed: false,
        };
        let ctx = RecoveryCtx {
            log: &self.log,
            engine: self.engine.as_ref(),
            view: self.view.as_ref(),
            journal: self.journal.as_ref(),
            tx_event: &self.tx_event,
            save_passes: self.config.effective_save_passes(),
        };

        let drive_result = driver::drive(self.engine.as_ref(), &self.log, cycle_id).await;

        match drive_result {
            Ok(DriveOutcome::Completed(generated)) => {
                cycle.engine_owns_cycle = false;
                cycle.state = CycleState::Completing;
                truncation::restore_tail(&self.log, hidden);
                for index in cycle.stale.clone() {
                    self.view.clear_inert(index);
                }
                self.commit_generated(&ctx, &mut cycle, generated.text, generated.meta)
                    .await
            }
            Ok(DriveOutcome::Halted(halted)) => {
                // The stop is this cycle's own only while the engine call
                // is attributable to it and the signal is stamped with
                // this cycle's id.
                if cycle.engine_owns_cycle && halted.cycle == Some(cycle_id) {
                    // The snapshot replay covers everything the hidden
                    // tail held; it is not re-appended first.
                    drop(hidden);
                    let reason = if std::mem::take(&mut self.state().stop_requested) {
                        AbortReason::UserStop
                    } else {
                        AbortReason::EngineHalted
                    };
                    let repairs =
                        recovery::cleanup_after_abort(&ctx, &mut cycle, reason).await;
                    self.state().corruption_repairs += repairs as u64;
                    Ok(SwipeOutcome::Cancelled)
                } else {
                    // Ownership unconfirmed: some other feature triggered
                    // the stop, and this cycle's view of the log shape is
                    // no longer trustworthy enough to force-restore.
                    recovery::cleanup_after_ambiguous_stop(&ctx, &mut cycle, hidden).await;
                    Err(SwipeErr::AmbiguousStop)
                }
            }
            Err(err) => {
                cycle.engine_owns_cycle = false;
                drop(hidden);
                let repairs =
                    recovery::cleanup_after_abort(&ctx, &mut cycle, AbortReason::Error).await;
                self.state().corruption_repairs += repairs as u64;
                // Rethrown only after the log is whole again.
                Err(err)
            }
        }
    }

    async fn commit_generated(
        &self,
        ctx: &RecoveryCtx<'_>,
        cycle: &mut GenerationCycle,
        text: String,
        meta: SwipeMetadata,
    ) -> SwipeResult<SwipeOutcome> {
        // Re-locate the target by identity: external persistence may have
        // reshuffled the log while the drive was suspended.
        let committed: Option<(usize, ConversationEntry)> = self.log.with_mut(|entries| {
            let position = entries.iter().position(|e| e.id == cycle.target_id)?;
            let entry = &mut entries[position];
            if cycle.reserved_alt >= entry.alternatives.len() {
                // External mutation ate the reserved slot during the
                // await; nothing sane to write into.
                return None;
            }
            ledger::commit(
                entry,
                cycle.reserved_alt,
                text,
                meta,
                self.config.display_policy,
                &cycle.pre_display,
            );
            Some((position, entry.clone()))
        });

        let Some((position, entry)) = committed else {
            warn!(
                cycle = %cycle.id,
                "target entry or its reserved slot disappeared during generation; recovering"
            );
            let repairs = recovery::cleanup_after_abort(ctx, cycle, AbortReason::Error).await;
            self.state().corruption_repairs += repairs as u64;
            return Err(SwipeErr::Engine(anyhow::anyhow!(
                "target entry disappeared while the engine held the log"
            )));
        };

        self.view.render_one(
            position,
            &entry,
            RenderHints {
                swipe_update: true,
                force_index: Some(position),
            },
        );

        let repairs = recovery::guarded_persist(
            ctx.journal,
            ctx.log,
            ctx.save_passes,
            ctx.tx_event,
            cycle.id,
        )
        .await;
        self.state().corruption_repairs += repairs as u64;

        cycle.snapshot = None;
        cycle.state = CycleState::Resolved;

        self.send_event(
            cycle.id,
            EventMsg::SwipeCommitted(SwipeCommittedEvent {
                target_index: position,
                alternative: cycle.reserved_alt,
            }),
        )
        .await;

        Ok(SwipeOutcome::Generated {
            index: position,
            alternative: cycle.reserved_alt,
        })
    }

    async fn send_event(&self, cycle: CycleId, msg: EventMsg) {
        self.tx_event.send(Event { cycle, msg }).await.ok();
    }
}
