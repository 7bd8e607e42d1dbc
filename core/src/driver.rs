use std::collections::HashSet;

use swipe_protocol::ConversationEntry;
use swipe_protocol::CycleId;
use swipe_protocol::EngineSignal;
use swipe_protocol::EntryId;
use swipe_protocol::HaltedSignal;
use swipe_protocol::SpeakerRole;
use swipe_protocol::SwipeMetadata;
use tracing::debug;

use crate::conversation::SharedLog;
use crate::engine::Engine;
use crate::error::SwipeErr;
use crate::error::SwipeResult;

/// What the engine produced during one drive.
pub(crate) struct GeneratedText {
    pub text: String,
    pub meta: SwipeMetadata,
}

pub(crate) enum DriveOutcome {
    Completed(GeneratedText),
    /// The halted signal fired before normal completion resolved. A
    /// cancellation trigger, not an error.
    Halted(HaltedSignal),
}

/// Run the external generation operation against the truncated log and
/// await its completion, racing it against the engine's lifecycle signals.
///
/// The subscription is taken before the generate future starts so no
/// signal can be missed, and is dropped when this function returns —
/// nothing registered for the cycle survives its resolution. Trace
/// segments are captured last-wins; a halted signal resolves the drive
/// immediately without waiting for the engine future, whose own cleanup
/// is untrusted.
pub(crate) async fn drive(
    engine: &dyn Engine,
    log: &SharedLog,
    cycle: CycleId,
) -> SwipeResult<DriveOutcome> {
    let mut sub = engine.subscribe(cycle);

    // Everything present before the await is known; whatever the engine
    // appends is re-located afterwards by identity, never by position.
    let known: HashSet<EntryId> = log.with(|entries| entries.iter().map(|e| e.id).collect());

    let mut last_trace: Option<String> = None;
    let generate = engine.append_and_generate(log);
    tokio::pin!(generate);

    let mut signals_open = true;
    let completion = loop {
        if !signals_open {
            break generate.as_mut().await;
        }
        tokio::select! {
            res = generate.as_mut() => break res,
            signal = sub.recv() => match signal {
                Some(EngineSignal::Halted(halted)) => {
                    debug!("halted signal won the race against completion");
                    return Ok(DriveOutcome::Halted(halted));
                }
                Some(EngineSignal::Trace(segment)) => {
                    last_trace = Some(segment.text);
                }
                None => signals_open = false,
            },
        }
    };

    // Signals already buffered when the future resolved still count: a
    // halt that fired during the last poll gap is a cancellation, and a
    // buffered trace segment is fresher than anything seen so far.
    while let Some(signal) = sub.try_recv() {
        match signal {
            EngineSignal::Halted(halted) => return Ok(DriveOutcome::Halted(halted)),
            EngineSignal::Trace(segment) => last_trace = Some(segment.text),
        }
    }

    completion.map_err(SwipeErr::Engine)?;

    let produced = log.with_mut(|entries| take_produced(entries, &known));
    let Some(produced) = produced else {
        return Err(SwipeErr::EmptyGeneration);
    };
    if produced.role != SpeakerRole::Agent || produced.content.trim().is_empty() {
        return Err(SwipeErr::EmptyGeneration);
    }

    let mut meta = produced
        .alternative_metadata
        .get(produced.active_index)
        .cloned()
        .unwrap_or_default();
    if last_trace.is_some() {
        meta.trace = last_trace;
    }

    Ok(DriveOutcome::Completed(GeneratedText {
        text: produced.content,
        meta,
    }))
}

/// Remove and return the entry the engine just produced — the last entry
/// that is neither a scaffold nor something we put there ourselves — and
/// strip every scaffold while at it. The log may have been reshuffled by
/// external persistence during the await, so this searches by
/// identity/flag rather than trusting any captured index.
fn take_produced(
    entries: &mut Vec<ConversationEntry>,
    known: &HashSet<EntryId>,
) -> Option<ConversationEntry> {
    let idx = entries
        .iter()
        .rposition(|e| !e.is_scaffold() && !known.contains(&e.id))?;
    let produced = entries.remove(idx);
    entries.retain(|e| !e.is_scaffold());
    Some(produced)
}
