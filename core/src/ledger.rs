use chrono::Utc;
use swipe_protocol::ConversationEntry;
use swipe_protocol::DisplayPolicy;
use swipe_protocol::SwipeMetadata;
use tracing::warn;

/// Displayed fields of the target entry as they were before the cycle
/// reserved anything. Used to put the entry back on its original
/// alternative under the stay-on-original display policy.
#[derive(Debug, Clone)]
pub(crate) struct DisplaySnapshot {
    pub content: String,
    pub active_index: usize,
    pub display_meta: SwipeMetadata,
}

pub(crate) fn display_snapshot(entry: &ConversationEntry) -> DisplaySnapshot {
    DisplaySnapshot {
        content: entry.content.clone(),
        active_index: entry.active_index,
        display_meta: entry.display_meta.clone(),
    }
}

/// Clamp an out-of-bounds `active_index` to 0.
///
/// External corruption, not a normal state; the repair is logged here and
/// counted by the caller so it never passes as a silent success. Returns
/// whether a repair happened.
pub(crate) fn normalize_active_index(entry: &mut ConversationEntry) -> bool {
    if entry.active_index < entry.alternatives.len() {
        return false;
    }
    warn!(
        entry = %entry.id,
        active_index = entry.active_index,
        alternatives = entry.alternatives.len(),
        "active_index out of bounds, clamping to 0"
    );
    entry.active_index = 0;
    if let Some(first) = entry.alternatives.first() {
        entry.content = first.clone();
    }
    entry.display_meta = entry
        .alternative_metadata
        .first()
        .cloned()
        .unwrap_or_default();
    true
}

/// Append an empty placeholder alternative and return its index.
///
/// Deliberately leaves `content`/`active_index` untouched: the original
/// swipe stays readable while the engine generates into the placeholder.
pub(crate) fn reserve_alternative(entry: &mut ConversationEntry) -> usize {
    entry.alternatives.push(String::new());
    entry.alternative_metadata.push(SwipeMetadata::reserved_now());
    entry.alternatives.len() - 1
}

/// Write the generated text and its metadata into a reserved slot.
///
/// Display handling is policy-driven: advance to the new alternative, or
/// explicitly reset the entry to its pre-cycle displayed fields so the new
/// alternative exists without being shown.
pub(crate) fn commit(
    entry: &mut ConversationEntry,
    alt: usize,
    text: String,
    mut meta: SwipeMetadata,
    policy: DisplayPolicy,
    pre: &DisplaySnapshot,
) {
    if meta.completed_at.is_none() {
        meta.completed_at = Some(Utc::now());
    }
    entry.alternatives[alt] = text.clone();
    entry.alternative_metadata[alt] = meta.clone();
    match policy {
        DisplayPolicy::AdvanceToNew => {
            entry.active_index = alt;
            entry.content = text;
            entry.display_meta = meta;
        }
        DisplayPolicy::StayOnOriginal => {
            entry.active_index = pre.active_index;
            entry.content = pre.content.clone();
            entry.display_meta = pre.display_meta.clone();
        }
    }
}

/// Drop a reserved placeholder and its metadata. Cancel/failure path only.
///
/// Placeholders are reserved and discarded in stack order relative to the
/// single in-flight cycle, so anything but the last element indicates a
/// bookkeeping bug; the discard is refused and logged rather than
/// shifting later alternatives' identities.
pub(crate) fn discard_alternative(entry: &mut ConversationEntry, alt: usize) -> bool {
    if alt + 1 != entry.alternatives.len() || alt == 0 {
        warn!(
            entry = %entry.id,
            alt,
            alternatives = entry.alternatives.len(),
            "refusing non-stack-order alternative discard"
        );
        return false;
    }
    entry.alternatives.pop();
    entry.alternative_metadata.pop();
    if entry.active_index >= entry.alternatives.len() {
        entry.active_index = entry.alternatives.len() - 1;
        entry.content = entry.alternatives[entry.active_index].clone();
        entry.display_meta = entry.alternative_metadata[entry.active_index].clone();
    }
    true
}
