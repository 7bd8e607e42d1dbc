use std::ops::Range;

use swipe_protocol::ConversationEntry;
use swipe_protocol::EntryId;
use swipe_protocol::SpeakerRole;
use tracing::warn;

use crate::config::CONTENT_PLACEHOLDER;
use crate::config::SwipeConfig;
use crate::conversation::SharedLog;
use crate::error::SwipeErr;
use crate::error::SwipeResult;

/// The tail of the log removed for the duration of a generation cycle.
/// Owned by the cycle; [`restore_tail`] puts it back in original order.
pub(crate) struct HiddenTail {
    entries: Vec<ConversationEntry>,
    cut_from: usize,
}

impl HiddenTail {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Where the hidden tail starts, by target role.
///
/// A User-role target stays visible (the engine must see the user's turn
/// to react to it); an Agent-role target is hidden along with everything
/// after it (the engine must not see its own prior answer while producing
/// a fresh one).
pub(crate) fn cut_index(role: SpeakerRole, target_index: usize) -> usize {
    match role {
        SpeakerRole::User => target_index + 1,
        SpeakerRole::Agent | SpeakerRole::System => target_index,
    }
}

/// Remove and return every entry from the role-dependent cut point to the
/// end, leaving only the visible prefix.
pub(crate) fn hide_tail(
    log: &SharedLog,
    target_index: usize,
    role: SpeakerRole,
) -> HiddenTail {
    let cut_from = cut_index(role, target_index);
    let entries = log.with_mut(|entries| {
        let cut = cut_from.min(entries.len());
        entries.split_off(cut)
    });
    HiddenTail { entries, cut_from }
}

/// Append the previously hidden entries back in their original order.
pub(crate) fn restore_tail(log: &SharedLog, tail: HiddenTail) {
    log.with_mut(|entries| {
        if entries.len() != tail.cut_from {
            warn!(
                expected = tail.cut_from,
                actual = entries.len(),
                "visible prefix length shifted while the tail was hidden"
            );
        }
        entries.extend(tail.entries);
    });
}

/// Renderer-index range that must be tagged inert while the cycle holds
/// the log truncated: everything still on screen from the target onward.
pub(crate) fn stale_range(target_index: usize, original_len: usize) -> Range<usize> {
    target_index..original_len
}

/// Scaffold text the engine will react to. Checked before any mutation so
/// a missing template rejects the request outright.
pub(crate) fn build_direction(
    config: &SwipeConfig,
    role: SpeakerRole,
    current_content: &str,
) -> SwipeResult<String> {
    match role {
        SpeakerRole::User => {
            let template = config.impersonation_template.trim();
            if template.is_empty() {
                return Err(SwipeErr::Precondition(
                    "impersonation template is not configured".to_string(),
                ));
            }
            Ok(template.replace(CONTENT_PLACEHOLDER, current_content))
        }
        SpeakerRole::Agent => {
            let cue = config.continuation_cue.trim();
            if cue.is_empty() {
                return Err(SwipeErr::Precondition(
                    "continuation cue is not configured".to_string(),
                ));
            }
            Ok(cue.to_string())
        }
        SpeakerRole::System => Err(SwipeErr::Precondition(
            "system entries have no direction template".to_string(),
        )),
    }
}

/// Append the synthetic prompt-carrier entry and return its identity tag.
pub(crate) fn append_scaffold(log: &SharedLog, direction: String) -> EntryId {
    let scaffold = ConversationEntry::scaffold(direction);
    let id = scaffold.id;
    log.with_mut(|entries| entries.push(scaffold));
    id
}
