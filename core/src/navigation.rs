use swipe_protocol::ConversationEntry;

use crate::error::SwipeErr;
use crate::error::SwipeResult;

/// Pure index movement across existing alternatives. No truncation, no
/// snapshot, no engine interaction.
///
/// `target_alt == alternatives.len()` is rejected here: one past the end
/// is a generation request, and the session routes it to the generation
/// driver instead of calling `step_to` at all.
pub(crate) fn step_to(entry: &mut ConversationEntry, target_alt: usize) -> SwipeResult<()> {
    let len = entry.alternatives.len();
    if target_alt >= len {
        return Err(SwipeErr::InvalidAlternative {
            index: target_alt,
            len,
        });
    }
    entry.active_index = target_alt;
    entry.content = entry.alternatives[target_alt].clone();
    entry.display_meta = entry.alternative_metadata[target_alt].clone();
    Ok(())
}
