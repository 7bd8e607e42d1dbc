use swipe_protocol::ConversationEntry;

use crate::conversation::SharedLog;

/// Hints handed to the renderer alongside a single-entry repaint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderHints {
    /// The repaint is a swipe-type update (alternative changed), not new
    /// conversation content.
    pub swipe_update: bool,
    /// Render at this index even if the renderer's own bookkeeping
    /// disagrees.
    pub force_index: Option<usize>,
}

/// The external renderer, reduced to the calls the orchestrator needs.
///
/// `mark_inert`/`clear_inert` are opaque staleness tags in the renderer's
/// index space: while a cycle holds the log truncated, the entries that
/// are still on screen from the target onward must not be picked up by the
/// engine's own tail-matching logic.
pub trait ViewSink: Send + Sync {
    /// Throw the current view away and rebuild it from `log`. Used after a
    /// wholesale restore, where incremental patching cannot be trusted.
    fn rebuild_view(&self, log: &SharedLog);

    fn render_one(&self, index: usize, entry: &ConversationEntry, hints: RenderHints);

    fn mark_inert(&self, index: usize);

    fn clear_inert(&self, index: usize);
}

/// Renderer for hosts that have none (headless tests, batch drivers).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopView;

impl ViewSink for NoopView {
    fn rebuild_view(&self, _log: &SharedLog) {}

    fn render_one(&self, _index: usize, _entry: &ConversationEntry, _hints: RenderHints) {}

    fn mark_inert(&self, _index: usize) {}

    fn clear_inert(&self, _index: usize) {}
}
