use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use swipe_protocol::DisplayPolicy;

use crate::error::SwipeErr;
use crate::error::SwipeResult;

/// Placeholder substituted with the target entry's current content when a
/// User-role entry is regenerated.
pub const CONTENT_PLACEHOLDER: &str = "{{content}}";

const DEFAULT_IMPERSONATION_TEMPLATE: &str =
    "[Write the user's next reply in their voice. Their current reply, to rework: {{content}}]";
const DEFAULT_CONTINUATION_CUE: &str = "[Continue the conversation.]";

/// Session configuration. Everything has a workable default; hosts
/// typically load overrides from a TOML file and hand the result to
/// [`crate::SwipeSession::new`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwipeConfig {
    /// Scaffold text for regenerating a User-role entry. Must contain
    /// [`CONTENT_PLACEHOLDER`]; checked when the cycle starts, before any
    /// mutation.
    pub impersonation_template: String,
    /// Scaffold text for regenerating an Agent-role entry.
    pub continuation_cue: String,
    pub display_policy: DisplayPolicy,
    /// Guarded save passes run at cycle resolution. Clamped to at least 2
    /// at use: the second pass overwrites a stale debounced auto-save that
    /// may have slipped in after the first.
    pub guarded_save_passes: usize,
    /// External-conflict gate. A host sets this while a feature that is
    /// incompatible with swipe generation is active; generation is refused
    /// while it is up, navigation is unaffected.
    #[serde(skip)]
    pub generation_blocked: Arc<AtomicBool>,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            impersonation_template: DEFAULT_IMPERSONATION_TEMPLATE.to_string(),
            continuation_cue: DEFAULT_CONTINUATION_CUE.to_string(),
            display_policy: DisplayPolicy::default(),
            guarded_save_passes: 2,
            generation_blocked: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SwipeConfig {
    pub async fn load_from_toml(path: impl AsRef<Path>) -> SwipeResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        toml::from_str(&raw).map_err(|err| SwipeErr::TomlParse(err.to_string()))
    }

    pub fn generation_blocked(&self) -> bool {
        self.generation_blocked.load(Ordering::Relaxed)
    }

    pub fn effective_save_passes(&self) -> usize {
        self.guarded_save_passes.max(2)
    }
}

impl std::fmt::Debug for SwipeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwipeConfig")
            .field("display_policy", &self.display_policy)
            .field("guarded_save_passes", &self.guarded_save_passes)
            .field("generation_blocked", &self.generation_blocked())
            .finish_non_exhaustive()
    }
}
