use thiserror::Error;

pub type SwipeResult<T> = Result<T, SwipeErr>;

#[derive(Error, Debug)]
pub enum SwipeErr {
    /// Target index outside the log, or the log is empty.
    #[error("swipe target {index} out of range (log has {len} entries)")]
    InvalidTarget { index: usize, len: usize },

    /// Target exists but may not be regenerated (system-role, scaffold, or
    /// pinned non-swipeable).
    #[error("entry {index} is not a valid swipe target")]
    IneligibleTarget { index: usize },

    /// Navigation asked for an alternative that does not exist. One past
    /// the end is not navigation either — that is a generation request and
    /// is dispatched as one by the session, never by `step_to`.
    #[error("alternative {index} out of range (entry has {len})")]
    InvalidAlternative { index: usize, len: usize },

    /// Required configuration for the requested role is missing.
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// A known-incompatible external feature is active; generation is
    /// refused outright, navigation is still permitted.
    #[error("generation blocked: {0}")]
    ExternalConflict(String),

    /// The engine completed but produced no usable content. Recovery has
    /// already run by the time this surfaces.
    #[error("engine completed without producing content")]
    EmptyGeneration,

    /// A halted signal fired whose ownership could not be confirmed. Only
    /// conservative cleanup was performed; the log was deliberately not
    /// force-restored.
    #[error("generation stopped by an unrelated feature; state may be inconsistent")]
    AmbiguousStop,

    /// A cycle is already in flight on this session. Callers are expected
    /// to serialize swipe requests.
    #[error("a generation cycle is already in flight")]
    CycleInFlight,

    #[error("engine failed: {0}")]
    Engine(#[source] anyhow::Error),

    #[error("persistence failed: {0}")]
    Journal(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    TomlParse(String),
}
