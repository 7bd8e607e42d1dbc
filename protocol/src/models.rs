use std::collections::BTreeSet;
use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Who authored a conversation entry. Immutable for the entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    User,
    Agent,
    /// Informational entries injected by the host (greetings, notices).
    /// Never a valid swipe target.
    System,
}

/// Stable identity tag for a conversation entry.
///
/// Positions in the shared log shift while the engine holds the log across
/// an await, so everything that must re-locate an entry after a suspension
/// point does it by id, never by a captured index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of one generation cycle. The engine echoes it back in its
/// halted signal so the orchestrator can confirm the stop belongs to the
/// cycle it is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-alternative metadata. Always owned by exactly one alternative and
/// value-copied on every hand-off; two alternatives never share one by
/// reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwipeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Engine/model identifier that produced the alternative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Reasoning trace captured from the engine's trace signal, last wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// Free-form auxiliary payload (provenance tags and the like).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl SwipeMetadata {
    /// Placeholder stamped when an alternative slot is reserved.
    pub fn reserved_now() -> Self {
        Self {
            created_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// Transient, never-persisted markers on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransientFlag {
    /// Synthetic prompt-carrier entry inserted solely for the engine to
    /// react to. Must never be persisted or shown.
    Scaffold,
    /// Host pinned this entry against regeneration.
    NonSwipeable,
}

/// One turn in the conversation log.
///
/// Invariants: `alternatives` is non-empty, `alternative_metadata` has the
/// same length, `active_index` is in bounds, and `content` equals
/// `alternatives[active_index]` whenever no generation cycle is holding the
/// entry in its read-while-generating window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: EntryId,
    pub role: SpeakerRole,
    pub content: String,
    pub alternatives: Vec<String>,
    pub active_index: usize,
    pub alternative_metadata: Vec<SwipeMetadata>,
    /// Denormalized copy of the displayed alternative's metadata, kept in
    /// sync by navigation and commit so a renderer never has to index into
    /// `alternative_metadata` itself.
    #[serde(default)]
    pub display_meta: SwipeMetadata,
    #[serde(skip)]
    pub flags: BTreeSet<TransientFlag>,
}

impl ConversationEntry {
    fn with_role(role: SpeakerRole, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: EntryId::new(),
            role,
            alternatives: vec![content.clone()],
            active_index: 0,
            alternative_metadata: vec![SwipeMetadata::default()],
            display_meta: SwipeMetadata::default(),
            flags: BTreeSet::new(),
            content,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(SpeakerRole::User, content)
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::with_role(SpeakerRole::Agent, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(SpeakerRole::System, content)
    }

    /// Synthetic prompt-carrier entry. User-role so the engine reacts to it
    /// as the latest turn; flagged so it can never leak into persistence or
    /// a final log.
    pub fn scaffold(direction: impl Into<String>) -> Self {
        let mut entry = Self::with_role(SpeakerRole::User, direction);
        entry.flags.insert(TransientFlag::Scaffold);
        entry
    }

    pub fn is_scaffold(&self) -> bool {
        self.flags.contains(&TransientFlag::Scaffold)
    }

    /// Whether this entry may be the target of a swipe at all.
    pub fn is_swipeable(&self) -> bool {
        matches!(self.role, SpeakerRole::User | SpeakerRole::Agent)
            && !self.flags.contains(&TransientFlag::NonSwipeable)
            && !self.is_scaffold()
    }
}

/// What the displayed entry does when a freshly generated alternative
/// commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayPolicy {
    /// Keep showing the pre-cycle alternative; the new one exists but is
    /// not displayed until the user navigates to it.
    #[default]
    StayOnOriginal,
    /// Advance `active_index`/`content` to the new alternative immediately.
    AdvanceToNew,
}

/// Resolution of one `swipe_forward`/`swipe_back` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwipeOutcome {
    /// Moved between existing alternatives; no engine involvement.
    Navigated { index: usize, active: usize },
    /// A generation cycle completed and committed a new alternative.
    Generated { index: usize, alternative: usize },
    /// The cycle was stopped (user stop or engine halt) and the log was
    /// restored. Informational, not an error.
    Cancelled,
    /// `swipe_back` with nothing before the current alternative.
    AtStart,
}
