//! Types shared between the swipe orchestrator core and its hosts.
//!
//! This crate is deliberately dependency-light: it defines the conversation
//! data model, the lifecycle signals an external generation engine emits,
//! and the events the orchestrator emits towards its caller. No IO, no
//! runtime, no policy — those live in `swipe-core`.

mod event;
mod models;

pub use event::AbortReason;
pub use event::CorruptionRepairedEvent;
pub use event::CycleAbortedEvent;
pub use event::CycleStartedEvent;
pub use event::EngineSignal;
pub use event::Event;
pub use event::EventMsg;
pub use event::HaltedSignal;
pub use event::NoticeEvent;
pub use event::StateWarningEvent;
pub use event::SwipeCommittedEvent;
pub use event::TraceSegment;
pub use models::ConversationEntry;
pub use models::CycleId;
pub use models::DisplayPolicy;
pub use models::EntryId;
pub use models::SpeakerRole;
pub use models::SwipeMetadata;
pub use models::SwipeOutcome;
pub use models::TransientFlag;
