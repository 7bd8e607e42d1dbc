//! Swipe-generation orchestrator.
//!
//! The host owns a linear conversation log and an opaque generation engine
//! that only ever appends after the log's final entry. This crate lets the
//! host regenerate ("swipe") any entry in that log: it presents a
//! temporarily truncated view of the log to the engine, captures exactly
//! the entry the engine produced, restores the log to its original shape
//! plus one new alternative, and repairs the log wholesale when the cycle
//! is cancelled, fails, or the persistence layer corrupts it mid-save.
//!
//! Entry point: [`SwipeSession`].

mod config;
mod conversation;
mod driver;
mod engine;
mod error;
mod journal;
mod ledger;
mod navigation;
mod recovery;
mod rollout;
mod session;
mod snapshot;
mod truncation;
mod view;

pub use config::CONTENT_PLACEHOLDER;
pub use config::SwipeConfig;
pub use conversation::SharedLog;
pub use engine::Engine;
pub use engine::EngineSubscription;
pub use error::SwipeErr;
pub use error::SwipeResult;
pub use journal::Journal;
pub use journal::NoopJournal;
pub use rollout::JsonlJournal;
pub use session::SwipeSession;
pub use view::NoopView;
pub use view::RenderHints;
pub use view::ViewSink;

pub use swipe_protocol as protocol;
