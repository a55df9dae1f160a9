//! `pm-contextpack`: assembles the per-turn prompt material.
//!
//! A context pack holds the inbound message, a bounded conversation
//! window, the repository's rule documents, the ticket template, the
//! ready-to-start checklist and a `git status` snapshot. It is rebuilt
//! for every turn and never persisted.

pub mod builder;
pub mod conversation;
pub mod injection;
pub mod report;
pub mod sources;

pub use builder::{ContextInput, ContextPack, ContextPackBuilder};
pub use conversation::{render_conversation, ConversationTurn};
pub use report::ContextReport;
