//! `pm-domain`: types shared by every Project Manager agent crate.
//!
//! Holds the error type, the TOML configuration tree, provider-agnostic
//! message/tool types, the ticket model, structured trace events, and the
//! diagnostics redactor.

pub mod config;
pub mod error;
pub mod redact;
pub mod ticket;
pub mod tool;
pub mod trace;
