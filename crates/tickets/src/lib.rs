//! `pm-tickets`: ticket readiness and lifecycle on a Kanban board.
//!
//! * [`readiness`]: pure Definition-of-Ready evaluation of a markdown body.
//! * [`normalize`]: heading, title-line and checkbox normalisation.
//! * [`prefix`]: repository-derived display-id prefixes.
//! * [`store`]: the [`TicketStore`] trait and its error classification.
//! * [`memory`] / [`rest`]: in-memory and PostgREST store implementations.
//! * [`lifecycle`]: creation with bounded id allocation, column moves.

pub mod lifecycle;
pub mod memory;
pub mod normalize;
pub mod prefix;
pub mod readiness;
pub mod rest;
pub mod store;

pub use lifecycle::{CreateOutcome, MoveOutcome, TicketError, TicketManager, UpdateOutcome};
pub use memory::MemoryTicketStore;
pub use readiness::{evaluate_ready, find_placeholders, ReadinessResult};
pub use rest::RestTicketStore;
pub use store::{StoreError, TicketStore};
