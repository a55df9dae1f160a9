//! `pm-agent`: the Project Manager agent.
//!
//! * [`runner`]: the per-turn tool loop against the completion endpoint.
//! * [`tools`]: capability-gated tool registry (repository + tickets).
//! * [`fallback`]: reply synthesis when the model returns no text.
//! * [`bootstrap`]: wiring a [`runner::Runner`] from configuration.
//! * [`cli`]: the `pm-agent` command line.

pub mod bootstrap;
pub mod cli;
pub mod fallback;
pub mod prompt;
pub mod runner;
pub mod telemetry;
pub mod tools;

pub use runner::{Runner, TurnError, TurnInput, TurnPhase, TurnResult, TurnState};
pub use tools::{Capabilities, ToolOutcome, ToolRegistry};
