//! Interactive quarantine of duplicates and low-bitrate files.
//!
//! Deciding and moving are kept apart:
//!
//! - [`decision`]: prompts, response parsing and the per-flow "all"/"quit" state
//! - [`mover`]: collision-free, dry-run aware moves
//! - [`engine`]: the duplicate and low-bitrate flows tying the two together

pub mod decision;
pub mod engine;
pub mod mover;

pub use decision::{
    confirm, parse_response, Decision, DecisionSource, Prompt, PromptSession, Resolution,
    ScriptedDecisions, StdinDecisions,
};
pub use engine::{QuarantineEngine, QuarantineSummary};
pub use mover::{unique_destination, MoveOutcome, QuarantineError, QuarantineMover};
