//! Access Control List (ACL) module
//!
//! Stateless first-match evaluation of simulated packets against the
//! router's FORWARD chain.

mod evaluator;
mod rules;

pub use evaluator::{evaluate, AclEvaluator};
pub use rules::{AclDecision, SimulatedPacket};
