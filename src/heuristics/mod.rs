//! Heuristic scoring of flaws and ordering of their choices.
//!
//! Rules are plain records ([`HeuristicRule`]) matched against a flaw by
//! predicate (with inheritance), value guards on the token's parameters,
//! and an optional master guard checked with [`can_match`]. More guards
//! give a larger weight, and the largest weight decides the flaw's
//! priority and choice order.
//!
//! # References
//!
//! Flaw-selection heuristics for partial-order planning: Pollack, Joslin
//! & Paolucci (1997), "Flaw Selection Strategies for Partial-Order
//! Planning"

mod config;
mod engine;
mod rule;

pub use config::HeuristicsConfig;
pub use engine::HeuristicsEngine;
pub use rule::{
    can_match, CandidateOrder, HeuristicRule, MasterGuard, RuleTarget, StateChoice, ValueGuard,
    ValueOrder, MAX_PRIORITY, MIN_PRIORITY, WEIGHT_BASE,
};
