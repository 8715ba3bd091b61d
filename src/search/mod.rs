//! Flaw-driven backtracking search.
//!
//! The [`DecisionManager`] picks the next [`Flaw`] through an ordered list
//! of strategies (zero-commitment guards, threats, open conditions,
//! guarded variables, remaining variables) and scores candidates with the
//! heuristics engine. Priorities within [`DecisionConfig::epsilon`] are
//! equal and fall to the configured [`TieBreak`].
//!
//! A [`DecisionPoint`] holds a flaw's ordered [`Choice`]s and undoes its
//! committed choice on retract. The [`Solver`] stacks decision points and
//! backtracks chronologically.
//!
//! # References
//!
//! - Frank & Jónsson (2003), "Constraint-Based Attribute and Interval Planning"
//! - Pollack, Joslin & Paolucci (1997), "Flaw Selection Strategies for
//!   Partial-Order Planning"

mod config;
mod decision;
mod manager;
mod solver;

pub use config::{DecisionConfig, SolverConfig, TieBreak};
pub use decision::{Choice, DecisionPoint, Flaw};
pub use manager::DecisionManager;
pub use solver::{Solver, SolverResult, SolverStatus};
