//! Flaw detection.
//!
//! A flaw is an unresolved aspect of a partial plan: a decidable variable
//! without a chosen value, an inactive token (open condition), or an
//! active token not yet placed on a timeline (threat). The
//! [`FlawTracker`] keeps the variable and open-condition sets current from
//! plan events; [`FlawFilter`]s exclude entities from consideration.

mod filter;
mod tracker;

pub use filter::{FlawFilter, HorizonFilter, InfiniteDomainFilter, PredicateFilter, VariableNameFilter};
pub use tracker::FlawTracker;
