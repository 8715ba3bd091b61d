//! Constraint network and propagation engine.
//!
//! Variables carry three domains (base, specified, derived); constraints
//! are narrowing rules over an ordered scope. The [`ConstraintEngine`]
//! schedules rules through one agenda per [`PropagatorKind`], detects
//! inconsistency as an emptied domain, and publishes every change as a
//! [`PlanEvent`] to named subscribers.
//!
//! New narrowing rules plug in through the [`ConstraintRule`] trait; the
//! built-in library covers equality, ordering, linear arithmetic, and
//! temporal distance. Capacity checks run through [`ResourceProfile`]
//! aggregates validated after each fixpoint.

mod config;
mod constraint;
mod engine;
mod events;
mod resource;
mod rules;
mod variable;

pub use config::EngineConfig;
pub use constraint::{Constraint, ConstraintId, ConstraintRule, PropagatorKind};
pub use engine::ConstraintEngine;
pub use events::{EventBus, PlanEvent, SubscriberId};
pub use resource::{Contribution, ProfileId, ResourceProfile};
pub use rules::{AddEqual, Equal, LessThan, LessThanEqual, MemberOf, NotEqual, TemporalDistance};
pub use variable::{Owner, VarId, Variable};
