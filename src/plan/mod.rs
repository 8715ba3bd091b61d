//! Reference plan database.
//!
//! A minimal token/object model over the constraint network, providing
//! the query surface and mutation hooks the search layer drives:
//!
//! - [`Schema`]: predicate and type inheritance ([`SimpleSchema`])
//! - [`Token`]: predicate instance with timepoints, parameters, and an
//!   optional master relation ([`Relation`])
//! - [`Object`]: timelines (total order of tokens) and resources
//!   (capacity profiles)
//! - [`PlanDatabase`]: owns everything and publishes [`PlanEvent`]s
//!
//! [`PlanEvent`]: crate::network::PlanEvent

mod database;
mod object;
mod relation;
mod schema;
mod token;

pub use database::{PlanDatabase, DEFAULT_HORIZON};
pub use object::{Object, ObjectId, ObjectKind, OrderingChoice};
pub use relation::Relation;
pub use schema::{Schema, SimpleSchema};
pub use token::{NewToken, Token, TokenId, TokenState};
