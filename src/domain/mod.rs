//! Value domains.
//!
//! A [`Domain`] is the current legal value set of a variable: an interval
//! (real or integer) or an enumeration (numeric, symbolic, boolean, object
//! references). Set algebra is total over current contents, and each
//! change is classified as a [`DomainEvent`] for subscribers.
//!
//! An empty domain is the defining condition of propagation failure. It is
//! never an error value: callers observe it through
//! `ConstraintEngine::propagate` returning `false`.

mod event;
mod types;
mod value;

pub use event::DomainEvent;
pub use types::{Domain, DomainKind};
pub use value::Value;
