//! Constrained variables.

use super::constraint::ConstraintId;
use crate::arena::Id;
use crate::domain::Domain;
use crate::plan::{ObjectId, TokenId};

/// Handle of a [`Variable`] in the engine.
pub type VarId = Id<Variable>;

/// The entity whose lifecycle a variable follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Part of the global variable set.
    Global,
    Token(TokenId),
    Object(ObjectId),
}

/// A variable with base, specified, and derived domains.
///
/// `base ⊇ specified ⊇ derived` holds at every point after a completed
/// propagation. Only the engine mutates these domains.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    owner: Owner,
    pub(crate) base: Domain,
    pub(crate) specified: Domain,
    pub(crate) derived: Domain,
    can_be_specified: bool,
    pub(crate) constraints: Vec<ConstraintId>,
}

impl Variable {
    pub(crate) fn new(name: String, base: Domain, can_be_specified: bool, owner: Owner) -> Self {
        Self {
            name,
            owner,
            specified: base.clone(),
            derived: base.clone(),
            base,
            can_be_specified,
            constraints: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// The legal universe of the variable.
    pub fn base(&self) -> &Domain {
        &self.base
    }

    /// The externally chosen restriction.
    pub fn specified(&self) -> &Domain {
        &self.specified
    }

    /// Domain as of the last propagation step (may be stale while
    /// agendas are pending; see `ConstraintEngine::derived_domain`).
    pub fn derived(&self) -> &Domain {
        &self.derived
    }

    pub fn can_be_specified(&self) -> bool {
        self.can_be_specified
    }

    /// Whether the specified domain is a single value.
    pub fn is_specified(&self) -> bool {
        self.specified.is_singleton()
    }

    /// Constraints whose scope contains this variable.
    pub fn constraints(&self) -> &[ConstraintId] {
        &self.constraints
    }
}
