//! Error types.
//!
//! Propagation inconsistency is deliberately absent here: an emptied domain
//! is reported as `false` from `propagate`, not as an error. The enums
//! below cover caller bugs (precondition violations), illegal plan
//! transitions, and configuration errors.

use crate::network::{ConstraintId, ProfileId, VarId};
use crate::plan::{ObjectId, TokenId, TokenState};
use thiserror::Error;

/// Errors from domain operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("{domain} does not intersect the base domain of `{variable}`")]
    NoIntersection { variable: String, domain: String },

    #[error("variable `{0}` cannot be specified")]
    NotSpecifiable(String),

    #[error("domain is closed")]
    Closed,
}

/// Errors from the constraint engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("unknown or deleted variable {0:?}")]
    UnknownVariable(VarId),

    #[error("unknown or deleted constraint {0:?}")]
    UnknownConstraint(ConstraintId),

    #[error("unknown resource profile {0:?}")]
    UnknownProfile(ProfileId),

    #[error("constraint `{rule}` expects {expected} variables, got {found}")]
    Arity {
        rule: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Errors from plan database operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),

    #[error("unknown or deleted token {0:?}")]
    UnknownToken(TokenId),

    #[error("unknown or deleted object {0:?}")]
    UnknownObject(ObjectId),

    #[error("predicate `{predicate}` takes {expected} parameters, got {found}")]
    ParameterCount {
        predicate: String,
        expected: usize,
        found: usize,
    },

    #[error("no object of type `{0}` exists")]
    NoObjects(String),

    #[error("cannot {action} token {token:?} in state {state:?}")]
    InvalidTransition {
        token: TokenId,
        state: TokenState,
        action: &'static str,
    },

    #[error("token {0:?} cannot be merged onto {1:?}")]
    Incompatible(TokenId, TokenId),

    #[error("cannot order {predecessor:?} before {successor:?} on object {object:?}")]
    InvalidOrdering {
        object: ObjectId,
        predecessor: TokenId,
        successor: TokenId,
    },

    #[error("token {token:?} is not sequenced on object {object:?}")]
    NotSequenced { token: TokenId, object: ObjectId },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<DomainError> for PlanError {
    fn from(e: DomainError) -> Self {
        PlanError::Engine(EngineError::Domain(e))
    }
}

/// Malformed heuristic rule; reported at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HeuristicError {
    #[error("unknown predicate `{0}` in heuristic rule")]
    UnknownPredicate(String),

    #[error("guard index {index} out of range for `{predicate}` ({arity} parameters)")]
    GuardIndexOutOfRange {
        predicate: String,
        index: usize,
        arity: usize,
    },

    #[error("priority {0} outside the legal range")]
    PriorityOutOfRange(f64),

    #[error("unsupported order keyword `{0}`")]
    UnsupportedOrder(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors from the decision layer. All are precondition violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("decision queried while the network is inconsistent")]
    Inconsistent,

    #[error("retract of a decision that was never committed")]
    NotCommitted,

    #[error("commit of a decision that is already committed")]
    AlreadyCommitted,

    #[error("decision has no remaining choices")]
    NoChoicesLeft,

    #[error("choice does not apply to this flaw")]
    InvalidChoice,

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<EngineError> for SearchError {
    fn from(e: EngineError) -> Self {
        SearchError::Plan(PlanError::Engine(e))
    }
}

impl From<DomainError> for SearchError {
    fn from(e: DomainError) -> Self {
        SearchError::Plan(PlanError::from(e))
    }
}
