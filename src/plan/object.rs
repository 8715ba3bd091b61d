//! Objects tokens are placed on.

use super::token::TokenId;
use crate::arena::Id;
use crate::domain::Domain;
use crate::network::{ConstraintId, ProfileId, VarId};

/// Handle of an [`Object`] in the plan database.
pub type ObjectId = Id<Object>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectKind {
    /// Tokens on a timeline must be totally ordered.
    Timeline,
    /// Tokens share a capacity checked by a resource profile.
    Resource { capacity: f64, profile: ProfileId },
}

/// One `constrain` call on a timeline, kept for `free`.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub(crate) token: TokenId,
    pub(crate) predecessor: TokenId,
    pub(crate) successor: TokenId,
    pub(crate) constraints: Vec<ConstraintId>,
    /// Object variable specified by the placement, with its prior
    /// specified domain.
    pub(crate) specified: Option<(VarId, Domain)>,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) kind: ObjectKind,
    pub(crate) sequence: Vec<TokenId>,
    pub(crate) placements: Vec<Placement>,
}

impl Object {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn is_timeline(&self) -> bool {
        matches!(self.kind, ObjectKind::Timeline)
    }

    /// Tokens placed on a timeline, earliest first.
    pub fn sequence(&self) -> &[TokenId] {
        &self.sequence
    }

    pub fn is_sequenced(&self, token: TokenId) -> bool {
        self.sequence.contains(&token)
    }
}

/// A placement of a token relative to a neighbour on a timeline.
///
/// `predecessor == successor` places the only token of an empty timeline;
/// otherwise exactly one of the two is already sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderingChoice {
    pub object: ObjectId,
    pub predecessor: TokenId,
    pub successor: TokenId,
}
