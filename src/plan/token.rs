//! Tokens: predicate instances with a temporal extent.

use super::relation::Relation;
use crate::arena::Id;
use crate::domain::Domain;
use crate::network::{ConstraintId, ProfileId, VarId};

/// Handle of a [`Token`] in the plan database.
pub type TokenId = Id<Token>;

/// Lifecycle state of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenState {
    /// Proposed but not yet part of the plan (an open condition).
    Inactive,
    Active,
    /// Unified with an active token.
    Merged,
    Rejected,
}

impl TokenState {
    /// Whether constraints owned by a token in this state take effect.
    pub fn is_committed(self) -> bool {
        matches!(self, TokenState::Active | TokenState::Merged)
    }
}

/// A predicate instance.
///
/// Every token owns `start`, `end`, and `duration` timepoint variables
/// (linked by `start + duration = end`), an optional object variable, and
/// one variable per predicate parameter.
#[derive(Debug, Clone)]
pub struct Token {
    pub(crate) predicate: String,
    pub(crate) state: TokenState,
    pub(crate) start: VarId,
    pub(crate) end: VarId,
    pub(crate) duration: VarId,
    pub(crate) object: Option<VarId>,
    pub(crate) parameters: Vec<VarId>,
    pub(crate) master: Option<(TokenId, Relation)>,
    pub(crate) slaves: Vec<TokenId>,
    pub(crate) rejectable: bool,
    pub(crate) usage: f64,
    pub(crate) constraints: Vec<ConstraintId>,
    pub(crate) merged_into: Option<TokenId>,
    pub(crate) merge_constraints: Vec<ConstraintId>,
    pub(crate) contribution: Option<ProfileId>,
}

impl Token {
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn state(&self) -> TokenState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TokenState::Active
    }

    pub fn is_inactive(&self) -> bool {
        self.state == TokenState::Inactive
    }

    pub fn start(&self) -> VarId {
        self.start
    }

    pub fn end(&self) -> VarId {
        self.end
    }

    pub fn duration(&self) -> VarId {
        self.duration
    }

    pub fn object(&self) -> Option<VarId> {
        self.object
    }

    pub fn parameters(&self) -> &[VarId] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<VarId> {
        self.parameters.get(index).copied()
    }

    pub fn master(&self) -> Option<(TokenId, Relation)> {
        self.master
    }

    /// Relation to the master, `Relation::None` without one.
    pub fn master_relation(&self) -> Relation {
        self.master.map_or(Relation::None, |(_, r)| r)
    }

    pub fn slaves(&self) -> &[TokenId] {
        &self.slaves
    }

    pub fn is_rejectable(&self) -> bool {
        self.rejectable
    }

    pub fn usage(&self) -> f64 {
        self.usage
    }

    /// The token this one is merged onto.
    pub fn merged_into(&self) -> Option<TokenId> {
        self.merged_into
    }

    /// Every variable this token owns, timepoints first.
    pub fn variables(&self) -> Vec<VarId> {
        let mut vars = vec![self.start, self.end, self.duration];
        vars.extend(self.object);
        vars.extend(self.parameters.iter().copied());
        vars
    }
}

/// Arguments of [`PlanDatabase::create_token`](super::PlanDatabase::create_token).
///
/// # Examples
///
/// ```
/// use u_plansearch::domain::Domain;
/// use u_plansearch::plan::NewToken;
///
/// let request = NewToken::new("Move")
///     .with_parameter(Domain::symbols(["a", "b"]))
///     .with_duration(Domain::int_interval(5.0, 10.0))
///     .rejectable();
/// assert_eq!(request.predicate, "Move");
/// ```
#[derive(Debug, Clone)]
pub struct NewToken {
    pub predicate: String,
    pub parameters: Vec<Domain>,
    pub object_type: Option<String>,
    pub duration: Option<Domain>,
    pub master: Option<(TokenId, Relation)>,
    pub rejectable: bool,
    pub usage: f64,
}

impl NewToken {
    pub fn new(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            parameters: Vec::new(),
            object_type: None,
            duration: None,
            master: None,
            rejectable: false,
            usage: 1.0,
        }
    }

    pub fn with_parameter(mut self, domain: Domain) -> Self {
        self.parameters.push(domain);
        self
    }

    /// The token must be placed on an object of this type.
    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn with_duration(mut self, duration: Domain) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_master(mut self, master: TokenId, relation: Relation) -> Self {
        self.master = Some((master, relation));
        self
    }

    pub fn rejectable(mut self) -> Self {
        self.rejectable = true;
        self
    }

    /// Capacity consumed on a resource object.
    pub fn with_usage(mut self, usage: f64) -> Self {
        self.usage = usage;
        self
    }
}
