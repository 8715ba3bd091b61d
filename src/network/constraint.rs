//! Constraints and the narrowing-rule seam.

use super::variable::VarId;
use crate::arena::Id;
use crate::domain::Domain;
use crate::plan::TokenId;
use std::fmt;

/// Handle of a [`Constraint`] in the engine.
pub type ConstraintId = Id<Constraint>;

/// Named propagator groups. Each owns one agenda; the derived `Ord` is
/// the fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropagatorKind {
    Default,
    Temporal,
    Resource,
}

impl PropagatorKind {
    /// All propagators in execution order.
    pub const ALL: [PropagatorKind; 3] = [
        PropagatorKind::Default,
        PropagatorKind::Temporal,
        PropagatorKind::Resource,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// A narrowing rule over an ordered scope of domains.
///
/// `execute` receives copies of the scope's derived domains (in scope
/// order) and may only remove values from them; the engine intersects
/// the result with the current domains, so a rule can never widen one.
///
/// # Examples
///
/// ```
/// use u_plansearch::domain::Domain;
/// use u_plansearch::network::ConstraintRule;
///
/// #[derive(Debug)]
/// struct Positive;
///
/// impl ConstraintRule for Positive {
///     fn name(&self) -> &str { "positive" }
///     fn arity(&self) -> Option<usize> { Some(1) }
///     fn execute(&self, scope: &mut [Domain]) {
///         scope[0].intersect_bounds(1.0, f64::INFINITY);
///     }
/// }
/// ```
pub trait ConstraintRule: fmt::Debug {
    /// Human-readable name.
    fn name(&self) -> &str;

    /// Propagator whose agenda schedules this rule.
    fn propagator(&self) -> PropagatorKind {
        PropagatorKind::Default
    }

    /// Required scope length, `None` for variadic rules.
    fn arity(&self) -> Option<usize> {
        None
    }

    /// Narrows the scope domains.
    fn execute(&self, scope: &mut [Domain]);

    /// Violation score charged in violation-tolerant mode.
    fn penalty(&self) -> f64 {
        1.0
    }
}

/// A constraint instance in the network.
#[derive(Debug)]
pub struct Constraint {
    pub(crate) rule: Box<dyn ConstraintRule>,
    pub(crate) scope: Vec<VarId>,
    pub(crate) owner: Option<TokenId>,
    pub(crate) active: bool,
    pub(crate) guards: Vec<VarId>,
    pub(crate) violated: bool,
}

impl Constraint {
    pub fn name(&self) -> &str {
        self.rule.name()
    }

    pub fn scope(&self) -> &[VarId] {
        &self.scope
    }

    /// Token whose activity gates this constraint.
    pub fn owner(&self) -> Option<TokenId> {
        self.owner
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Variables this rule-introduced constraint registers as guards.
    pub fn guards(&self) -> &[VarId] {
        &self.guards
    }

    /// Set while the constraint is suspended in violation-tolerant mode.
    pub fn is_violated(&self) -> bool {
        self.violated
    }

    pub fn propagator(&self) -> PropagatorKind {
        self.rule.propagator()
    }
}
