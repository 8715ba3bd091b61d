//! Heuristic rule records.

use crate::domain::Value;
use crate::error::HeuristicError;
use crate::plan::Relation;
use std::fmt;
use std::str::FromStr;

/// Separates specificity classes: `WEIGHT_BASE > MAX_PRIORITY`.
pub const WEIGHT_BASE: f64 = 100_000.0;

/// Largest legal priority.
pub const MAX_PRIORITY: f64 = 99_999.0;

/// Smallest legal priority.
pub const MIN_PRIORITY: f64 = 0.0;

/// What kind of flaw a rule scores.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleTarget {
    /// Open conditions (inactive tokens).
    Token,
    /// Variables with this name.
    Variable(String),
    /// Tokens waiting for a timeline placement.
    Threat,
}

/// Requires parameter `index` to be bound to `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueGuard {
    pub index: usize,
    pub value: Value,
}

/// Requires a master token in a compatible relation.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterGuard {
    pub predicate: Option<String>,
    pub relation: Relation,
    pub guards: Vec<ValueGuard>,
}

/// How a variable's values are ordered.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueOrder {
    Ascending,
    Descending,
    /// Preferred values first; values outside the list are dropped.
    Explicit(Vec<Value>),
    /// Seeded shuffle.
    Random,
}

/// Outcome of resolving an open condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateChoice {
    Merge,
    Activate,
    Reject,
}

/// Sort key for merge candidates and timeline placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CandidateOrder {
    /// Closest midpoint to the reference token first.
    Near,
    /// Farthest midpoint first.
    Far,
    /// Earliest start first.
    Early,
    /// Latest earliest start first.
    Late,
}

impl FromStr for ValueOrder {
    type Err = HeuristicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(ValueOrder::Ascending),
            "descending" | "desc" => Ok(ValueOrder::Descending),
            "random" => Ok(ValueOrder::Random),
            _ => Err(HeuristicError::UnsupportedOrder(s.to_string())),
        }
    }
}

impl FromStr for StateChoice {
    type Err = HeuristicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merge" => Ok(StateChoice::Merge),
            "activate" => Ok(StateChoice::Activate),
            "reject" => Ok(StateChoice::Reject),
            _ => Err(HeuristicError::UnsupportedOrder(s.to_string())),
        }
    }
}

impl FromStr for CandidateOrder {
    type Err = HeuristicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "near" => Ok(CandidateOrder::Near),
            "far" => Ok(CandidateOrder::Far),
            "early" => Ok(CandidateOrder::Early),
            "late" => Ok(CandidateOrder::Late),
            _ => Err(HeuristicError::UnsupportedOrder(s.to_string())),
        }
    }
}

impl fmt::Display for StateChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateChoice::Merge => "merge",
            StateChoice::Activate => "activate",
            StateChoice::Reject => "reject",
        })
    }
}

/// Whether a token whose master relation is `actual` satisfies a rule
/// requiring `guard`.
///
/// # Examples
///
/// ```
/// use u_plansearch::heuristics::can_match;
/// use u_plansearch::plan::Relation;
///
/// assert!(can_match(Relation::Meets, Relation::Before));
/// assert!(can_match(Relation::None, Relation::DontCare));
/// assert!(!can_match(Relation::None, Relation::Any));
/// assert!(!can_match(Relation::After, Relation::Other));
/// ```
pub fn can_match(actual: Relation, guard: Relation) -> bool {
    use Relation::*;
    if actual == guard {
        return true;
    }
    match guard {
        Any => actual != None,
        DontCare => true,
        Other => !matches!(actual, None | Before | After),
        Before => actual == Meets,
        After => actual == MetBy,
        _ => false,
    }
}

/// A parsed heuristic rule.
///
/// # Examples
///
/// ```
/// use u_plansearch::domain::Value;
/// use u_plansearch::heuristics::{HeuristicRule, WEIGHT_BASE};
/// use u_plansearch::plan::Relation;
///
/// let rule = HeuristicRule::token("Drive")
///     .with_priority(10.0)
///     .with_guard(0, Value::symbol("rock"))
///     .with_master("Mission", Relation::Before)
///     .with_master_guard(0, Value::number(1.0));
/// assert_eq!(rule.guard_count(), 2);
/// assert_eq!(rule.weight(false), 4.0 * WEIGHT_BASE + 10.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicRule {
    pub target: RuleTarget,
    pub predicate: Option<String>,
    pub guards: Vec<ValueGuard>,
    pub master: Option<MasterGuard>,
    pub priority: f64,
    pub value_order: Option<ValueOrder>,
    pub state_order: Vec<StateChoice>,
    pub candidate_order: Vec<CandidateOrder>,
    pub default_compatibility: bool,
}

impl HeuristicRule {
    fn new(target: RuleTarget, predicate: Option<String>) -> Self {
        Self {
            target,
            predicate,
            guards: Vec::new(),
            master: None,
            priority: MIN_PRIORITY,
            value_order: None,
            state_order: Vec::new(),
            candidate_order: Vec::new(),
            default_compatibility: false,
        }
    }

    /// Rule for open conditions of `predicate`.
    pub fn token(predicate: impl Into<String>) -> Self {
        Self::new(RuleTarget::Token, Some(predicate.into()))
    }

    /// Rule for threats on tokens of `predicate`.
    pub fn threat(predicate: impl Into<String>) -> Self {
        Self::new(RuleTarget::Threat, Some(predicate.into()))
    }

    /// Rule for the variable `name` of tokens of `predicate`.
    pub fn variable(predicate: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(RuleTarget::Variable(name.into()), Some(predicate.into()))
    }

    /// Rule for any variable called `name`, including globals.
    pub fn any_variable(name: impl Into<String>) -> Self {
        Self::new(RuleTarget::Variable(name.into()), None)
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_guard(mut self, index: usize, value: Value) -> Self {
        self.guards.push(ValueGuard { index, value });
        self
    }

    pub fn with_master(mut self, predicate: impl Into<String>, relation: Relation) -> Self {
        self.master = Some(MasterGuard {
            predicate: Some(predicate.into()),
            relation,
            guards: Vec::new(),
        });
        self
    }

    /// Requires only the master relation, whatever the master's predicate.
    pub fn with_master_relation(mut self, relation: Relation) -> Self {
        self.master = Some(MasterGuard {
            predicate: None,
            relation,
            guards: Vec::new(),
        });
        self
    }

    /// Adds a guard on the master's parameters. Ignored without a master.
    pub fn with_master_guard(mut self, index: usize, value: Value) -> Self {
        if let Some(m) = self.master.as_mut() {
            m.guards.push(ValueGuard { index, value });
        }
        self
    }

    pub fn with_value_order(mut self, order: ValueOrder) -> Self {
        self.value_order = Some(order);
        self
    }

    pub fn with_state_order(mut self, order: Vec<StateChoice>) -> Self {
        self.state_order = order;
        self
    }

    pub fn with_candidate_order(mut self, order: Vec<CandidateOrder>) -> Self {
        self.candidate_order = order;
        self
    }

    /// Lets the rule match a token through its master as well.
    pub fn default_compatibility(mut self) -> Self {
        self.default_compatibility = true;
        self
    }

    /// Value guards plus guards on the master's parameters.
    pub fn guard_count(&self) -> usize {
        self.guards.len() + self.master.as_ref().map_or(0, |m| m.guards.len())
    }

    /// `|±(2 + guards) * WEIGHT_BASE + priority|`, negative sign when
    /// lower priorities are preferred.
    pub fn weight(&self, prefer_low: bool) -> f64 {
        let sign = if prefer_low { -1.0 } else { 1.0 };
        (sign * (2.0 + self.guard_count() as f64) * WEIGHT_BASE + self.priority).abs()
    }
}
