//! Flaws, choices, and reversible decision points.

use crate::domain::{Domain, Value};
use crate::error::{EngineError, SearchError};
use crate::network::VarId;
use crate::plan::{ObjectId, OrderingChoice, PlanDatabase, TokenId};
use std::fmt;
use tracing::debug;

/// An unresolved aspect of a partial plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flaw {
    /// A decidable variable without a chosen value.
    Variable(VarId),
    /// An inactive token (open condition).
    Token(TokenId),
    /// An active token not yet placed on a timeline.
    Threat(TokenId),
}

impl Flaw {
    /// Stable identity key of the flawed entity.
    pub fn key(self, db: &PlanDatabase) -> Option<u64> {
        match self {
            Flaw::Variable(v) => db.engine().variable_key(v),
            Flaw::Token(t) | Flaw::Threat(t) => db.token_key(t),
        }
    }
}

impl fmt::Display for Flaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flaw::Variable(v) => write!(f, "variable {v:?}"),
            Flaw::Token(t) => write!(f, "token {t:?}"),
            Flaw::Threat(t) => write!(f, "threat {t:?}"),
        }
    }
}

/// One way of resolving a flaw.
#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    /// Specify the variable to this value.
    Value(Value),
    /// Merge the token onto this active token.
    Merge(TokenId),
    Activate,
    Reject,
    /// Place the token on a timeline.
    Ordering(OrderingChoice),
}

/// What retracting the committed choice must undo.
#[derive(Debug, Clone)]
enum Undo {
    Specify { var: VarId, prior: Domain },
    Activate(TokenId),
    Merge(TokenId),
    Reject(TokenId),
    Ordering { object: ObjectId, token: TokenId },
}

/// A flaw with its ordered choices and a cursor over them.
///
/// At most one choice is committed at a time. `commit` followed by
/// `retract` restores every domain and token state the commit touched.
#[derive(Debug, Clone)]
pub struct DecisionPoint {
    flaw: Flaw,
    key: u64,
    priority: f64,
    choices: Vec<Choice>,
    cursor: usize,
    committed: Option<Undo>,
}

impl DecisionPoint {
    pub(crate) fn new(flaw: Flaw, key: u64, priority: f64, choices: Vec<Choice>) -> Self {
        Self {
            flaw,
            key,
            priority,
            choices,
            cursor: 0,
            committed: None,
        }
    }

    pub fn flaw(&self) -> Flaw {
        self.flaw
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The choice under the cursor, `None` once exhausted.
    pub fn current_choice(&self) -> Option<&Choice> {
        self.choices.get(self.cursor)
    }

    /// Whether a choice remains after the current one.
    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.choices.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.choices.len()
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    pub fn is_variable_decision(&self) -> bool {
        matches!(self.flaw, Flaw::Variable(_))
    }

    pub fn is_token_decision(&self) -> bool {
        matches!(self.flaw, Flaw::Token(_))
    }

    pub fn is_object_decision(&self) -> bool {
        matches!(self.flaw, Flaw::Threat(_))
    }

    /// Moves the cursor to the next choice. Returns whether one remains.
    pub fn advance(&mut self) -> Result<bool, SearchError> {
        if self.committed.is_some() {
            return Err(SearchError::AlreadyCommitted);
        }
        if self.cursor < self.choices.len() {
            self.cursor += 1;
        }
        Ok(!self.is_exhausted())
    }

    /// Applies the current choice. Does not propagate.
    pub fn commit(&mut self, db: &mut PlanDatabase) -> Result<(), SearchError> {
        if self.committed.is_some() {
            return Err(SearchError::AlreadyCommitted);
        }
        let choice = self
            .choices
            .get(self.cursor)
            .cloned()
            .ok_or(SearchError::NoChoicesLeft)?;
        let undo = match (self.flaw, &choice) {
            (Flaw::Variable(var), Choice::Value(value)) => {
                let prior = db
                    .engine()
                    .variable(var)
                    .ok_or(EngineError::UnknownVariable(var))?
                    .specified()
                    .clone();
                db.engine_mut()
                    .specify(var, &Domain::singleton(value.clone()))?;
                Undo::Specify { var, prior }
            }
            (Flaw::Token(t), Choice::Activate) => {
                db.activate(t)?;
                Undo::Activate(t)
            }
            (Flaw::Token(t), Choice::Merge(target)) => {
                db.merge(t, *target)?;
                Undo::Merge(t)
            }
            (Flaw::Token(t), Choice::Reject) => {
                db.reject(t)?;
                Undo::Reject(t)
            }
            (Flaw::Threat(_), Choice::Ordering(ordering)) => {
                let token = db.constrain(*ordering)?;
                Undo::Ordering {
                    object: ordering.object,
                    token,
                }
            }
            _ => return Err(SearchError::InvalidChoice),
        };
        debug!(flaw = %self.flaw, choice = ?choice, index = self.cursor, "commit");
        self.committed = Some(undo);
        Ok(())
    }

    /// Undoes the committed choice. The cursor stays where it was.
    pub fn retract(&mut self, db: &mut PlanDatabase) -> Result<(), SearchError> {
        let undo = self.committed.take().ok_or(SearchError::NotCommitted)?;
        match undo {
            Undo::Specify { var, prior } => db.engine_mut().restore_specified(var, &prior)?,
            Undo::Activate(t) => db.deactivate(t)?,
            Undo::Merge(t) => db.split(t)?,
            Undo::Reject(t) => db.reinstate(t)?,
            Undo::Ordering { object, token } => db.free(object, token)?,
        }
        debug!(flaw = %self.flaw, index = self.cursor, "retract");
        Ok(())
    }
}
