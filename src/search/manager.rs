//! Flaw selection and choice initialisation.

use super::config::{DecisionConfig, TieBreak};
use super::decision::{Choice, DecisionPoint, Flaw};
use crate::domain::{Domain, Value};
use crate::error::{ConfigError, SearchError};
use crate::flaws::{FlawFilter, FlawTracker, InfiniteDomainFilter};
use crate::heuristics::{HeuristicsEngine, StateChoice};
use crate::network::VarId;
use crate::plan::{PlanDatabase, TokenId};
use std::cmp::Ordering;
use std::fmt::Write as _;
use tracing::debug;

/// Flaw categories scanned after the zero-commitment check, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Threats,
    OpenConditions,
    GuardedVariables,
    OtherVariables,
}

const STRATEGIES: [Strategy; 4] = [
    Strategy::Threats,
    Strategy::OpenConditions,
    Strategy::GuardedVariables,
    Strategy::OtherVariables,
];

#[derive(Debug, Clone, Copy)]
struct Candidate {
    flaw: Flaw,
    priority: f64,
    key: u64,
    choices: Option<usize>,
}

/// Picks the next flaw to resolve and builds its decision point.
#[derive(Debug)]
pub struct DecisionManager {
    tracker: FlawTracker,
    heuristics: HeuristicsEngine,
    config: DecisionConfig,
}

impl DecisionManager {
    pub fn new(
        db: &mut PlanDatabase,
        heuristics: HeuristicsEngine,
        config: DecisionConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_filters(db, heuristics, config, Vec::new())
    }

    /// Builds a manager over `filters`. With
    /// [`DecisionConfig::skip_unbounded`] an [`InfiniteDomainFilter`] is
    /// appended unless one is already present.
    pub fn with_filters(
        db: &mut PlanDatabase,
        heuristics: HeuristicsEngine,
        config: DecisionConfig,
        mut filters: Vec<Box<dyn FlawFilter>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let unbounded = InfiniteDomainFilter::new();
        if config.skip_unbounded && !filters.iter().any(|f| f.name() == unbounded.name()) {
            filters.push(Box::new(unbounded));
        }
        Ok(Self {
            tracker: FlawTracker::with_filters(db, filters),
            heuristics,
            config,
        })
    }

    pub fn tracker(&self) -> &FlawTracker {
        &self.tracker
    }

    /// Releases the tracker's event subscription.
    pub fn detach(self, db: &mut PlanDatabase) {
        self.tracker.detach(db);
    }

    pub fn heuristics(&self) -> &HeuristicsEngine {
        &self.heuristics
    }

    pub fn heuristics_mut(&mut self) -> &mut HeuristicsEngine {
        &mut self.heuristics
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Propagates, syncs the flaw sets, and returns the best flaw with its
    /// ordered choices. `Ok(None)` means no flaw remains.
    ///
    /// The network must be consistent after propagation; otherwise this
    /// returns [`SearchError::Inconsistent`].
    pub fn next_decision(&mut self, db: &mut PlanDatabase) -> Result<Option<DecisionPoint>, SearchError> {
        self.refresh(db)?;
        let Some(best) = self.select(db) else {
            debug!("no flaw left");
            return Ok(None);
        };
        let choices = self.init_choices(db, best.flaw);
        debug!(
            flaw = %best.flaw,
            priority = best.priority,
            choices = choices.len(),
            "flaw selected"
        );
        Ok(Some(DecisionPoint::new(best.flaw, best.key, best.priority, choices)))
    }

    fn refresh(&mut self, db: &mut PlanDatabase) -> Result<(), SearchError> {
        if !db.propagate() {
            return Err(SearchError::Inconsistent);
        }
        self.tracker.sync(db);
        Ok(())
    }

    fn select(&self, db: &PlanDatabase) -> Option<Candidate> {
        if let Some(c) = self.zero_commitment(db) {
            return Some(c);
        }
        let mut best: Option<Candidate> = None;
        for strategy in STRATEGIES {
            let flaws = self.candidates(db, strategy);
            if let Some(c) = self.best_candidate(db, best.as_ref(), flaws) {
                best = Some(c);
            }
            if best.is_some_and(|c| self.reached_best(c.priority)) {
                break;
            }
        }
        best
    }

    /// A unit guard costs nothing to bind; the first such variable wins.
    fn zero_commitment(&self, db: &PlanDatabase) -> Option<Candidate> {
        self.tracker
            .unit_variables()
            .iter()
            .find(|v| self.tracker.is_guard(**v) && self.tracker.passes_dynamic_variable(db, **v))
            .map(|v| {
                let flaw = Flaw::Variable(*v);
                Candidate {
                    flaw,
                    priority: self.priority(db, flaw),
                    key: flaw.key(db).unwrap_or(0),
                    choices: Some(1),
                }
            })
    }

    fn candidates(&self, db: &PlanDatabase, strategy: Strategy) -> Vec<Flaw> {
        match strategy {
            Strategy::Threats => self
                .tracker
                .threats(db)
                .into_iter()
                .map(Flaw::Threat)
                .collect(),
            Strategy::OpenConditions => self
                .tracker
                .open_conditions()
                .iter()
                .map(|t| Flaw::Token(*t))
                .collect(),
            Strategy::GuardedVariables => self
                .tracker
                .non_unit_variables()
                .iter()
                .filter(|v| self.tracker.is_guard(**v))
                .map(|v| Flaw::Variable(*v))
                .collect(),
            Strategy::OtherVariables => self
                .tracker
                .non_unit_variables()
                .iter()
                .filter(|v| !self.tracker.is_guard(**v))
                .map(|v| Flaw::Variable(*v))
                .collect(),
        }
    }

    fn reached_best(&self, priority: f64) -> bool {
        self.heuristics
            .advantage(self.heuristics.best_possible(), priority)
            <= self.config.epsilon
    }

    /// Best of `flaws`, or `None` when none beats `incumbent` by more than
    /// epsilon. Dynamic filters run only for flaws that would win.
    fn best_candidate(
        &self,
        db: &PlanDatabase,
        incumbent: Option<&Candidate>,
        flaws: Vec<Flaw>,
    ) -> Option<Candidate> {
        let eps = self.config.epsilon;
        let mut local: Option<Candidate> = None;
        for flaw in flaws {
            let priority = self.priority(db, flaw);
            if incumbent.is_some_and(|inc| self.heuristics.advantage(priority, inc.priority) <= eps) {
                continue;
            }
            let mut candidate = Candidate {
                flaw,
                priority,
                key: flaw.key(db).unwrap_or(0),
                choices: None,
            };
            let wins = match local.as_mut() {
                None => true,
                Some(current) => {
                    let advantage = self.heuristics.advantage(priority, current.priority);
                    if advantage > eps {
                        true
                    } else if advantage < -eps {
                        false
                    } else {
                        self.wins_tie(db, &mut candidate, current)
                    }
                }
            };
            if !wins || !self.passes_dynamic(db, flaw) {
                continue;
            }
            local = Some(candidate);
            if self.reached_best(priority) {
                break;
            }
        }
        local
    }

    fn wins_tie(&self, db: &PlanDatabase, candidate: &mut Candidate, current: &mut Candidate) -> bool {
        match self.config.tie_break {
            TieBreak::HigherKey => candidate.key > current.key,
            TieBreak::FewerChoices => {
                let a = *candidate
                    .choices
                    .get_or_insert_with(|| self.count_choices(db, candidate.flaw));
                let b = *current
                    .choices
                    .get_or_insert_with(|| self.count_choices(db, current.flaw));
                a < b || (a == b && candidate.key > current.key)
            }
        }
    }

    fn passes_dynamic(&self, db: &PlanDatabase, flaw: Flaw) -> bool {
        match flaw {
            Flaw::Variable(v) => self.tracker.passes_dynamic_variable(db, v),
            Flaw::Token(t) => self.tracker.passes_dynamic_token(db, t),
            // Threats arrive already filtered.
            Flaw::Threat(_) => true,
        }
    }

    fn priority(&self, db: &PlanDatabase, flaw: Flaw) -> f64 {
        match flaw {
            Flaw::Variable(v) => self.heuristics.variable_priority(db, v),
            Flaw::Token(t) => self.heuristics.token_priority(db, t),
            Flaw::Threat(t) => self.heuristics.threat_priority(db, t),
        }
    }

    // ---- choices ----

    fn candidate_values(&self, db: &PlanDatabase, var: VarId) -> Vec<Value> {
        let Some(domain) = db.engine().last_domain(var) else {
            return Vec::new();
        };
        if let Some(v) = domain.singleton_value() {
            return vec![v];
        }
        if self.enumerates(domain) {
            domain.values().unwrap_or_default()
        } else {
            bounds_values(domain)
        }
    }

    /// Small domains and every non-numeric domain are offered value by
    /// value; larger numeric ones only at their finite bounds.
    fn enumerates(&self, domain: &Domain) -> bool {
        match domain.size() {
            Some(n) => n <= self.config.max_value_choices || !domain.kind().is_numeric(),
            None => false,
        }
    }

    fn count_choices(&self, db: &PlanDatabase, flaw: Flaw) -> usize {
        match flaw {
            Flaw::Variable(v) => {
                let Some(domain) = db.engine().last_domain(v) else {
                    return 0;
                };
                match domain.size() {
                    Some(n) if self.enumerates(domain) => n,
                    _ => bounds_values(domain).len(),
                }
            }
            Flaw::Token(t) => self
                .heuristics
                .state_order(db, t)
                .into_iter()
                .map(|s| state_choices(db, t, s).len())
                .sum(),
            Flaw::Threat(t) => db.ordering_choices(t).len(),
        }
    }

    fn init_choices(&mut self, db: &PlanDatabase, flaw: Flaw) -> Vec<Choice> {
        match flaw {
            Flaw::Variable(v) => {
                let values = self.candidate_values(db, v);
                let values = if values.len() > 1 {
                    self.heuristics.order_values(db, v, values)
                } else {
                    values
                };
                values.into_iter().map(Choice::Value).collect()
            }
            Flaw::Token(t) => {
                let mut choices = Vec::new();
                for state in self.heuristics.state_order(db, t) {
                    if state == StateChoice::Merge {
                        let targets = db.compatible_tokens(t);
                        choices.extend(
                            self.heuristics
                                .order_merge_candidates(db, t, targets)
                                .into_iter()
                                .map(Choice::Merge),
                        );
                    } else {
                        choices.extend(state_choices(db, t, state));
                    }
                }
                choices
            }
            Flaw::Threat(t) => self
                .heuristics
                .order_placements(db, t, db.ordering_choices(t))
                .into_iter()
                .map(Choice::Ordering)
                .collect(),
        }
    }

    // ---- diagnostics ----

    /// Every open flaw passing the dynamic filters. Intended for tests and
    /// tracing; it evaluates all four categories.
    pub fn number_of_decisions(&mut self, db: &mut PlanDatabase) -> Result<usize, SearchError> {
        self.refresh(db)?;
        Ok(self.open_flaws(db).len())
    }

    /// One line per open flaw, best priority first, then higher key.
    pub fn format_open_decisions(&mut self, db: &mut PlanDatabase) -> Result<String, SearchError> {
        self.refresh(db)?;
        let mut flaws: Vec<(f64, u64, Flaw)> = self
            .open_flaws(db)
            .into_iter()
            .map(|f| (self.priority(db, f), f.key(db).unwrap_or(0), f))
            .collect();
        flaws.sort_by(|a, b| {
            let by_priority = if self.heuristics.advantage(a.0, b.0) > 0.0 {
                Ordering::Less
            } else if self.heuristics.advantage(b.0, a.0) > 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            };
            by_priority.then(b.1.cmp(&a.1))
        });
        let mut out = String::new();
        for (priority, key, flaw) in flaws {
            let _ = writeln!(out, "{priority:>10.3} #{key:<5} {}", describe(db, flaw));
        }
        Ok(out)
    }

    fn open_flaws(&self, db: &PlanDatabase) -> Vec<Flaw> {
        let vars = self
            .tracker
            .unit_variables()
            .iter()
            .chain(self.tracker.non_unit_variables())
            .filter(|v| self.tracker.passes_dynamic_variable(db, **v))
            .map(|v| Flaw::Variable(*v));
        let tokens = self
            .tracker
            .open_conditions()
            .iter()
            .filter(|t| self.tracker.passes_dynamic_token(db, **t))
            .map(|t| Flaw::Token(*t));
        let threats = self.tracker.threats(db).into_iter().map(Flaw::Threat);
        vars.chain(tokens).chain(threats).collect()
    }
}

fn bounds_values(domain: &Domain) -> Vec<Value> {
    let Some((lb, ub)) = domain.bounds() else {
        return Vec::new();
    };
    let mut values: Vec<Value> = [lb, ub]
        .into_iter()
        .filter(|x| x.is_finite())
        .map(Value::number)
        .collect();
    values.dedup();
    values
}

fn state_choices(db: &PlanDatabase, token: TokenId, state: StateChoice) -> Vec<Choice> {
    match state {
        StateChoice::Merge => db
            .compatible_tokens(token)
            .into_iter()
            .map(Choice::Merge)
            .collect(),
        StateChoice::Activate if db.can_activate(token) => vec![Choice::Activate],
        StateChoice::Reject if db.token(token).is_some_and(|t| t.is_rejectable()) => {
            vec![Choice::Reject]
        }
        _ => Vec::new(),
    }
}

fn describe(db: &PlanDatabase, flaw: Flaw) -> String {
    match flaw {
        Flaw::Variable(v) => match db.engine().variable(v) {
            Some(var) => match db.owner_token(v).and_then(|t| db.token(t)) {
                Some(t) => format!("variable {}.{} = {}", t.predicate(), var.name(), var.derived()),
                None => format!("variable {} = {}", var.name(), var.derived()),
            },
            None => format!("variable {v:?}"),
        },
        Flaw::Token(t) => match db.token(t) {
            Some(token) => format!("token {}", token.predicate()),
            None => format!("token {t:?}"),
        },
        Flaw::Threat(t) => match db.token(t) {
            Some(token) => format!("threat {}", token.predicate()),
            None => format!("threat {t:?}"),
        },
    }
}
