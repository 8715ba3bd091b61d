//! Rule lookup, flaw priorities, and choice ordering.

use super::config::HeuristicsConfig;
use super::rule::{
    can_match, CandidateOrder, HeuristicRule, MasterGuard, RuleTarget, StateChoice, ValueGuard,
    ValueOrder, MAX_PRIORITY, MIN_PRIORITY,
};
use crate::domain::{Domain, Value};
use crate::error::{ConfigError, HeuristicError};
use crate::network::VarId;
use crate::plan::{OrderingChoice, PlanDatabase, Relation, Schema, Token, TokenId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

const DEFAULT_STATE_ORDER: [StateChoice; 3] =
    [StateChoice::Merge, StateChoice::Activate, StateChoice::Reject];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlawKind {
    Token,
    Variable,
    Threat,
}

/// Scores flaws and orders their choices from a set of rules.
///
/// Rules are indexed by predicate. A flaw is scored by the matching rule
/// of largest weight (the last registered on ties); rules without a
/// predicate and default-compatibility rules are consulted only when no
/// indexed rule matches. Unmatched flaws get the configured default
/// priority of their kind.
#[derive(Debug)]
pub struct HeuristicsEngine {
    config: HeuristicsConfig,
    rules: Vec<HeuristicRule>,
    by_predicate: HashMap<String, Vec<usize>>,
    fallback: Vec<usize>,
    rng: StdRng,
}

impl HeuristicsEngine {
    pub fn new(config: HeuristicsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        Ok(Self {
            config,
            rules: Vec::new(),
            by_predicate: HashMap::new(),
            fallback: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn config(&self) -> &HeuristicsConfig {
        &self.config
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }

    /// Validates every rule, then registers them all. Nothing is
    /// registered when any rule is rejected.
    pub fn load_rules(
        &mut self,
        schema: &dyn Schema,
        rules: Vec<HeuristicRule>,
    ) -> Result<(), HeuristicError> {
        for rule in &rules {
            if let Err(e) = validate_rule(schema, rule) {
                warn!(error = %e, "heuristic rule set rejected");
                return Err(e);
            }
        }
        let count = rules.len();
        for rule in rules {
            self.register(rule);
        }
        debug!(rules = count, total = self.rules.len(), "heuristic rules loaded");
        Ok(())
    }

    pub fn add_rule(&mut self, schema: &dyn Schema, rule: HeuristicRule) -> Result<(), HeuristicError> {
        self.load_rules(schema, vec![rule])
    }

    fn register(&mut self, rule: HeuristicRule) {
        let index = self.rules.len();
        match (&rule.predicate, rule.default_compatibility) {
            (Some(p), false) => self.by_predicate.entry(p.clone()).or_default().push(index),
            _ => self.fallback.push(index),
        }
        self.rules.push(rule);
    }

    // ---- matching ----

    fn best_rule(
        &self,
        db: &PlanDatabase,
        kind: FlawKind,
        token: Option<TokenId>,
        var_name: Option<&str>,
    ) -> Option<&HeuristicRule> {
        let mut best: Option<(f64, usize)> = None;
        if let Some(t) = token.and_then(|t| db.token(t)) {
            let mut current = Some(t.predicate());
            while let Some(p) = current {
                for &i in self.by_predicate.get(p).into_iter().flatten() {
                    self.consider(db, i, kind, token, var_name, &mut best);
                }
                current = db.schema().parent(p);
            }
        }
        if best.is_none() {
            for &i in &self.fallback {
                self.consider(db, i, kind, token, var_name, &mut best);
            }
        }
        best.and_then(|(_, i)| self.rules.get(i))
    }

    fn consider(
        &self,
        db: &PlanDatabase,
        index: usize,
        kind: FlawKind,
        token: Option<TokenId>,
        var_name: Option<&str>,
        best: &mut Option<(f64, usize)>,
    ) {
        let Some(rule) = self.rules.get(index) else {
            return;
        };
        let target_ok = match (&rule.target, kind) {
            (RuleTarget::Token, FlawKind::Token) | (RuleTarget::Threat, FlawKind::Threat) => true,
            (RuleTarget::Variable(name), FlawKind::Variable) => var_name == Some(name.as_str()),
            _ => false,
        };
        if !target_ok || !self.rule_matches(db, rule, token) {
            return;
        }
        let weight = rule.weight(self.config.prefer_low_priority);
        if best.is_none_or(|(w, i)| weight > w || (weight == w && index > i)) {
            *best = Some((weight, index));
        }
    }

    fn rule_matches(&self, db: &PlanDatabase, rule: &HeuristicRule, token: Option<TokenId>) -> bool {
        let Some(t) = token else {
            return rule.predicate.is_none()
                && rule.guards.is_empty()
                && rule
                    .master
                    .as_ref()
                    .is_none_or(|m| can_match(Relation::None, m.relation) && m.guards.is_empty());
        };
        if rule.default_compatibility {
            let Some(tok) = db.token(t) else {
                return false;
            };
            if let Some(p) = &rule.predicate {
                if !db.schema().is_a(tok.predicate(), p) {
                    return tok
                        .master()
                        .is_some_and(|(m, _)| matches_token(db, rule, m));
                }
            }
        }
        matches_token(db, rule, t)
    }

    // ---- priorities ----

    pub fn rule_for_variable(&self, db: &PlanDatabase, var: VarId) -> Option<&HeuristicRule> {
        let name = db.engine().variable(var)?.name();
        self.best_rule(db, FlawKind::Variable, db.owner_token(var), Some(name))
    }

    pub fn rule_for_token(&self, db: &PlanDatabase, token: TokenId) -> Option<&HeuristicRule> {
        self.best_rule(db, FlawKind::Token, Some(token), None)
    }

    pub fn rule_for_threat(&self, db: &PlanDatabase, token: TokenId) -> Option<&HeuristicRule> {
        self.best_rule(db, FlawKind::Threat, Some(token), None)
    }

    pub fn variable_priority(&self, db: &PlanDatabase, var: VarId) -> f64 {
        self.rule_for_variable(db, var)
            .map_or(self.config.default_variable_priority, |r| r.priority)
    }

    pub fn token_priority(&self, db: &PlanDatabase, token: TokenId) -> f64 {
        self.rule_for_token(db, token)
            .map_or(self.config.default_token_priority, |r| r.priority)
    }

    pub fn threat_priority(&self, db: &PlanDatabase, token: TokenId) -> f64 {
        self.rule_for_threat(db, token)
            .map_or(self.config.default_threat_priority, |r| r.priority)
    }

    pub fn best_possible(&self) -> f64 {
        self.config.best_possible()
    }

    /// How much better `candidate` is than `incumbent`; positive when it
    /// is better under the configured preference.
    pub fn advantage(&self, candidate: f64, incumbent: f64) -> f64 {
        if self.config.prefer_low_priority {
            incumbent - candidate
        } else {
            candidate - incumbent
        }
    }

    // ---- ordering ----

    /// Orders the allowed values of a variable. Without a matching value
    /// order the values are sorted ascending.
    pub fn order_values(&mut self, db: &PlanDatabase, var: VarId, mut values: Vec<Value>) -> Vec<Value> {
        let order = self
            .rule_for_variable(db, var)
            .and_then(|r| r.value_order.clone())
            .unwrap_or(ValueOrder::Ascending);
        match order {
            ValueOrder::Ascending => values.sort_by(|a, b| compare_values(db, a, b)),
            ValueOrder::Descending => values.sort_by(|a, b| compare_values(db, b, a)),
            ValueOrder::Explicit(list) => {
                let mut preferred: Vec<Value> = Vec::with_capacity(list.len());
                for v in list {
                    let Some(allowed) = values.iter().find(|x| same_value(db, x, &v)) else {
                        continue;
                    };
                    if !preferred.iter().any(|p| same_value(db, p, allowed)) {
                        preferred.push(allowed.clone());
                    }
                }
                values = preferred;
            }
            ValueOrder::Random => {
                values.sort_by(|a, b| compare_values(db, a, b));
                values.shuffle(&mut self.rng);
            }
        }
        values
    }

    /// States to try for an open condition, in order.
    pub fn state_order(&self, db: &PlanDatabase, token: TokenId) -> Vec<StateChoice> {
        self.rule_for_token(db, token)
            .filter(|r| !r.state_order.is_empty())
            .map_or_else(|| DEFAULT_STATE_ORDER.to_vec(), |r| r.state_order.clone())
    }

    /// Orders merge targets for `token`.
    pub fn order_merge_candidates(
        &self,
        db: &PlanDatabase,
        token: TokenId,
        candidates: Vec<TokenId>,
    ) -> Vec<TokenId> {
        let orders = self
            .rule_for_token(db, token)
            .map(|r| r.candidate_order.as_slice())
            .unwrap_or(&[]);
        sort_candidates(db, token, orders, candidates, |c| *c)
    }

    /// Orders timeline placements for a threatened `token`, weighing each
    /// placement by the neighbour it is placed against.
    pub fn order_placements(
        &self,
        db: &PlanDatabase,
        token: TokenId,
        choices: Vec<OrderingChoice>,
    ) -> Vec<OrderingChoice> {
        let orders = self
            .rule_for_threat(db, token)
            .map(|r| r.candidate_order.as_slice())
            .unwrap_or(&[]);
        sort_candidates(db, token, orders, choices, |c| {
            if c.predecessor != token {
                c.predecessor
            } else {
                c.successor
            }
        })
    }
}

fn validate_rule(schema: &dyn Schema, rule: &HeuristicRule) -> Result<(), HeuristicError> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&rule.priority) {
        return Err(HeuristicError::PriorityOutOfRange(rule.priority));
    }
    match &rule.predicate {
        Some(p) => check_guards(schema, p, &rule.guards)?,
        None if !rule.guards.is_empty() => {
            return Err(HeuristicError::InvalidRule("value guards need a predicate".into()));
        }
        None if rule.default_compatibility => {
            return Err(HeuristicError::InvalidRule(
                "default compatibility needs a predicate".into(),
            ));
        }
        None => {}
    }
    if let Some(MasterGuard { predicate, guards, .. }) = &rule.master {
        match predicate {
            Some(p) => check_guards(schema, p, guards)?,
            None if !guards.is_empty() => {
                return Err(HeuristicError::InvalidRule(
                    "master guards need a master predicate".into(),
                ));
            }
            None => {}
        }
    }
    let is_variable = matches!(rule.target, RuleTarget::Variable(_));
    if rule.value_order.is_some() && !is_variable {
        return Err(HeuristicError::InvalidRule("value order on a non-variable rule".into()));
    }
    if !rule.state_order.is_empty() && rule.target != RuleTarget::Token {
        return Err(HeuristicError::InvalidRule("state order on a non-token rule".into()));
    }
    if !rule.candidate_order.is_empty() && is_variable {
        return Err(HeuristicError::InvalidRule("candidate order on a variable rule".into()));
    }
    Ok(())
}

fn check_guards(schema: &dyn Schema, predicate: &str, guards: &[ValueGuard]) -> Result<(), HeuristicError> {
    let arity = schema
        .parameter_count(predicate)
        .filter(|_| schema.is_predicate(predicate))
        .ok_or_else(|| HeuristicError::UnknownPredicate(predicate.to_string()))?;
    match guards.iter().find(|g| g.index >= arity) {
        Some(g) => Err(HeuristicError::GuardIndexOutOfRange {
            predicate: predicate.to_string(),
            index: g.index,
            arity,
        }),
        None => Ok(()),
    }
}

fn matches_token(db: &PlanDatabase, rule: &HeuristicRule, id: TokenId) -> bool {
    let Some(token) = db.token(id) else {
        return false;
    };
    if let Some(p) = &rule.predicate {
        if !db.schema().is_a(token.predicate(), p) {
            return false;
        }
    }
    guards_hold(db, token, &rule.guards) && master_holds(db, token, rule.master.as_ref())
}

fn guards_hold(db: &PlanDatabase, token: &Token, guards: &[ValueGuard]) -> bool {
    guards.iter().all(|g| {
        token
            .parameter(g.index)
            .and_then(|v| db.engine().last_domain(v))
            .and_then(Domain::singleton_value)
            .is_some_and(|v| v == g.value)
    })
}

fn master_holds(db: &PlanDatabase, token: &Token, guard: Option<&MasterGuard>) -> bool {
    let Some(g) = guard else {
        return true;
    };
    match token.master() {
        None => can_match(Relation::None, g.relation) && g.guards.is_empty(),
        Some((m, relation)) => {
            can_match(relation, g.relation)
                && db.token(m).is_some_and(|master| {
                    g.predicate
                        .as_deref()
                        .is_none_or(|p| db.schema().is_a(master.predicate(), p))
                        && guards_hold(db, master, &g.guards)
                })
        }
    }
}

/// Objects compare by their stable key, everything else by value.
fn compare_values(db: &PlanDatabase, a: &Value, b: &Value) -> Ordering {
    match (a.as_object(), b.as_object()) {
        (Some(x), Some(y)) => db.object_key(x).cmp(&db.object_key(y)),
        _ => a.cmp(b),
    }
}

/// Objects are identified by their stable key; a stale object matches
/// nothing.
fn same_value(db: &PlanDatabase, a: &Value, b: &Value) -> bool {
    match (a.as_object(), b.as_object()) {
        (Some(x), Some(y)) => db.object_key(x).is_some_and(|k| db.object_key(y) == Some(k)),
        _ => a == b,
    }
}

fn sort_candidates<T>(
    db: &PlanDatabase,
    token: TokenId,
    orders: &[CandidateOrder],
    items: Vec<T>,
    anchor: impl Fn(&T) -> TokenId,
) -> Vec<T> {
    if orders.is_empty() || items.len() < 2 {
        return items;
    }
    let reference = db
        .token(token)
        .and_then(Token::master)
        .map_or(token, |(m, _)| m);
    let mid_ref = db.midpoint(reference);
    let mut keyed: Vec<(Vec<f64>, T)> = items
        .into_iter()
        .map(|item| {
            let a = anchor(&item);
            let key = orders
                .iter()
                .map(|o| match o {
                    CandidateOrder::Near => (db.midpoint(a) - mid_ref).abs(),
                    CandidateOrder::Far => -(db.midpoint(a) - mid_ref).abs(),
                    CandidateOrder::Early => db.earliest_start(a),
                    CandidateOrder::Late => -db.earliest_start(a),
                })
                .collect();
            (key, item)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    keyed.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{NewToken, SimpleSchema};

    fn db() -> PlanDatabase {
        let mut schema = SimpleSchema::new();
        schema
            .add_predicate("Mission", None, &["site"])
            .add_predicate("Drive", None, &["target", "speed"])
            .add_predicate("FastDrive", Some("Drive"), &[]);
        PlanDatabase::new(schema)
    }

    fn engine() -> HeuristicsEngine {
        HeuristicsEngine::new(HeuristicsConfig::default().with_seed(42)).unwrap()
    }

    fn drive(db: &mut PlanDatabase, predicate: &str) -> TokenId {
        db.create_token(
            NewToken::new(predicate)
                .with_parameter(Domain::symbols(["rock", "sand"]))
                .with_parameter(Domain::int_interval(1.0, 5.0)),
        )
        .unwrap()
    }

    fn bind(db: &mut PlanDatabase, var: VarId, value: Value) {
        db.engine_mut().specify(var, &Domain::singleton(value)).unwrap();
        assert!(db.propagate());
    }

    #[test]
    fn test_load_rejects_malformed_rules() {
        let db = db();
        let mut h = engine();
        let schema = db.schema();
        assert_eq!(
            h.add_rule(schema, HeuristicRule::token("Fly")),
            Err(HeuristicError::UnknownPredicate("Fly".into()))
        );
        assert!(matches!(
            h.add_rule(schema, HeuristicRule::token("Drive").with_guard(2, Value::number(1.0))),
            Err(HeuristicError::GuardIndexOutOfRange { index: 2, arity: 2, .. })
        ));
        assert_eq!(
            h.add_rule(schema, HeuristicRule::token("Drive").with_priority(1e6)),
            Err(HeuristicError::PriorityOutOfRange(1e6))
        );
        assert!(matches!(
            h.add_rule(
                schema,
                HeuristicRule::token("Drive").with_value_order(ValueOrder::Descending)
            ),
            Err(HeuristicError::InvalidRule(_))
        ));
        assert!(h.rules().is_empty());
    }

    #[test]
    fn test_load_is_all_or_nothing() {
        let db = db();
        let mut h = engine();
        let rules = vec![
            HeuristicRule::token("Drive").with_priority(5.0),
            HeuristicRule::token("Drive").with_guard(9, Value::number(0.0)),
        ];
        assert!(h.load_rules(db.schema(), rules).is_err());
        assert!(h.rules().is_empty());
    }

    #[test]
    fn test_guarded_rule_wins_when_bound() {
        let mut db = db();
        let mut h = engine();
        h.load_rules(
            db.schema(),
            vec![
                HeuristicRule::token("Drive").with_priority(50.0),
                HeuristicRule::token("Drive")
                    .with_priority(80.0)
                    .with_guard(0, Value::symbol("rock")),
            ],
        )
        .unwrap();
        let t = drive(&mut db, "Drive");
        assert_eq!(h.token_priority(&db, t), 50.0);

        let target = db.token(t).unwrap().parameter(0).unwrap();
        bind(&mut db, target, Value::symbol("rock"));
        assert_eq!(h.token_priority(&db, t), 80.0);

        let mission = db
            .create_token(NewToken::new("Mission").with_parameter(Domain::symbols(["a"])))
            .unwrap();
        assert_eq!(h.token_priority(&db, mission), 20_000.0);
        assert_eq!(h.threat_priority(&db, t), 10_000.0);
    }

    #[test]
    fn test_rules_apply_to_descendant_predicates() {
        let mut db = db();
        let mut h = engine();
        h.add_rule(db.schema(), HeuristicRule::token("Drive").with_priority(7.0))
            .unwrap();
        let t = drive(&mut db, "FastDrive");
        assert_eq!(h.token_priority(&db, t), 7.0);
    }

    #[test]
    fn test_equal_weights_go_to_last_registered() {
        let mut db = db();
        let mut h = engine();
        h.load_rules(
            db.schema(),
            vec![
                HeuristicRule::token("Drive")
                    .with_priority(5.0)
                    .with_state_order(vec![StateChoice::Reject]),
                HeuristicRule::token("Drive")
                    .with_priority(5.0)
                    .with_state_order(vec![StateChoice::Activate]),
            ],
        )
        .unwrap();
        let t = drive(&mut db, "Drive");
        assert_eq!(h.state_order(&db, t), vec![StateChoice::Activate]);

        let mission = db
            .create_token(NewToken::new("Mission").with_parameter(Domain::symbols(["a"])))
            .unwrap();
        assert_eq!(h.state_order(&db, mission), DEFAULT_STATE_ORDER.to_vec());
    }

    #[test]
    fn test_default_compatibility_matches_through_master() {
        let mut db = db();
        let mut h = engine();
        h.add_rule(
            db.schema(),
            HeuristicRule::token("Mission")
                .with_priority(9.0)
                .default_compatibility(),
        )
        .unwrap();
        let mission = db
            .create_token(NewToken::new("Mission").with_parameter(Domain::symbols(["a"])))
            .unwrap();
        let t = db
            .create_token(
                NewToken::new("Drive")
                    .with_parameter(Domain::symbols(["rock"]))
                    .with_parameter(Domain::int_interval(1.0, 5.0))
                    .with_master(mission, Relation::Before),
            )
            .unwrap();
        assert_eq!(h.token_priority(&db, mission), 9.0);
        assert_eq!(h.token_priority(&db, t), 9.0);

        // An indexed rule takes over once one matches.
        h.add_rule(db.schema(), HeuristicRule::token("Drive").with_priority(3.0))
            .unwrap();
        assert_eq!(h.token_priority(&db, t), 3.0);
    }

    #[test]
    fn test_master_guard_matching() {
        let mut db = db();
        let mut h = engine();
        h.load_rules(
            db.schema(),
            vec![
                HeuristicRule::token("Drive").with_priority(40.0),
                HeuristicRule::token("Drive")
                    .with_priority(60.0)
                    .with_master("Mission", Relation::Before)
                    .with_master_guard(0, Value::symbol("crater")),
            ],
        )
        .unwrap();
        let mission = db
            .create_token(NewToken::new("Mission").with_parameter(Domain::symbols(["crater", "ridge"])))
            .unwrap();
        let t = db
            .create_token(
                NewToken::new("Drive")
                    .with_parameter(Domain::symbols(["rock"]))
                    .with_parameter(Domain::int_interval(1.0, 5.0))
                    .with_master(mission, Relation::Meets),
            )
            .unwrap();
        assert_eq!(h.token_priority(&db, t), 40.0);

        let site = db.token(mission).unwrap().parameter(0).unwrap();
        bind(&mut db, site, Value::symbol("crater"));
        assert_eq!(h.token_priority(&db, t), 60.0);

        let orphan = drive(&mut db, "Drive");
        assert_eq!(h.token_priority(&db, orphan), 40.0);
    }

    #[test]
    fn test_variable_rules_match_by_name() {
        let mut db = db();
        let mut h = engine();
        h.load_rules(
            db.schema(),
            vec![
                HeuristicRule::variable("Drive", "speed").with_priority(12.0),
                HeuristicRule::any_variable("budget").with_priority(3.0),
            ],
        )
        .unwrap();
        let t = drive(&mut db, "Drive");
        let target = db.token(t).unwrap().parameter(0).unwrap();
        let speed = db.token(t).unwrap().parameter(1).unwrap();
        let budget = db.create_global_variable("budget", Domain::int_interval(0.0, 9.0), true);
        assert_eq!(h.variable_priority(&db, speed), 12.0);
        assert_eq!(h.variable_priority(&db, target), 30_000.0);
        assert_eq!(h.variable_priority(&db, budget), 3.0);
    }

    #[test]
    fn test_value_orders() {
        let mut db = db();
        let mut h = engine();
        let t = drive(&mut db, "Drive");
        let speed = db.token(t).unwrap().parameter(1).unwrap();
        let nums = |xs: &[f64]| xs.iter().map(|x| Value::number(*x)).collect::<Vec<_>>();

        assert_eq!(h.order_values(&db, speed, nums(&[3.0, 1.0, 2.0])), nums(&[1.0, 2.0, 3.0]));

        h.add_rule(
            db.schema(),
            HeuristicRule::variable("Drive", "speed").with_value_order(ValueOrder::Descending),
        )
        .unwrap();
        assert_eq!(h.order_values(&db, speed, nums(&[3.0, 1.0, 2.0])), nums(&[3.0, 2.0, 1.0]));

        h.add_rule(
            db.schema(),
            HeuristicRule::variable("Drive", "speed")
                .with_value_order(ValueOrder::Explicit(nums(&[9.0, 2.0, 7.0, 2.0]))),
        )
        .unwrap();
        assert_eq!(h.order_values(&db, speed, nums(&[1.0, 2.0, 3.0, 7.0])), nums(&[2.0, 7.0]));
    }

    #[test]
    fn test_explicit_object_order_uses_keys() {
        let mut schema = SimpleSchema::new();
        schema.add_type("Rover", None).add_predicate("Drive", None, &[]);
        let mut db = PlanDatabase::new(schema);
        let r1 = db.create_timeline("r1", "Rover");
        let r2 = db.create_timeline("r2", "Rover");
        let r3 = db.create_timeline("r3", "Rover");
        let t = db
            .create_token(NewToken::new("Drive").with_object_type("Rover"))
            .unwrap();
        let object = db.token(t).unwrap().object().unwrap();

        let mut h = engine();
        h.add_rule(
            db.schema(),
            HeuristicRule::variable("Drive", "object").with_value_order(ValueOrder::Explicit(vec![
                Value::Object(r3),
                Value::Object(r1),
                Value::Object(r3),
            ])),
        )
        .unwrap();
        let allowed = vec![Value::Object(r1), Value::Object(r2), Value::Object(r3)];
        assert_eq!(
            h.order_values(&db, object, allowed),
            vec![Value::Object(r3), Value::Object(r1)]
        );
        assert!(same_value(&db, &Value::Object(r2), &Value::Object(r2)));
        assert!(!same_value(&db, &Value::Object(r1), &Value::Object(r2)));
    }

    #[test]
    fn test_random_order_is_seeded() {
        let mut db = db();
        let t = drive(&mut db, "Drive");
        let speed = db.token(t).unwrap().parameter(1).unwrap();
        let rule = HeuristicRule::variable("Drive", "speed").with_value_order(ValueOrder::Random);
        let values: Vec<Value> = (0..20).map(|x| Value::number(x as f64)).collect();

        let mut a = engine();
        let mut b = engine();
        a.add_rule(db.schema(), rule.clone()).unwrap();
        b.add_rule(db.schema(), rule).unwrap();
        let first = a.order_values(&db, speed, values.clone());
        assert_eq!(first, b.order_values(&db, speed, values.clone()));

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, values);
    }

    #[test]
    fn test_candidate_orders() {
        let mut db = db();
        let mut h = engine();
        let t = drive(&mut db, "Drive");
        let others: Vec<TokenId> = (0..3).map(|_| drive(&mut db, "Drive")).collect();
        for (o, start) in others.iter().zip([0.0, 50.0, 100.0]) {
            let s = db.token(*o).unwrap().start();
            bind(&mut db, s, Value::number(start));
        }
        let (a, b, c) = (others[0], others[1], others[2]);

        // No candidate order keeps the input order.
        assert_eq!(h.order_merge_candidates(&db, t, vec![c, a, b]), vec![c, a, b]);

        h.add_rule(
            db.schema(),
            HeuristicRule::token("Drive").with_candidate_order(vec![CandidateOrder::Early]),
        )
        .unwrap();
        assert_eq!(h.order_merge_candidates(&db, t, vec![c, a, b]), vec![a, b, c]);

        h.add_rule(
            db.schema(),
            HeuristicRule::token("Drive").with_candidate_order(vec![CandidateOrder::Late]),
        )
        .unwrap();
        assert_eq!(h.order_merge_candidates(&db, t, vec![a, c, b]), vec![c, b, a]);

        // Midpoints are 0, 25, 50 against a reference of 30.
        let s = db.token(t).unwrap().start();
        bind(&mut db, s, Value::number(60.0));
        h.add_rule(
            db.schema(),
            HeuristicRule::token("Drive").with_candidate_order(vec![CandidateOrder::Near]),
        )
        .unwrap();
        assert_eq!(h.order_merge_candidates(&db, t, vec![a, b, c]), vec![b, c, a]);
    }
}
