//! Incrementally maintained flaw sets.

use super::filter::FlawFilter;
use crate::domain::DomainEvent;
use crate::network::{ConstraintId, Owner, PlanEvent, SubscriberId, VarId};
use crate::plan::{PlanDatabase, TokenId};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, trace};

const SUBSCRIBER: &str = "flaw-tracker";

/// Tracks the unresolved variables and open conditions of a plan.
///
/// The tracker subscribes to the database's event bus. A full scan runs
/// once at construction; afterwards [`sync`](Self::sync) folds pending
/// events into the sets, so no set is ever recomputed wholesale.
///
/// A variable is decidable when it is specifiable, not yet specified,
/// has a closed base domain, belongs to an active token (or to an
/// object or the global set), and passes every static filter. Each
/// decidable variable sits in exactly one of the unit set (derived
/// domain is a singleton) or the non-unit set.
///
/// Call [`detach`](Self::detach) before discarding a tracker whose
/// database lives on, or its queue keeps growing.
#[derive(Debug)]
pub struct FlawTracker {
    subscription: SubscriberId,
    unit: BTreeSet<VarId>,
    non_unit: BTreeSet<VarId>,
    open_conditions: BTreeSet<TokenId>,
    guards: HashMap<VarId, u32>,
    registrations: HashSet<(ConstraintId, VarId)>,
    filters: Vec<Box<dyn FlawFilter>>,
}

impl FlawTracker {
    pub fn new(db: &mut PlanDatabase) -> Self {
        Self::with_filters(db, Vec::new())
    }

    pub fn with_filters(db: &mut PlanDatabase, filters: Vec<Box<dyn FlawFilter>>) -> Self {
        let subscription = db.engine_mut().subscribe(SUBSCRIBER);
        let mut tracker = Self {
            subscription,
            unit: BTreeSet::new(),
            non_unit: BTreeSet::new(),
            open_conditions: BTreeSet::new(),
            guards: HashMap::new(),
            registrations: HashSet::new(),
            filters,
        };
        tracker.scan(db);
        tracker
    }

    fn scan(&mut self, db: &PlanDatabase) {
        let vars: Vec<VarId> = db.engine().variables().map(|(id, _)| id).collect();
        for var in vars {
            self.evaluate_variable(db, var);
        }
        for token in db.token_ids() {
            self.evaluate_token(db, token);
        }
        let guarded: Vec<(ConstraintId, Vec<VarId>)> = db
            .engine()
            .constraints()
            .map(|(id, c)| (id, c.guards().to_vec()))
            .collect();
        for (constraint, guards) in guarded {
            for var in guards {
                self.register_guard(constraint, var);
            }
        }
    }

    /// Unsubscribes from the database's event bus, dropping queued events.
    pub fn detach(self, db: &mut PlanDatabase) {
        if db.engine_mut().unsubscribe(self.subscription) {
            trace!("flaw tracker detached");
        }
    }

    /// Applies every event published since the last call.
    pub fn sync(&mut self, db: &mut PlanDatabase) {
        let events = db.engine_mut().drain_events(self.subscription);
        let count = events.len();
        for event in &events {
            self.handle(db, event);
        }
        trace!(
            events = count,
            unit = self.unit.len(),
            non_unit = self.non_unit.len(),
            open = self.open_conditions.len(),
            "flaw tracker synced"
        );
    }

    fn handle(&mut self, db: &PlanDatabase, event: &PlanEvent) {
        match event {
            PlanEvent::VariableAdded(var) => self.evaluate_variable(db, *var),
            PlanEvent::VariableRemoved(var) => {
                self.discard_variable(*var);
                self.guards.remove(var);
                self.registrations.retain(|(_, g)| g != var);
            }
            PlanEvent::VariableChanged { var, change } => match change {
                DomainEvent::SetToSingleton => self.discard_variable(*var),
                DomainEvent::Reset
                | DomainEvent::Relaxed
                | DomainEvent::Closed
                | DomainEvent::RestrictToSingleton => self.evaluate_variable(db, *var),
                _ => {}
            },
            PlanEvent::ConstraintAdded { constraint, guards } => {
                for var in guards {
                    self.register_guard(*constraint, *var);
                }
            }
            PlanEvent::ConstraintRemoved { constraint, guards } => {
                for var in guards {
                    self.unregister_guard(*constraint, *var);
                }
            }
            PlanEvent::TokenAdded(t)
            | PlanEvent::TokenActivated(t)
            | PlanEvent::TokenDeactivated(t)
            | PlanEvent::TokenSplit(t)
            | PlanEvent::TokenRejected(t)
            | PlanEvent::TokenReinstated(t)
            | PlanEvent::TokenMerged { token: t, .. } => self.evaluate_token(db, *t),
            PlanEvent::TokenRemoved(t) => {
                self.open_conditions.remove(t);
            }
            PlanEvent::OrderingAdded { .. } | PlanEvent::OrderingRemoved { .. } => {}
        }
    }

    fn discard_variable(&mut self, var: VarId) {
        self.unit.remove(&var);
        self.non_unit.remove(&var);
    }

    fn evaluate_variable(&mut self, db: &PlanDatabase, id: VarId) {
        self.discard_variable(id);
        let Some(var) = db.engine().variable(id) else {
            debug!(var = ?id, "skipping stale variable");
            return;
        };
        if !var.can_be_specified() || var.is_specified() || var.base().is_open() {
            return;
        }
        let owner_ok = match var.owner() {
            Owner::Token(t) => db.token(t).is_some_and(|t| t.is_active()),
            Owner::Object(_) | Owner::Global => true,
        };
        if !owner_ok || !self.passes_static_variable(db, id) {
            return;
        }
        let derived = var.derived();
        if derived.is_empty() {
            return;
        }
        if derived.is_singleton() {
            self.unit.insert(id);
        } else {
            self.non_unit.insert(id);
        }
    }

    fn evaluate_token(&mut self, db: &PlanDatabase, id: TokenId) {
        self.open_conditions.remove(&id);
        let Some(token) = db.token(id) else {
            debug!(token = ?id, "skipping stale token");
            return;
        };
        if token.is_inactive() && self.passes_static_token(db, id) {
            self.open_conditions.insert(id);
        }
        for var in token.variables() {
            self.evaluate_variable(db, var);
        }
    }

    fn register_guard(&mut self, constraint: ConstraintId, var: VarId) {
        if self.registrations.insert((constraint, var)) {
            *self.guards.entry(var).or_insert(0) += 1;
        }
    }

    fn unregister_guard(&mut self, constraint: ConstraintId, var: VarId) {
        if !self.registrations.remove(&(constraint, var)) {
            return;
        }
        if let Some(count) = self.guards.get_mut(&var) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.guards.remove(&var);
            }
        }
    }

    fn passes_static_variable(&self, db: &PlanDatabase, var: VarId) -> bool {
        self.filters
            .iter()
            .filter(|f| !f.is_dynamic())
            .all(|f| !f.excludes_variable(db, var))
    }

    fn passes_static_token(&self, db: &PlanDatabase, token: TokenId) -> bool {
        self.filters
            .iter()
            .filter(|f| !f.is_dynamic())
            .all(|f| !f.excludes_token(db, token))
    }

    /// Whether `var` passes the dynamic filters at this moment.
    pub fn passes_dynamic_variable(&self, db: &PlanDatabase, var: VarId) -> bool {
        self.filters
            .iter()
            .filter(|f| f.is_dynamic())
            .all(|f| !f.excludes_variable(db, var))
    }

    /// Whether `token` passes the dynamic filters at this moment.
    pub fn passes_dynamic_token(&self, db: &PlanDatabase, token: TokenId) -> bool {
        self.filters
            .iter()
            .filter(|f| f.is_dynamic())
            .all(|f| !f.excludes_token(db, token))
    }

    pub fn unit_variables(&self) -> &BTreeSet<VarId> {
        &self.unit
    }

    pub fn non_unit_variables(&self) -> &BTreeSet<VarId> {
        &self.non_unit
    }

    pub fn open_conditions(&self) -> &BTreeSet<TokenId> {
        &self.open_conditions
    }

    pub fn is_unit(&self, var: VarId) -> bool {
        self.unit.contains(&var)
    }

    pub fn is_non_unit(&self, var: VarId) -> bool {
        self.non_unit.contains(&var)
    }

    pub fn is_open_condition(&self, token: TokenId) -> bool {
        self.open_conditions.contains(&token)
    }

    /// Number of distinct constraints watching `var` as a guard.
    pub fn guard_count(&self, var: VarId) -> u32 {
        self.guards.get(&var).copied().unwrap_or(0)
    }

    pub fn is_guard(&self, var: VarId) -> bool {
        self.guard_count(var) > 0
    }

    /// Active tokens still waiting for a place in a timeline sequence.
    pub fn threats(&self, db: &PlanDatabase) -> Vec<TokenId> {
        db.tokens_to_order()
            .into_iter()
            .filter(|t| self.passes_static_token(db, *t) && self.passes_dynamic_token(db, *t))
            .collect()
    }

    pub fn filters(&self) -> &[Box<dyn FlawFilter>] {
        &self.filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Value};
    use crate::flaws::{HorizonFilter, PredicateFilter};
    use crate::network::{Equal, NotEqual};
    use crate::plan::{NewToken, SimpleSchema};
    use proptest::prelude::*;

    fn schema() -> SimpleSchema {
        let mut schema = SimpleSchema::new();
        schema
            .add_type("Rover", None)
            .add_predicate("Drive", None, &["speed"])
            .add_predicate("Idle", None, &[]);
        schema
    }

    #[test]
    fn test_equal_globals_leave_no_flaw_once_specified() {
        let mut db = PlanDatabase::new(schema());
        let x = db.create_global_variable("x", Domain::int_interval(1.0, 10.0), true);
        let y = db.create_global_variable("y", Domain::int_interval(1.0, 10.0), true);
        db.engine_mut().add_constraint(Equal, vec![x, y]).unwrap();
        let mut tracker = FlawTracker::new(&mut db);
        assert!(tracker.is_non_unit(x));
        assert!(tracker.is_non_unit(y));

        db.engine_mut()
            .specify(x, &Domain::singleton(Value::number(5.0)))
            .unwrap();
        assert!(db.propagate());
        tracker.sync(&mut db);
        assert!(!tracker.is_unit(x) && !tracker.is_non_unit(x));
        assert!(!tracker.is_non_unit(y));
        assert!(tracker.is_unit(y));
    }

    #[test]
    fn test_open_condition_then_parameter_flaw() {
        let mut db = PlanDatabase::new(schema());
        let mut tracker = FlawTracker::new(&mut db);
        let t = db
            .create_token(NewToken::new("Drive").with_parameter(Domain::int_interval(1.0, 3.0)))
            .unwrap();
        let speed = db.token(t).unwrap().parameter(0).unwrap();
        tracker.sync(&mut db);
        assert!(tracker.is_open_condition(t));
        assert!(!tracker.is_non_unit(speed));

        db.activate(t).unwrap();
        assert!(db.propagate());
        tracker.sync(&mut db);
        assert!(!tracker.is_open_condition(t));
        assert!(tracker.is_non_unit(speed));

        db.deactivate(t).unwrap();
        tracker.sync(&mut db);
        assert!(tracker.is_open_condition(t));
        assert!(!tracker.is_non_unit(speed));
    }

    #[test]
    fn test_removed_token_leaves_no_trace() {
        let mut db = PlanDatabase::new(schema());
        let mut tracker = FlawTracker::new(&mut db);
        let t = db
            .create_token(NewToken::new("Drive").with_parameter(Domain::int_interval(1.0, 3.0)))
            .unwrap();
        db.activate(t).unwrap();
        tracker.sync(&mut db);
        db.delete_token(t).unwrap();
        tracker.sync(&mut db);
        assert!(tracker.open_conditions().is_empty());
        assert!(tracker.non_unit_variables().is_empty());
        assert!(tracker.unit_variables().is_empty());
    }

    #[test]
    fn test_guard_counts_are_idempotent() {
        let mut db = PlanDatabase::new(schema());
        let x = db.create_global_variable("x", Domain::boolean(), true);
        let y = db.create_global_variable("y", Domain::boolean(), true);
        let mut tracker = FlawTracker::new(&mut db);

        let c = db
            .add_guarded_constraint(NotEqual, vec![x, y], vec![x])
            .unwrap();
        tracker.sync(&mut db);
        assert_eq!(tracker.guard_count(x), 1);
        assert!(!tracker.is_guard(y));

        let added = PlanEvent::ConstraintAdded {
            constraint: c,
            guards: vec![x],
        };
        tracker.handle(&db, &added);
        assert_eq!(tracker.guard_count(x), 1);

        db.engine_mut().remove_constraint(c).unwrap();
        tracker.sync(&mut db);
        assert_eq!(tracker.guard_count(x), 0);

        let removed = PlanEvent::ConstraintRemoved {
            constraint: c,
            guards: vec![x],
        };
        tracker.handle(&db, &removed);
        assert_eq!(tracker.guard_count(x), 0);
    }

    #[test]
    fn test_static_and_dynamic_filters() {
        let mut db = PlanDatabase::new(schema());
        let idle = db.create_token(NewToken::new("Idle")).unwrap();
        let drive = db
            .create_token(NewToken::new("Drive").with_parameter(Domain::int_interval(1.0, 3.0)))
            .unwrap();
        let filters: Vec<Box<dyn FlawFilter>> = vec![
            Box::new(PredicateFilter::new(["Idle"])),
            Box::new(HorizonFilter::new(0.0, 100.0)),
        ];
        let mut tracker = FlawTracker::with_filters(&mut db, filters);
        assert!(!tracker.is_open_condition(idle));
        assert!(tracker.is_open_condition(drive));

        let start = db.token(drive).unwrap().start();
        db.engine_mut()
            .specify(start, &Domain::singleton(Value::number(400.0)))
            .unwrap();
        assert!(db.propagate());
        tracker.sync(&mut db);
        // Dynamic filters never change set membership.
        assert!(tracker.is_open_condition(drive));
        assert!(!tracker.passes_dynamic_token(&db, drive));
        assert!(tracker.passes_dynamic_token(&db, idle));
    }

    #[test]
    fn test_threats_need_a_timeline() {
        let mut db = PlanDatabase::new(schema());
        db.create_timeline("r1", "Rover");
        let mut tracker = FlawTracker::new(&mut db);
        let t = db
            .create_token(NewToken::new("Idle").with_object_type("Rover"))
            .unwrap();
        let free = db.create_token(NewToken::new("Idle")).unwrap();
        db.activate(t).unwrap();
        db.activate(free).unwrap();
        assert!(db.propagate());
        tracker.sync(&mut db);
        assert_eq!(tracker.threats(&db), vec![t]);
    }

    #[test]
    fn test_detached_tracker_stops_queueing() {
        let mut db = PlanDatabase::new(schema());
        let x = db.create_global_variable("x", Domain::int_interval(0.0, 3.0), true);
        let tracker = FlawTracker::new(&mut db);
        let subscription = tracker.subscription;
        assert!(db.engine().subscriber_names().contains(&SUBSCRIBER));

        tracker.detach(&mut db);
        for _ in 0..1000 {
            db.engine_mut()
                .specify(x, &Domain::singleton(Value::number(1.0)))
                .unwrap();
            db.engine_mut().reset(x).unwrap();
        }
        assert!(!db.engine().subscriber_names().contains(&SUBSCRIBER));
        assert_eq!(db.engine().pending_events(subscription), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Specify(usize, i64),
        Reset(usize),
        Activate(usize),
        Deactivate(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize, 0..4i64).prop_map(|(v, x)| Op::Specify(v, x)),
            (0..4usize).prop_map(Op::Reset),
            (0..2usize).prop_map(Op::Activate),
            (0..2usize).prop_map(Op::Deactivate),
        ]
    }

    proptest! {
        #[test]
        fn prop_incremental_sets_match_a_fresh_scan(ops in proptest::collection::vec(op(), 1..20)) {
            let mut db = PlanDatabase::new(schema());
            let mut vars: Vec<VarId> = (0..2)
                .map(|i| db.create_global_variable(format!("g{i}"), Domain::int_interval(0.0, 3.0), true))
                .collect();
            db.engine_mut().add_constraint(Equal, vec![vars[0], vars[1]]).unwrap();
            let tokens: Vec<TokenId> = (0..2)
                .map(|_| {
                    db.create_token(NewToken::new("Drive").with_parameter(Domain::int_interval(0.0, 3.0)))
                        .unwrap()
                })
                .collect();
            for t in &tokens {
                vars.push(db.token(*t).unwrap().parameter(0).unwrap());
            }
            let mut tracker = FlawTracker::new(&mut db);

            for op in ops {
                match op {
                    Op::Specify(v, x) => {
                        let _ = db
                            .engine_mut()
                            .specify(vars[v], &Domain::singleton(Value::number(x as f64)));
                    }
                    Op::Reset(v) => {
                        let _ = db.engine_mut().reset(vars[v]);
                    }
                    Op::Activate(t) => {
                        let _ = db.activate(tokens[t]);
                    }
                    Op::Deactivate(t) => {
                        let _ = db.deactivate(tokens[t]);
                    }
                }
                if !db.propagate() {
                    continue;
                }
                tracker.sync(&mut db);
                let fresh = FlawTracker::new(&mut db);
                prop_assert_eq!(tracker.unit_variables(), fresh.unit_variables());
                prop_assert_eq!(tracker.non_unit_variables(), fresh.non_unit_variables());
                prop_assert_eq!(tracker.open_conditions(), fresh.open_conditions());
                prop_assert!(tracker.unit_variables().is_disjoint(tracker.non_unit_variables()));
                fresh.detach(&mut db);
            }
        }
    }
}
