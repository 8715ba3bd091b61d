//! Propagation engine.
//!
//! # Algorithm
//!
//! 1. A change to a variable's derived domain enqueues every active,
//!    non-suspended constraint on that variable into the agenda of the
//!    constraint's propagator (deduplicated).
//! 2. `propagate` always pops from the first non-empty agenda in
//!    [`PropagatorKind`] order and runs the rule on copies of its scope
//!    domains; results are intersected back, so domains only narrow.
//! 3. When every agenda is empty, dirty resource profiles are validated
//!    once. A violated profile empties one contributing variable.
//! 4. The first emptied domain stops the pass and puts the engine in the
//!    failed state until a relaxation (reset, constraint removal or
//!    deactivation) recomputes the affected component.
//!
//! Relaxation restores `derived := specified` over the constraint-
//! connected component of the relaxed variables and re-enqueues its
//! constraints, so the next fixpoint is again a function of the specified
//! domains alone.

use super::config::EngineConfig;
use super::constraint::{Constraint, ConstraintId, ConstraintRule, PropagatorKind};
use super::events::{EventBus, PlanEvent, SubscriberId};
use super::resource::{Contribution, ProfileId, ResourceProfile};
use super::variable::{Owner, VarId, Variable};
use crate::arena::Arena;
use crate::domain::{Domain, DomainEvent, Value};
use crate::error::{DomainError, EngineError};
use crate::plan::TokenId;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, trace};

/// Owns variables, constraints, agendas, and resource profiles.
///
/// # Examples
///
/// ```
/// use u_plansearch::domain::{Domain, Value};
/// use u_plansearch::network::{ConstraintEngine, Equal, Owner};
///
/// let mut engine = ConstraintEngine::default();
/// let x = engine.create_variable("x", Domain::int_interval(0.0, 10.0), true, Owner::Global);
/// let y = engine.create_variable("y", Domain::int_interval(0.0, 10.0), true, Owner::Global);
/// engine.add_constraint(Equal, vec![x, y]).unwrap();
///
/// engine.specify(x, &Domain::singleton(Value::number(5.0))).unwrap();
/// assert!(engine.propagate());
/// assert_eq!(engine.derived_domain(y).unwrap().singleton_value(), Some(Value::number(5.0)));
/// ```
#[derive(Debug)]
pub struct ConstraintEngine {
    config: EngineConfig,
    variables: Arena<Variable>,
    constraints: Arena<Constraint>,
    profiles: Arena<ResourceProfile>,
    agendas: [VecDeque<ConstraintId>; 3],
    queued: HashSet<ConstraintId>,
    var_profiles: HashMap<VarId, Vec<ProfileId>>,
    emptied: Option<VarId>,
    violation: f64,
    events: EventBus,
    executions: u64,
}

impl Default for ConstraintEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ConstraintEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            variables: Arena::new(),
            constraints: Arena::new(),
            profiles: Arena::new(),
            agendas: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            queued: HashSet::new(),
            var_profiles: HashMap::new(),
            emptied: None,
            violation: 0.0,
            events: EventBus::new(),
            executions: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- events ----

    /// Registers a named event subscriber.
    pub fn subscribe(&mut self, name: impl Into<String>) -> SubscriberId {
        self.events.subscribe(name)
    }

    /// Drops a subscriber and its undrained events.
    pub fn unsubscribe(&mut self, subscriber: SubscriberId) -> bool {
        self.events.unsubscribe(subscriber)
    }

    pub fn drain_events(&mut self, subscriber: SubscriberId) -> Vec<PlanEvent> {
        self.events.drain(subscriber)
    }

    pub fn pending_events(&self, subscriber: SubscriberId) -> usize {
        self.events.pending(subscriber)
    }

    pub fn subscriber_names(&self) -> Vec<&str> {
        self.events.subscriber_names()
    }

    /// Publishes a plan-level event to every subscriber.
    pub fn publish(&mut self, event: PlanEvent) {
        self.events.publish(event);
    }

    // ---- variables ----

    pub fn create_variable(
        &mut self,
        name: impl Into<String>,
        base: Domain,
        can_be_specified: bool,
        owner: Owner,
    ) -> VarId {
        let id = self
            .variables
            .insert(Variable::new(name.into(), base, can_be_specified, owner));
        self.events.publish(PlanEvent::VariableAdded(id));
        id
    }

    /// Deletes a variable and every constraint on it.
    pub fn delete_variable(&mut self, id: VarId) -> Result<(), EngineError> {
        let constraints = self.var(id)?.constraints.clone();
        for c in constraints {
            self.remove_constraint(c)?;
        }
        self.variables.remove(id);
        if self.emptied == Some(id) {
            self.emptied = None;
        }
        if self.var_profiles.remove(&id).is_some() {
            for (_, profile) in self.profiles.iter_mut() {
                profile
                    .contributions
                    .retain(|c| c.start != id && c.end != id);
            }
        }
        self.events.publish(PlanEvent::VariableRemoved(id));
        Ok(())
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id)
    }

    fn var(&self, id: VarId) -> Result<&Variable, EngineError> {
        self.variables.get(id).ok_or(EngineError::UnknownVariable(id))
    }

    /// Identity-order key of a variable.
    pub fn variable_key(&self, id: VarId) -> Option<u64> {
        self.variables.key(id)
    }

    pub fn variables(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.variables.iter()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Derived domain as of the last propagation step, without propagating.
    pub fn last_domain(&self, id: VarId) -> Option<&Domain> {
        self.variables.get(id).map(|v| &v.derived)
    }

    /// Derived domain at fixpoint. Propagates first when work is pending;
    /// a failed network yields an empty domain of the variable's kind.
    pub fn derived_domain(&mut self, id: VarId) -> Result<Domain, EngineError> {
        let kind = self.var(id)?.derived.kind();
        if self.has_pending() {
            self.propagate();
        }
        if self.emptied.is_some() {
            return Ok(Domain::empty_of(kind));
        }
        Ok(self.var(id)?.derived.clone())
    }

    /// `specified := specified ∩ domain`.
    pub fn specify(&mut self, id: VarId, domain: &Domain) -> Result<(), EngineError> {
        let v = self
            .variables
            .get_mut(id)
            .ok_or(EngineError::UnknownVariable(id))?;
        if !v.can_be_specified() {
            return Err(DomainError::NotSpecifiable(v.name().to_string()).into());
        }
        if !domain.intersects(&v.base) {
            return Err(DomainError::NoIntersection {
                variable: v.name().to_string(),
                domain: domain.to_string(),
            }
            .into());
        }
        let old = v.derived.clone();
        v.specified.intersect(domain);
        v.derived.intersect(domain);
        let emptied = v.derived.is_empty();
        let event = if emptied {
            Some(DomainEvent::Emptied)
        } else if v.specified.is_singleton() {
            Some(DomainEvent::SetToSingleton)
        } else {
            DomainEvent::between(&old, &v.derived)
        };
        let changed = v.derived != old;
        debug!(variable = v.name(), domain = %domain, "specify");

        if let Some(change) = event {
            self.events
                .publish(PlanEvent::VariableChanged { var: id, change });
        }
        if emptied {
            self.fail(id);
        } else if changed {
            self.enqueue_neighbors(id);
        }
        Ok(())
    }

    /// `specified := base`; the variable's component is relaxed.
    pub fn reset(&mut self, id: VarId) -> Result<(), EngineError> {
        let v = self
            .variables
            .get_mut(id)
            .ok_or(EngineError::UnknownVariable(id))?;
        v.specified = v.base.clone();
        debug!(variable = v.name(), "reset");
        self.events.publish(PlanEvent::VariableChanged {
            var: id,
            change: DomainEvent::Reset,
        });
        self.relax_from(&[id], Some(id));
        Ok(())
    }

    /// Resets, then re-specifies `prior` unless it is the whole base
    /// domain. Undoes a `specify` made on top of `prior`.
    pub fn restore_specified(&mut self, id: VarId, prior: &Domain) -> Result<(), EngineError> {
        self.reset(id)?;
        if self.var(id)?.base != *prior {
            self.specify(id, prior)?;
        }
        Ok(())
    }

    /// Irreversibly narrows the base domain (and with it the others).
    pub fn restrict_base_domain(&mut self, id: VarId, domain: &Domain) -> Result<(), EngineError> {
        let v = self
            .variables
            .get_mut(id)
            .ok_or(EngineError::UnknownVariable(id))?;
        if !domain.intersects(&v.base) {
            return Err(DomainError::NoIntersection {
                variable: v.name().to_string(),
                domain: domain.to_string(),
            }
            .into());
        }
        let old = v.derived.clone();
        v.base.intersect(domain);
        v.specified.intersect(domain);
        v.derived.intersect(domain);
        let emptied = v.derived.is_empty();
        let event = if emptied {
            Some(DomainEvent::Emptied)
        } else {
            DomainEvent::between(&old, &v.derived)
        };
        if let Some(change) = event {
            self.events
                .publish(PlanEvent::VariableChanged { var: id, change });
        }
        if emptied {
            self.fail(id);
        } else if event.is_some() {
            self.enqueue_neighbors(id);
        }
        Ok(())
    }

    /// Closes an open domain.
    pub fn close_domain(&mut self, id: VarId) -> Result<(), EngineError> {
        let v = self
            .variables
            .get_mut(id)
            .ok_or(EngineError::UnknownVariable(id))?;
        let was_open = v.base.close();
        v.specified.close();
        v.derived.close();
        if was_open {
            self.events.publish(PlanEvent::VariableChanged {
                var: id,
                change: DomainEvent::Closed,
            });
        }
        Ok(())
    }

    /// Adds a value to an open base domain. The variable is relaxed.
    pub fn insert_value(&mut self, id: VarId, value: Value) -> Result<(), EngineError> {
        let v = self
            .variables
            .get_mut(id)
            .ok_or(EngineError::UnknownVariable(id))?;
        let widen_specified = v.specified == v.base;
        v.base.insert(value.clone())?;
        if widen_specified {
            v.specified.insert(value)?;
        }
        self.relax_from(&[id], None);
        Ok(())
    }

    // ---- constraints ----

    /// Adds an active, unowned constraint.
    pub fn add_constraint<R: ConstraintRule + 'static>(
        &mut self,
        rule: R,
        scope: Vec<VarId>,
    ) -> Result<ConstraintId, EngineError> {
        self.add_owned_constraint(Box::new(rule), scope, None, true, Vec::new())
    }

    /// Adds a constraint with an owning token, initial activity, and the
    /// variables it registers as guards.
    pub fn add_owned_constraint(
        &mut self,
        rule: Box<dyn ConstraintRule>,
        scope: Vec<VarId>,
        owner: Option<TokenId>,
        active: bool,
        guards: Vec<VarId>,
    ) -> Result<ConstraintId, EngineError> {
        if let Some(expected) = rule.arity() {
            if expected != scope.len() {
                return Err(EngineError::Arity {
                    rule: rule.name().to_string(),
                    expected,
                    found: scope.len(),
                });
            }
        }
        for v in scope.iter().chain(guards.iter()) {
            self.var(*v)?;
        }
        let id = self.constraints.insert(Constraint {
            rule,
            scope: scope.clone(),
            owner,
            active,
            guards: guards.clone(),
            violated: false,
        });
        let mut seen = HashSet::new();
        for v in &scope {
            if seen.insert(*v) {
                if let Some(var) = self.variables.get_mut(*v) {
                    var.constraints.push(id);
                }
            }
        }
        if active {
            self.enqueue(id);
        }
        self.events
            .publish(PlanEvent::ConstraintAdded { constraint: id, guards });
        Ok(id)
    }

    /// Deletes a constraint from the network and every agenda.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), EngineError> {
        let c = self
            .constraints
            .remove(id)
            .ok_or(EngineError::UnknownConstraint(id))?;
        for v in &c.scope {
            if let Some(var) = self.variables.get_mut(*v) {
                var.constraints.retain(|x| *x != id);
            }
        }
        self.dequeue(id);
        if c.violated {
            self.violation = (self.violation - c.rule.penalty()).max(0.0);
        }
        if c.active {
            self.relax_from(&c.scope, None);
        }
        self.events.publish(PlanEvent::ConstraintRemoved {
            constraint: id,
            guards: c.guards,
        });
        Ok(())
    }

    pub fn activate_constraint(&mut self, id: ConstraintId) -> Result<(), EngineError> {
        let c = self
            .constraints
            .get_mut(id)
            .ok_or(EngineError::UnknownConstraint(id))?;
        if !c.active {
            c.active = true;
            self.enqueue(id);
        }
        Ok(())
    }

    /// Suspends a constraint; its former component is relaxed.
    pub fn deactivate_constraint(&mut self, id: ConstraintId) -> Result<(), EngineError> {
        let c = self
            .constraints
            .get_mut(id)
            .ok_or(EngineError::UnknownConstraint(id))?;
        if !c.active {
            return Ok(());
        }
        c.active = false;
        if c.violated {
            c.violated = false;
            self.violation = (self.violation - c.rule.penalty()).max(0.0);
        }
        let scope = c.scope.clone();
        self.dequeue(id);
        self.relax_from(&scope, None);
        Ok(())
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    // ---- resource profiles ----

    pub fn add_profile(&mut self, name: impl Into<String>, capacity: f64) -> ProfileId {
        self.profiles.insert(ResourceProfile::new(name, capacity))
    }

    pub fn profile(&self, id: ProfileId) -> Option<&ResourceProfile> {
        self.profiles.get(id)
    }

    /// Registers a token's claim on a profile. Marks the profile dirty.
    pub fn add_contribution(
        &mut self,
        profile: ProfileId,
        token: TokenId,
        start: VarId,
        end: VarId,
        usage: f64,
    ) -> Result<(), EngineError> {
        self.var(start)?;
        self.var(end)?;
        let p = self
            .profiles
            .get_mut(profile)
            .ok_or(EngineError::UnknownProfile(profile))?;
        p.contributions.push(Contribution {
            token,
            start,
            end,
            usage,
        });
        p.dirty = true;
        for v in [start, end] {
            let list = self.var_profiles.entry(v).or_default();
            if !list.contains(&profile) {
                list.push(profile);
            }
        }
        Ok(())
    }

    /// Removes a token's claims on a profile. Returns whether any existed.
    pub fn remove_contribution(
        &mut self,
        profile: ProfileId,
        token: TokenId,
    ) -> Result<bool, EngineError> {
        let p = self
            .profiles
            .get_mut(profile)
            .ok_or(EngineError::UnknownProfile(profile))?;
        let (removed, kept): (Vec<Contribution>, Vec<Contribution>) = p
            .contributions
            .drain(..)
            .partition(|c| c.token == token);
        p.contributions = kept;
        p.dirty = true;
        for c in &removed {
            for v in [c.start, c.end] {
                if let Some(list) = self.var_profiles.get_mut(&v) {
                    list.retain(|x| *x != profile);
                }
            }
        }
        if self.emptied.is_some() {
            self.relax_from(&[], None);
        }
        Ok(!removed.is_empty())
    }

    /// Structural ordering change between tokens: every profile they
    /// contribute to is re-validated on the next pass.
    pub fn note_ordering(&mut self, tokens: &[TokenId]) {
        let ids: Vec<ProfileId> = self
            .profiles
            .iter()
            .filter(|(_, p)| tokens.iter().any(|t| p.involves(*t)))
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            if let Some(p) = self.profiles.get_mut(id) {
                p.dirty = true;
            }
        }
    }

    fn mark_profiles_dirty(&mut self, var: VarId) {
        if let Some(list) = self.var_profiles.get(&var) {
            for id in list {
                if let Some(p) = self.profiles.get_mut(*id) {
                    p.dirty = true;
                }
            }
        }
    }

    // ---- propagation ----

    /// Runs every agenda to fixpoint. Returns `true` iff no domain emptied.
    pub fn propagate(&mut self) -> bool {
        if self.emptied.is_some() {
            return false;
        }
        while let Some(c) = self.pop_agenda() {
            if !self.execute(c) {
                return false;
            }
        }
        self.check_profiles()
    }

    /// Whether no domain has been emptied since the last relaxation.
    pub fn is_consistent(&self) -> bool {
        self.emptied.is_none()
    }

    /// Whether agendas or dirty profiles are waiting.
    pub fn has_pending(&self) -> bool {
        self.agendas.iter().any(|a| !a.is_empty()) || self.profiles.iter().any(|(_, p)| p.dirty)
    }

    /// Consistent and at fixpoint.
    pub fn is_propagated(&self) -> bool {
        self.is_consistent() && !self.has_pending()
    }

    /// The variable whose domain emptied, while failed.
    pub fn emptied_variable(&self) -> Option<VarId> {
        self.emptied
    }

    /// Accumulated violation score (violation-tolerant mode).
    pub fn violation(&self) -> f64 {
        self.violation
    }

    /// Number of rule executions so far.
    pub fn executions(&self) -> u64 {
        self.executions
    }

    fn pop_agenda(&mut self) -> Option<ConstraintId> {
        for kind in PropagatorKind::ALL {
            if let Some(c) = self.agendas[kind.index()].pop_front() {
                self.queued.remove(&c);
                return Some(c);
            }
        }
        None
    }

    fn enqueue(&mut self, id: ConstraintId) {
        let Some(c) = self.constraints.get(id) else {
            return;
        };
        if !c.active || c.violated {
            return;
        }
        if self.queued.insert(id) {
            trace!(constraint = ?id, rule = c.name(), "enqueue");
            self.agendas[c.propagator().index()].push_back(id);
        }
    }

    fn dequeue(&mut self, id: ConstraintId) {
        if self.queued.remove(&id) {
            for agenda in &mut self.agendas {
                agenda.retain(|c| *c != id);
            }
        }
    }

    fn enqueue_neighbors(&mut self, var: VarId) {
        let Some(v) = self.variables.get(var) else {
            return;
        };
        let constraints = v.constraints.clone();
        for c in constraints {
            self.enqueue(c);
        }
        self.mark_profiles_dirty(var);
    }

    /// Executes one constraint. Returns `false` on failure.
    fn execute(&mut self, id: ConstraintId) -> bool {
        let Some(c) = self.constraints.get(id) else {
            return true;
        };
        if !c.active || c.violated {
            return true;
        }
        let mut domains = Vec::with_capacity(c.scope.len());
        for v in &c.scope {
            match self.variables.get(*v) {
                Some(var) => domains.push(var.derived.clone()),
                None => return true,
            }
        }
        c.rule.execute(&mut domains);
        trace!(constraint = ?id, rule = c.name(), "execute");
        let penalty = c.rule.penalty();
        let scope = c.scope.clone();
        self.executions += 1;

        let emptied = scope.iter().zip(&domains).find_map(|(v, d)| {
            let current = &self.variables.get(*v)?.derived;
            let mut next = current.clone();
            next.intersect(d);
            next.is_empty().then_some(*v)
        });
        if let Some(var) = emptied {
            if self.config.tolerate_violations {
                if let Some(c) = self.constraints.get_mut(id) {
                    c.violated = true;
                }
                self.violation += penalty;
                debug!(constraint = ?id, violation = self.violation, "constraint violated");
                return true;
            }
            debug!(constraint = ?id, variable = ?var, "domain emptied");
            self.force_empty(var);
            return false;
        }

        for (v, d) in scope.into_iter().zip(domains) {
            let Some(var) = self.variables.get_mut(v) else {
                continue;
            };
            let old = var.derived.clone();
            var.derived.intersect(&d);
            if let Some(change) = DomainEvent::between(&old, &var.derived) {
                self.events
                    .publish(PlanEvent::VariableChanged { var: v, change });
                self.enqueue_neighbors(v);
            }
        }
        true
    }

    fn check_profiles(&mut self) -> bool {
        let dirty: Vec<ProfileId> = self
            .profiles
            .iter()
            .filter(|(_, p)| p.dirty)
            .map(|(id, _)| id)
            .collect();
        for id in dirty {
            let culprit = match self.profiles.get(id) {
                Some(p) => p.find_violation(|v| self.variables.get(v).map(|x| &x.derived)),
                None => None,
            };
            if let Some(p) = self.profiles.get_mut(id) {
                p.dirty = false;
            }
            if let Some(var) = culprit {
                debug!(profile = ?id, variable = ?var, "resource profile violated");
                self.force_empty(var);
                return false;
            }
        }
        true
    }

    fn force_empty(&mut self, var: VarId) {
        if let Some(v) = self.variables.get_mut(var) {
            v.derived.empty();
        }
        self.events.publish(PlanEvent::VariableChanged {
            var,
            change: DomainEvent::Emptied,
        });
        self.fail(var);
    }

    fn fail(&mut self, var: VarId) {
        debug!(variable = ?var, "propagation failed");
        self.emptied = Some(var);
    }

    /// Restores `derived := specified` over the active-constraint component
    /// of `seeds` (and of the emptied variable, if failed).
    fn relax_from(&mut self, seeds: &[VarId], quiet: Option<VarId>) {
        let mut stack: Vec<VarId> = seeds.to_vec();
        if let Some(e) = self.emptied.take() {
            stack.push(e);
        }
        let mut visited: HashSet<VarId> = HashSet::new();
        let mut seen: HashSet<ConstraintId> = HashSet::new();
        let mut component: Vec<ConstraintId> = Vec::new();
        while let Some(v) = stack.pop() {
            if !visited.insert(v) {
                continue;
            }
            let Some(var) = self.variables.get(v) else {
                continue;
            };
            for c in &var.constraints {
                let Some(con) = self.constraints.get(*c) else {
                    continue;
                };
                if con.active && seen.insert(*c) {
                    component.push(*c);
                    stack.extend(con.scope.iter().copied());
                }
            }
        }

        let mut relaxed: Vec<VarId> = visited.into_iter().collect();
        relaxed.sort();
        for v in &relaxed {
            if let Some(var) = self.variables.get_mut(*v) {
                if var.derived.relax_to(&var.specified) {
                    if quiet != Some(*v) {
                        self.events.publish(PlanEvent::VariableChanged {
                            var: *v,
                            change: DomainEvent::Relaxed,
                        });
                    }
                }
            }
            self.mark_profiles_dirty(*v);
        }
        for c in &component {
            if let Some(con) = self.constraints.get_mut(*c) {
                if con.violated {
                    con.violated = false;
                    self.violation = (self.violation - con.rule.penalty()).max(0.0);
                }
            }
            self.enqueue(*c);
        }
        trace!(
            variables = relaxed.len(),
            constraints = component.len(),
            "relax"
        );
    }
}
