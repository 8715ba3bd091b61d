//! Reference plan database.
//!
//! Owns the constraint engine, the schema, and the token and object
//! arenas. Every mutation is published on the engine's event bus so flaw
//! trackers can follow the plan incrementally.

use super::object::{Object, ObjectId, ObjectKind, OrderingChoice, Placement};
use super::relation::Timepoint;
use super::schema::Schema;
use super::token::{NewToken, Token, TokenId, TokenState};
use crate::arena::Arena;
use crate::domain::{Domain, Value};
use crate::error::PlanError;
use crate::network::{
    AddEqual, ConstraintEngine, ConstraintId, ConstraintRule, Equal, Owner, PlanEvent,
    TemporalDistance, VarId,
};
use tracing::debug;

/// Default planning horizon for token timepoints.
pub const DEFAULT_HORIZON: (f64, f64) = (0.0, 1000.0);

/// Tokens, objects, and global variables over one constraint network.
///
/// # Examples
///
/// ```
/// use u_plansearch::plan::{NewToken, PlanDatabase, SimpleSchema, TokenState};
///
/// let mut schema = SimpleSchema::new();
/// schema.add_type("Rover", None).add_predicate("Drive", None, &[]);
/// let mut db = PlanDatabase::new(schema);
/// db.create_timeline("rover1", "Rover");
///
/// let t = db.create_token(NewToken::new("Drive").with_object_type("Rover")).unwrap();
/// db.activate(t).unwrap();
/// assert_eq!(db.token(t).unwrap().state(), TokenState::Active);
/// assert_eq!(db.tokens_to_order(), vec![t]);
/// ```
#[derive(Debug)]
pub struct PlanDatabase {
    engine: ConstraintEngine,
    schema: Box<dyn Schema>,
    tokens: Arena<Token>,
    objects: Arena<Object>,
    globals: Vec<VarId>,
    horizon: (f64, f64),
}

impl PlanDatabase {
    pub fn new(schema: impl Schema + 'static) -> Self {
        Self::with_engine(schema, ConstraintEngine::default())
    }

    pub fn with_engine(schema: impl Schema + 'static, engine: ConstraintEngine) -> Self {
        Self {
            engine,
            schema: Box::new(schema),
            tokens: Arena::new(),
            objects: Arena::new(),
            globals: Vec::new(),
            horizon: DEFAULT_HORIZON,
        }
    }

    /// Bounds of every token's start and end. Applies to tokens created
    /// afterwards.
    pub fn with_horizon(mut self, start: f64, end: f64) -> Self {
        self.horizon = (start, end);
        self
    }

    pub fn horizon(&self) -> (f64, f64) {
        self.horizon
    }

    pub fn engine(&self) -> &ConstraintEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ConstraintEngine {
        &mut self.engine
    }

    pub fn schema(&self) -> &dyn Schema {
        self.schema.as_ref()
    }

    /// Propagates the network to fixpoint.
    pub fn propagate(&mut self) -> bool {
        self.engine.propagate()
    }

    fn domain(&self, var: VarId) -> Option<&Domain> {
        self.engine.last_domain(var)
    }

    // ---- objects and globals ----

    pub fn create_timeline(&mut self, name: impl Into<String>, type_name: impl Into<String>) -> ObjectId {
        self.objects.insert(Object {
            name: name.into(),
            type_name: type_name.into(),
            kind: ObjectKind::Timeline,
            sequence: Vec::new(),
            placements: Vec::new(),
        })
    }

    /// Creates a resource object with its capacity profile.
    pub fn create_resource(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        capacity: f64,
    ) -> ObjectId {
        let name = name.into();
        let profile = self.engine.add_profile(name.clone(), capacity);
        self.objects.insert(Object {
            name,
            type_name: type_name.into(),
            kind: ObjectKind::Resource { capacity, profile },
            sequence: Vec::new(),
            placements: Vec::new(),
        })
    }

    pub fn create_global_variable(
        &mut self,
        name: impl Into<String>,
        base: Domain,
        can_be_specified: bool,
    ) -> VarId {
        let id = self
            .engine
            .create_variable(name, base, can_be_specified, Owner::Global);
        self.globals.push(id);
        id
    }

    pub fn globals(&self) -> &[VarId] {
        &self.globals
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter()
    }

    /// Stable member key of an object.
    pub fn object_key(&self, id: ObjectId) -> Option<u64> {
        self.objects.key(id)
    }

    /// Objects whose type is `type_name` or inherits from it, by key.
    pub fn objects_of_type(&self, type_name: &str) -> Vec<ObjectId> {
        self.objects
            .ids_by_key()
            .into_iter()
            .filter(|id| {
                self.objects
                    .get(*id)
                    .is_some_and(|o| self.schema.is_a(&o.type_name, type_name))
            })
            .collect()
    }

    // ---- tokens ----

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub fn tokens(&self) -> impl Iterator<Item = (TokenId, &Token)> {
        self.tokens.iter()
    }

    pub fn token_key(&self, id: TokenId) -> Option<u64> {
        self.tokens.key(id)
    }

    /// Live tokens in creation order.
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.tokens.ids_by_key()
    }

    /// The token owning `var`, if any.
    pub fn owner_token(&self, var: VarId) -> Option<TokenId> {
        match self.engine.variable(var)?.owner() {
            Owner::Token(t) if self.tokens.contains(t) => Some(t),
            _ => None,
        }
    }

    fn token_ref(&self, id: TokenId) -> Result<&Token, PlanError> {
        self.tokens.get(id).ok_or(PlanError::UnknownToken(id))
    }

    fn token_mut(&mut self, id: TokenId) -> Result<&mut Token, PlanError> {
        self.tokens.get_mut(id).ok_or(PlanError::UnknownToken(id))
    }

    fn invalid(&self, id: TokenId, action: &'static str) -> PlanError {
        PlanError::InvalidTransition {
            token: id,
            state: self.tokens.get(id).map_or(TokenState::Inactive, |t| t.state),
            action,
        }
    }

    /// Creates an inactive token with its timepoint, object, and
    /// parameter variables, its duration constraint, and the constraints
    /// realising its master relation. Owned constraints stay suspended
    /// until the token is activated or merged.
    pub fn create_token(&mut self, request: NewToken) -> Result<TokenId, PlanError> {
        let NewToken {
            predicate,
            parameters,
            object_type,
            duration,
            master,
            rejectable,
            usage,
        } = request;
        if !self.schema.is_predicate(&predicate) {
            return Err(PlanError::UnknownPredicate(predicate));
        }
        let names: Vec<String> = self
            .schema
            .parameters(&predicate)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        if names.len() != parameters.len() {
            return Err(PlanError::ParameterCount {
                predicate,
                expected: names.len(),
                found: parameters.len(),
            });
        }
        let master_points = match master {
            Some((m, _)) => {
                let mt = self.token_ref(m)?;
                Some((mt.start, mt.end))
            }
            None => None,
        };
        let objects = match &object_type {
            Some(ty) => {
                let ids = self.objects_of_type(ty);
                if ids.is_empty() {
                    return Err(PlanError::NoObjects(ty.clone()));
                }
                Some(Domain::objects(ids))
            }
            None => None,
        };

        let (h0, h1) = self.horizon;
        let duration = duration.unwrap_or_else(|| Domain::int_interval(0.0, h1 - h0));
        let engine = &mut self.engine;
        let name = predicate.clone();
        let id = self.tokens.insert_with(|id| {
            let owner = Owner::Token(id);
            let start = engine.create_variable("start", Domain::int_interval(h0, h1), true, owner);
            let end = engine.create_variable("end", Domain::int_interval(h0, h1), true, owner);
            let duration = engine.create_variable("duration", duration, true, owner);
            let object = objects.map(|d| engine.create_variable("object", d, true, owner));
            let parameters = names
                .iter()
                .zip(parameters)
                .map(|(n, d)| engine.create_variable(n.clone(), d, true, owner))
                .collect();
            Token {
                predicate: name,
                state: TokenState::Inactive,
                start,
                end,
                duration,
                object,
                parameters,
                master,
                slaves: Vec::new(),
                rejectable,
                usage,
                constraints: Vec::new(),
                merged_into: None,
                merge_constraints: Vec::new(),
                contribution: None,
            }
        });

        let (start, end, dur) = {
            let t = self.token_ref(id)?;
            (t.start, t.end, t.duration)
        };
        let mut owned = vec![self.add_owned(id, AddEqual::temporal(), vec![start, dur, end])?];
        if let (Some((m, relation)), Some((ms, me))) = (master, master_points) {
            for (x, y, min, max) in relation.edges() {
                let point = |p: &Timepoint| match p {
                    Timepoint::MasterStart => ms,
                    Timepoint::MasterEnd => me,
                    Timepoint::SlaveStart => start,
                    Timepoint::SlaveEnd => end,
                };
                let scope = vec![point(x), point(y)];
                owned.push(self.add_owned(id, TemporalDistance::new(*min, *max), scope)?);
            }
            self.token_mut(m)?.slaves.push(id);
        }
        self.token_mut(id)?.constraints = owned;

        debug!(token = ?id, predicate = %predicate, "token created");
        self.engine.publish(PlanEvent::TokenAdded(id));
        Ok(id)
    }

    fn add_owned(
        &mut self,
        owner: TokenId,
        rule: impl ConstraintRule + 'static,
        scope: Vec<VarId>,
    ) -> Result<ConstraintId, PlanError> {
        Ok(self
            .engine
            .add_owned_constraint(Box::new(rule), scope, Some(owner), false, Vec::new())?)
    }

    /// Adds a constraint watching `guards`, unowned and active.
    pub fn add_guarded_constraint(
        &mut self,
        rule: impl ConstraintRule + 'static,
        scope: Vec<VarId>,
        guards: Vec<VarId>,
    ) -> Result<ConstraintId, PlanError> {
        Ok(self
            .engine
            .add_owned_constraint(Box::new(rule), scope, None, true, guards)?)
    }

    fn set_owned_active(&mut self, id: TokenId, active: bool) -> Result<(), PlanError> {
        let constraints = self.token_ref(id)?.constraints.clone();
        for c in constraints {
            if self.engine.constraint(c).is_none() {
                continue;
            }
            if active {
                self.engine.activate_constraint(c)?;
            } else {
                self.engine.deactivate_constraint(c)?;
            }
        }
        Ok(())
    }

    fn set_state(&mut self, id: TokenId, state: TokenState) -> Result<(), PlanError> {
        self.token_mut(id)?.state = state;
        Ok(())
    }

    fn has_merged_tokens(&self, id: TokenId) -> bool {
        self.tokens.iter().any(|(_, t)| t.merged_into == Some(id))
    }

    /// Objects whose sequence holds `id`.
    fn sequencing_objects(&self, id: TokenId) -> Vec<ObjectId> {
        self.objects
            .ids_by_key()
            .into_iter()
            .filter(|o| self.objects.get(*o).is_some_and(|obj| obj.is_sequenced(id)))
            .collect()
    }

    pub fn is_sequenced(&self, id: TokenId) -> bool {
        self.objects.iter().any(|(_, o)| o.is_sequenced(id))
    }

    /// Claims capacity when the token sits on a single resource object.
    fn attach_resource(&mut self, id: TokenId) -> Result<(), PlanError> {
        let t = self.token_ref(id)?;
        let (start, end, usage) = (t.start, t.end, t.usage);
        let Some(object) = t
            .object
            .and_then(|v| self.domain(v))
            .and_then(Domain::singleton_value)
            .and_then(|v| v.as_object())
        else {
            return Ok(());
        };
        let Some(ObjectKind::Resource { profile, .. }) = self.objects.get(object).map(Object::kind) else {
            return Ok(());
        };
        self.engine
            .add_contribution(profile, id, start, end, usage)?;
        self.token_mut(id)?.contribution = Some(profile);
        Ok(())
    }

    fn detach_resource(&mut self, id: TokenId) -> Result<(), PlanError> {
        if let Some(profile) = self.token_mut(id)?.contribution.take() {
            self.engine.remove_contribution(profile, id)?;
        }
        Ok(())
    }

    pub fn activate(&mut self, id: TokenId) -> Result<(), PlanError> {
        if self.token_ref(id)?.state != TokenState::Inactive {
            return Err(self.invalid(id, "activate"));
        }
        self.set_state(id, TokenState::Active)?;
        self.set_owned_active(id, true)?;
        self.attach_resource(id)?;
        debug!(token = ?id, "token activated");
        self.engine.publish(PlanEvent::TokenActivated(id));
        Ok(())
    }

    /// Returns an active token to the inactive state. Fails while tokens
    /// are merged onto it or it is sequenced on a timeline.
    pub fn deactivate(&mut self, id: TokenId) -> Result<(), PlanError> {
        if self.token_ref(id)?.state != TokenState::Active
            || self.has_merged_tokens(id)
            || self.is_sequenced(id)
        {
            return Err(self.invalid(id, "deactivate"));
        }
        self.set_state(id, TokenState::Inactive)?;
        self.set_owned_active(id, false)?;
        self.detach_resource(id)?;
        debug!(token = ?id, "token deactivated");
        self.engine.publish(PlanEvent::TokenDeactivated(id));
        Ok(())
    }

    /// Pairs of corresponding variables of two tokens.
    fn corresponding_vars(&self, a: TokenId, b: TokenId) -> Option<Vec<(VarId, VarId)>> {
        let (ta, tb) = (self.tokens.get(a)?, self.tokens.get(b)?);
        if ta.parameters.len() != tb.parameters.len() || ta.object.is_some() != tb.object.is_some() {
            return None;
        }
        let mut pairs = vec![(ta.start, tb.start), (ta.end, tb.end), (ta.duration, tb.duration)];
        if let (Some(x), Some(y)) = (ta.object, tb.object) {
            pairs.push((x, y));
        }
        pairs.extend(ta.parameters.iter().copied().zip(tb.parameters.iter().copied()));
        Some(pairs)
    }

    fn can_unify(&self, a: TokenId, b: TokenId) -> bool {
        let same_predicate = match (self.tokens.get(a), self.tokens.get(b)) {
            (Some(x), Some(y)) => x.predicate == y.predicate,
            _ => false,
        };
        same_predicate
            && self.corresponding_vars(a, b).is_some_and(|pairs| {
                pairs.iter().all(|(x, y)| match (self.domain(*x), self.domain(*y)) {
                    (Some(dx), Some(dy)) => dx.intersects(dy),
                    _ => false,
                })
            })
    }

    /// Unifies an inactive token with an active one of the same predicate.
    pub fn merge(&mut self, id: TokenId, target: TokenId) -> Result<(), PlanError> {
        if self.token_ref(id)?.state != TokenState::Inactive {
            return Err(self.invalid(id, "merge"));
        }
        if id == target || !self.token_ref(target)?.is_active() || !self.can_unify(id, target) {
            return Err(PlanError::Incompatible(id, target));
        }
        let pairs = self
            .corresponding_vars(id, target)
            .ok_or(PlanError::Incompatible(id, target))?;
        let mut merge_constraints = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            merge_constraints.push(self.engine.add_owned_constraint(
                Box::new(Equal),
                vec![a, b],
                Some(id),
                true,
                Vec::new(),
            )?);
        }
        let t = self.token_mut(id)?;
        t.state = TokenState::Merged;
        t.merged_into = Some(target);
        t.merge_constraints = merge_constraints;
        self.set_owned_active(id, true)?;
        debug!(token = ?id, target = ?target, "token merged");
        self.engine
            .publish(PlanEvent::TokenMerged { token: id, target });
        Ok(())
    }

    /// Undoes a merge.
    pub fn split(&mut self, id: TokenId) -> Result<(), PlanError> {
        if self.token_ref(id)?.state != TokenState::Merged {
            return Err(self.invalid(id, "split"));
        }
        let t = self.token_mut(id)?;
        let merge_constraints = std::mem::take(&mut t.merge_constraints);
        t.merged_into = None;
        t.state = TokenState::Inactive;
        for c in merge_constraints {
            if self.engine.constraint(c).is_some() {
                self.engine.remove_constraint(c)?;
            }
        }
        self.set_owned_active(id, false)?;
        debug!(token = ?id, "token split");
        self.engine.publish(PlanEvent::TokenSplit(id));
        Ok(())
    }

    pub fn reject(&mut self, id: TokenId) -> Result<(), PlanError> {
        let t = self.token_ref(id)?;
        if t.state != TokenState::Inactive || !t.rejectable {
            return Err(self.invalid(id, "reject"));
        }
        self.set_state(id, TokenState::Rejected)?;
        debug!(token = ?id, "token rejected");
        self.engine.publish(PlanEvent::TokenRejected(id));
        Ok(())
    }

    pub fn reinstate(&mut self, id: TokenId) -> Result<(), PlanError> {
        if self.token_ref(id)?.state != TokenState::Rejected {
            return Err(self.invalid(id, "reinstate"));
        }
        self.set_state(id, TokenState::Inactive)?;
        self.engine.publish(PlanEvent::TokenReinstated(id));
        Ok(())
    }

    /// Deletes a token, its placements, constraints, and variables.
    pub fn delete_token(&mut self, id: TokenId) -> Result<(), PlanError> {
        if self.has_merged_tokens(id) {
            return Err(self.invalid(id, "delete"));
        }
        if self.token_ref(id)?.state == TokenState::Merged {
            self.split(id)?;
        }
        for object in self.sequencing_objects(id) {
            self.free(object, id)?;
        }
        self.detach_resource(id)?;
        let t = self.token_ref(id)?;
        let (constraints, vars, master) = (t.constraints.clone(), t.variables(), t.master);
        for c in constraints {
            if self.engine.constraint(c).is_some() {
                self.engine.remove_constraint(c)?;
            }
        }
        for v in vars {
            self.engine.delete_variable(v)?;
        }
        if let Some((m, _)) = master {
            if let Some(mt) = self.tokens.get_mut(m) {
                mt.slaves.retain(|s| *s != id);
            }
        }
        self.tokens.remove(id);
        debug!(token = ?id, "token deleted");
        self.engine.publish(PlanEvent::TokenRemoved(id));
        Ok(())
    }

    // ---- query surface ----

    /// Active tokens `id` could merge onto, by key.
    pub fn compatible_tokens(&self, id: TokenId) -> Vec<TokenId> {
        self.tokens
            .ids_by_key()
            .into_iter()
            .filter(|o| *o != id && self.tokens.get(*o).is_some_and(Token::is_active))
            .filter(|o| self.can_unify(id, *o))
            .collect()
    }

    /// False when the token's object variable has no value left.
    pub fn can_activate(&self, id: TokenId) -> bool {
        match self.tokens.get(id) {
            Some(t) => t
                .object
                .and_then(|v| self.domain(v))
                .map_or(true, |d| !d.is_empty()),
            None => false,
        }
    }

    /// Timeline objects still allowed for the token, by key.
    fn timeline_candidates(&self, id: TokenId) -> Vec<ObjectId> {
        let Some(values) = self
            .tokens
            .get(id)
            .and_then(|t| t.object)
            .and_then(|v| self.domain(v))
            .and_then(Domain::values)
        else {
            return Vec::new();
        };
        let mut objects: Vec<ObjectId> = values
            .iter()
            .filter_map(Value::as_object)
            .filter(|o| self.objects.get(*o).is_some_and(Object::is_timeline))
            .collect();
        objects.sort_by_key(|o| self.objects.key(*o));
        objects
    }

    /// Active tokens that still need a place on some timeline, by key.
    pub fn tokens_to_order(&self) -> Vec<TokenId> {
        self.tokens
            .ids_by_key()
            .into_iter()
            .filter(|t| self.tokens.get(*t).is_some_and(Token::is_active))
            .filter(|t| !self.is_sequenced(*t) && !self.timeline_candidates(*t).is_empty())
            .collect()
    }

    /// Whether `a` can still end before `b` starts.
    pub fn can_precede(&self, a: TokenId, b: TokenId) -> bool {
        let (Some(ta), Some(tb)) = (self.tokens.get(a), self.tokens.get(b)) else {
            return false;
        };
        match (self.domain(ta.end), self.domain(tb.start)) {
            (Some(end), Some(start)) => end.lb() <= start.ub(),
            _ => false,
        }
    }

    /// Insertion points for `id` across its candidate timelines.
    pub fn ordering_choices(&self, id: TokenId) -> Vec<OrderingChoice> {
        let mut choices = Vec::new();
        for object in self.timeline_candidates(id) {
            let Some(seq) = self.objects.get(object).map(Object::sequence) else {
                continue;
            };
            let Some(first) = seq.first() else {
                choices.push(OrderingChoice {
                    object,
                    predecessor: id,
                    successor: id,
                });
                continue;
            };
            if self.can_precede(id, *first) {
                choices.push(OrderingChoice {
                    object,
                    predecessor: id,
                    successor: *first,
                });
            }
            for (i, prev) in seq.iter().enumerate() {
                let fits_next = seq.get(i + 1).map_or(true, |n| self.can_precede(id, *n));
                if fits_next && self.can_precede(*prev, id) {
                    choices.push(OrderingChoice {
                        object,
                        predecessor: *prev,
                        successor: id,
                    });
                }
            }
        }
        choices
    }

    /// Earliest start of a token.
    pub fn earliest_start(&self, id: TokenId) -> f64 {
        self.tokens
            .get(id)
            .and_then(|t| self.domain(t.start))
            .map_or(f64::INFINITY, Domain::lb)
    }

    /// Midpoint between earliest start and earliest end.
    pub fn midpoint(&self, id: TokenId) -> f64 {
        let Some(t) = self.tokens.get(id) else {
            return f64::INFINITY;
        };
        let start = self.domain(t.start).map_or(f64::INFINITY, Domain::lb);
        let end = self.domain(t.end).map_or(f64::INFINITY, Domain::lb);
        (start + end) / 2.0
    }

    /// Places a token on a timeline. Returns the token that was placed.
    ///
    /// The object variable is specified to the timeline if needed, and
    /// precedence constraints to the new neighbours are added.
    pub fn constrain(&mut self, choice: OrderingChoice) -> Result<TokenId, PlanError> {
        let OrderingChoice {
            object,
            predecessor,
            successor,
        } = choice;
        let invalid = PlanError::InvalidOrdering {
            object,
            predecessor,
            successor,
        };
        let obj = self
            .objects
            .get(object)
            .ok_or(PlanError::UnknownObject(object))?;
        if !obj.is_timeline() {
            return Err(invalid);
        }
        let position = |t: TokenId| obj.sequence.iter().position(|s| *s == t);
        let (token, index) = if predecessor == successor {
            if !obj.sequence.is_empty() {
                return Err(invalid);
            }
            (predecessor, 0)
        } else {
            match (position(predecessor), position(successor)) {
                (Some(p), None) => (successor, p + 1),
                (None, Some(s)) => (predecessor, s),
                _ => return Err(invalid),
            }
        };
        let t = self.token_ref(token)?;
        if !t.is_active() {
            return Err(self.invalid(token, "constrain"));
        }
        let object_var = t.object.ok_or(invalid)?;
        let (start, end) = (t.start, t.end);

        let target = Value::Object(object);
        let prior = self
            .engine
            .variable(object_var)
            .map(|v| v.specified().clone())
            .ok_or(PlanError::UnknownToken(token))?;
        let specified = if prior.singleton_value() == Some(target.clone()) {
            None
        } else {
            self.engine
                .specify(object_var, &Domain::singleton(target))?;
            Some((object_var, prior))
        };

        let (prev, next) = {
            let seq = &self.objects.get(object).ok_or(PlanError::UnknownObject(object))?.sequence;
            let prev = index.checked_sub(1).and_then(|i| seq.get(i)).copied();
            (prev, seq.get(index).copied())
        };
        let mut constraints = Vec::new();
        if let Some(p) = prev {
            let p_end = self.token_ref(p)?.end;
            constraints.push(self.engine.add_owned_constraint(
                Box::new(TemporalDistance::precedes()),
                vec![p_end, start],
                Some(token),
                true,
                Vec::new(),
            )?);
        }
        if let Some(n) = next {
            let n_start = self.token_ref(n)?.start;
            constraints.push(self.engine.add_owned_constraint(
                Box::new(TemporalDistance::precedes()),
                vec![end, n_start],
                Some(token),
                true,
                Vec::new(),
            )?);
        }

        let obj = self
            .objects
            .get_mut(object)
            .ok_or(PlanError::UnknownObject(object))?;
        obj.sequence.insert(index, token);
        obj.placements.push(Placement {
            token,
            predecessor,
            successor,
            constraints,
            specified,
        });
        self.engine.note_ordering(&[predecessor, successor]);
        debug!(object = ?object, token = ?token, index, "token sequenced");
        self.engine.publish(PlanEvent::OrderingAdded {
            object,
            predecessor,
            successor,
        });
        Ok(token)
    }

    /// Removes a token from a timeline. Placements are expected to be
    /// freed in reverse order of `constrain`.
    pub fn free(&mut self, object: ObjectId, token: TokenId) -> Result<(), PlanError> {
        let obj = self
            .objects
            .get_mut(object)
            .ok_or(PlanError::UnknownObject(object))?;
        let index = obj
            .placements
            .iter()
            .rposition(|p| p.token == token)
            .ok_or(PlanError::NotSequenced { token, object })?;
        let placement = obj.placements.remove(index);
        obj.sequence.retain(|t| *t != token);

        for c in placement.constraints {
            if self.engine.constraint(c).is_some() {
                self.engine.remove_constraint(c)?;
            }
        }
        if let Some((var, prior)) = placement.specified {
            if self.engine.variable(var).is_some() {
                self.engine.restore_specified(var, &prior)?;
            }
        }
        self.engine
            .note_ordering(&[placement.predecessor, placement.successor]);
        debug!(object = ?object, token = ?token, "token freed");
        self.engine.publish(PlanEvent::OrderingRemoved {
            object,
            predecessor: placement.predecessor,
            successor: placement.successor,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SubscriberId;
    use crate::plan::{Relation, SimpleSchema};

    fn schema() -> SimpleSchema {
        let mut s = SimpleSchema::new();
        s.add_type("Rover", None)
            .add_type("Battery", None)
            .add_predicate("Drive", None, &["speed"])
            .add_predicate("Charge", None, &[])
            .add_predicate("Sample", None, &[]);
        s
    }

    fn drive(db: &mut PlanDatabase) -> TokenId {
        db.create_token(
            NewToken::new("Drive")
                .with_parameter(Domain::int_interval(1.0, 3.0))
                .with_object_type("Rover"),
        )
        .unwrap()
    }

    fn events(db: &mut PlanDatabase, sub: SubscriberId) -> Vec<PlanEvent> {
        db.engine_mut().drain_events(sub)
    }

    #[test]
    fn test_create_token_validates_request() {
        let mut db = PlanDatabase::new(schema());
        assert!(matches!(
            db.create_token(NewToken::new("Fly")),
            Err(PlanError::UnknownPredicate(_))
        ));
        assert!(matches!(
            db.create_token(NewToken::new("Drive")),
            Err(PlanError::ParameterCount { expected: 1, found: 0, .. })
        ));
        assert!(matches!(
            db.create_token(
                NewToken::new("Charge").with_object_type("Rover")
            ),
            Err(PlanError::NoObjects(_))
        ));
    }

    #[test]
    fn test_token_constraints_follow_activity() {
        let mut db = PlanDatabase::new(schema());
        db.create_timeline("r1", "Rover");
        let t = drive(&mut db);
        let (start, end, dur) = {
            let tok = db.token(t).unwrap();
            (tok.start(), tok.end(), tok.duration())
        };
        db.engine_mut()
            .specify(dur, &Domain::singleton(Value::number(10.0)))
            .unwrap();
        db.engine_mut()
            .specify(start, &Domain::singleton(Value::number(5.0)))
            .unwrap();
        assert!(db.propagate());
        assert_eq!(db.engine().last_domain(end).unwrap().bounds(), Some((0.0, 1000.0)));

        db.activate(t).unwrap();
        assert!(db.propagate());
        assert_eq!(
            db.engine().last_domain(end).unwrap().singleton_value(),
            Some(Value::number(15.0))
        );

        db.deactivate(t).unwrap();
        assert!(db.propagate());
        assert_eq!(db.engine().last_domain(end).unwrap().bounds(), Some((0.0, 1000.0)));
    }

    #[test]
    fn test_state_transitions() {
        let mut db = PlanDatabase::new(schema());
        let sub = db.engine_mut().subscribe("test");
        let t = db.create_token(NewToken::new("Charge").rejectable()).unwrap();
        assert!(events(&mut db, sub).contains(&PlanEvent::TokenAdded(t)));

        assert!(db.reinstate(t).is_err());
        db.reject(t).unwrap();
        assert!(matches!(
            db.activate(t),
            Err(PlanError::InvalidTransition { state: TokenState::Rejected, .. })
        ));
        db.reinstate(t).unwrap();
        db.activate(t).unwrap();
        assert!(db.reject(t).is_err());
        let seen = events(&mut db, sub);
        assert!(seen.contains(&PlanEvent::TokenRejected(t)));
        assert!(seen.contains(&PlanEvent::TokenReinstated(t)));
        assert!(seen.contains(&PlanEvent::TokenActivated(t)));
    }

    #[test]
    fn test_merge_and_split() {
        let mut db = PlanDatabase::new(schema());
        db.create_timeline("r1", "Rover");
        let a = drive(&mut db);
        let b = drive(&mut db);
        db.activate(a).unwrap();
        let speed_a = db.token(a).unwrap().parameter(0).unwrap();
        let speed_b = db.token(b).unwrap().parameter(0).unwrap();
        db.engine_mut()
            .specify(speed_a, &Domain::singleton(Value::number(2.0)))
            .unwrap();
        assert!(db.propagate());
        assert_eq!(db.compatible_tokens(b), vec![a]);

        db.merge(b, a).unwrap();
        assert!(db.propagate());
        assert_eq!(db.token(b).unwrap().merged_into(), Some(a));
        assert!(db.engine().last_domain(speed_b).unwrap().is_singleton());
        assert!(db.deactivate(a).is_err());
        assert!(db.delete_token(a).is_err());

        db.split(b).unwrap();
        assert!(db.propagate());
        assert_eq!(db.engine().last_domain(speed_b).unwrap().bounds(), Some((1.0, 3.0)));
        assert_eq!(db.token(b).unwrap().state(), TokenState::Inactive);
    }

    #[test]
    fn test_incompatible_merge() {
        let mut db = PlanDatabase::new(schema());
        db.create_timeline("r1", "Rover");
        let a = drive(&mut db);
        let b = db
            .create_token(
                NewToken::new("Drive")
                    .with_parameter(Domain::int_interval(5.0, 6.0))
                    .with_object_type("Rover"),
            )
            .unwrap();
        db.activate(a).unwrap();
        assert!(db.propagate());
        assert!(db.compatible_tokens(b).is_empty());
        assert!(matches!(db.merge(b, a), Err(PlanError::Incompatible(_, _))));
    }

    #[test]
    fn test_master_relation_constraints() {
        let mut db = PlanDatabase::new(schema());
        let master = db.create_token(NewToken::new("Charge")).unwrap();
        let slave = db
            .create_token(NewToken::new("Sample").with_master(master, Relation::Meets))
            .unwrap();
        assert_eq!(db.token(master).unwrap().slaves(), &[slave]);
        assert_eq!(db.token(slave).unwrap().master_relation(), Relation::Meets);

        db.activate(master).unwrap();
        db.activate(slave).unwrap();
        let ms = db.token(master).unwrap().start();
        let se = db.token(slave).unwrap().end();
        db.engine_mut()
            .specify(ms, &Domain::singleton(Value::number(40.0)))
            .unwrap();
        assert!(db.propagate());
        assert_eq!(
            db.engine().last_domain(se).unwrap().singleton_value(),
            Some(Value::number(40.0))
        );
    }

    #[test]
    fn test_ordering_choices_and_constrain() {
        let mut db = PlanDatabase::new(schema());
        let sub = db.engine_mut().subscribe("test");
        let r1 = db.create_timeline("r1", "Rover");
        let r2 = db.create_timeline("r2", "Rover");
        let a = drive(&mut db);
        let b = drive(&mut db);
        db.activate(a).unwrap();
        db.activate(b).unwrap();
        assert!(db.propagate());
        assert_eq!(db.tokens_to_order(), vec![a, b]);

        let first = db.ordering_choices(a);
        assert_eq!(
            first,
            vec![
                OrderingChoice {
                    object: r1,
                    predecessor: a,
                    successor: a
                },
                OrderingChoice {
                    object: r2,
                    predecessor: a,
                    successor: a
                },
            ]
        );
        assert_eq!(db.constrain(first[0]).unwrap(), a);
        assert!(db.propagate());
        assert_eq!(db.tokens_to_order(), vec![b]);
        let obj_var = db.token(a).unwrap().object().unwrap();
        assert!(db.engine().variable(obj_var).unwrap().is_specified());

        let choices = db.ordering_choices(b);
        assert_eq!(choices.len(), 3);
        assert_eq!((choices[0].predecessor, choices[0].successor), (b, a));
        assert_eq!((choices[1].predecessor, choices[1].successor), (a, b));
        assert_eq!(choices[2].object, r2);

        db.constrain(choices[1]).unwrap();
        assert!(db.propagate());
        assert_eq!(db.object(r1).unwrap().sequence(), &[a, b]);
        assert!(db.deactivate(b).is_err());

        db.free(r1, b).unwrap();
        db.free(r1, a).unwrap();
        assert!(db.propagate());
        assert!(db.object(r1).unwrap().sequence().is_empty());
        assert!(!db.engine().variable(obj_var).unwrap().is_specified());
        assert!(matches!(db.free(r1, a), Err(PlanError::NotSequenced { .. })));
        let seen = events(&mut db, sub);
        assert_eq!(
            seen.iter()
                .filter(|e| matches!(e, PlanEvent::OrderingRemoved { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_sequence_precedence_propagates() {
        let mut db = PlanDatabase::new(schema());
        let rover = db.create_timeline("r1", "Rover");
        let a = drive(&mut db);
        let b = drive(&mut db);
        db.activate(a).unwrap();
        db.activate(b).unwrap();
        db.constrain(OrderingChoice {
            object: rover,
            predecessor: a,
            successor: a,
        })
        .unwrap();
        db.constrain(OrderingChoice {
            object: rover,
            predecessor: a,
            successor: b,
        })
        .unwrap();
        let a_end = db.token(a).unwrap().end();
        let b_start = db.token(b).unwrap().start();
        db.engine_mut()
            .specify(a_end, &Domain::singleton(Value::number(30.0)))
            .unwrap();
        assert!(db.propagate());
        assert_eq!(db.engine().last_domain(b_start).unwrap().lb(), 30.0);
    }

    #[test]
    fn test_resource_overload_fails_propagation() {
        let mut db = PlanDatabase::new(schema());
        db.create_resource("battery", "Battery", 1.0);
        let mut tokens = Vec::new();
        for _ in 0..2 {
            let t = db
                .create_token(NewToken::new("Charge").with_object_type("Battery"))
                .unwrap();
            db.activate(t).unwrap();
            let (start, dur) = {
                let tok = db.token(t).unwrap();
                (tok.start(), tok.duration())
            };
            db.engine_mut()
                .specify(start, &Domain::singleton(Value::number(0.0)))
                .unwrap();
            db.engine_mut()
                .specify(dur, &Domain::singleton(Value::number(10.0)))
                .unwrap();
            tokens.push(t);
        }
        assert!(!db.propagate());

        db.deactivate(tokens[1]).unwrap();
        assert!(db.propagate());
        assert!(db.tokens_to_order().is_empty());
    }

    #[test]
    fn test_delete_token_cleans_up() {
        let mut db = PlanDatabase::new(schema());
        let rover = db.create_timeline("r1", "Rover");
        let a = drive(&mut db);
        db.activate(a).unwrap();
        assert!(db.propagate());
        db.constrain(OrderingChoice {
            object: rover,
            predecessor: a,
            successor: a,
        })
        .unwrap();
        let vars_before = db.engine().variable_count();
        db.delete_token(a).unwrap();
        assert!(db.token(a).is_none());
        assert_eq!(db.engine().variable_count(), vars_before - 5);
        assert_eq!(db.engine().constraint_count(), 0);
        assert!(db.object(rover).unwrap().sequence().is_empty());
        assert!(db.propagate());
    }
}
