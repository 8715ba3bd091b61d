//! Conditions that exclude entities from flaw consideration.

use crate::network::{Owner, VarId};
use crate::plan::{PlanDatabase, TokenId};
use std::collections::HashSet;
use std::fmt;

/// Excludes variables or tokens from the flaw sets.
///
/// Static filters are applied when the tracker classifies an entity, so
/// their answer must depend only on data that does not change during
/// search (names, predicates, base domains). Dynamic filters may read
/// derived domains; they are evaluated at query time and never cached.
pub trait FlawFilter: fmt::Debug {
    fn name(&self) -> &str;

    fn is_dynamic(&self) -> bool {
        false
    }

    fn excludes_variable(&self, _db: &PlanDatabase, _var: VarId) -> bool {
        false
    }

    fn excludes_token(&self, _db: &PlanDatabase, _token: TokenId) -> bool {
        false
    }
}

fn owner_of(db: &PlanDatabase, var: VarId) -> Option<TokenId> {
    match db.engine().variable(var)?.owner() {
        Owner::Token(t) => Some(t),
        _ => None,
    }
}

/// Excludes tokens of the listed predicates (or their descendants) and
/// every variable they own.
#[derive(Debug, Clone, Default)]
pub struct PredicateFilter {
    predicates: Vec<String>,
}

impl PredicateFilter {
    pub fn new<I, S>(predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            predicates: predicates.into_iter().map(Into::into).collect(),
        }
    }
}

impl FlawFilter for PredicateFilter {
    fn name(&self) -> &str {
        "predicate"
    }

    fn excludes_variable(&self, db: &PlanDatabase, var: VarId) -> bool {
        owner_of(db, var).is_some_and(|t| self.excludes_token(db, t))
    }

    fn excludes_token(&self, db: &PlanDatabase, token: TokenId) -> bool {
        let Some(t) = db.token(token) else {
            return false;
        };
        self.predicates
            .iter()
            .any(|p| db.schema().is_a(t.predicate(), p))
    }
}

/// Excludes variables by name.
#[derive(Debug, Clone, Default)]
pub struct VariableNameFilter {
    names: HashSet<String>,
}

impl VariableNameFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl FlawFilter for VariableNameFilter {
    fn name(&self) -> &str {
        "variable_name"
    }

    fn excludes_variable(&self, db: &PlanDatabase, var: VarId) -> bool {
        db.engine()
            .variable(var)
            .is_some_and(|v| self.names.contains(v.name()))
    }
}

/// Excludes variables whose base domain is numerically unbounded, or has
/// more than `max_size` values when a limit is set.
#[derive(Debug, Clone, Default)]
pub struct InfiniteDomainFilter {
    max_size: Option<usize>,
}

impl InfiniteDomainFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }
}

impl FlawFilter for InfiniteDomainFilter {
    fn name(&self) -> &str {
        "infinite_domain"
    }

    fn excludes_variable(&self, db: &PlanDatabase, var: VarId) -> bool {
        let Some(v) = db.engine().variable(var) else {
            return false;
        };
        let base = v.base();
        if base.kind().is_numeric() {
            if let Some((lb, ub)) = base.bounds() {
                if !lb.is_finite() || !ub.is_finite() {
                    return true;
                }
            }
        }
        match (self.max_size, base.size()) {
            (Some(max), Some(n)) => n > max,
            _ => false,
        }
    }
}

/// Excludes tokens that can no longer start inside `[start, end]`, and
/// the variables they own.
#[derive(Debug, Clone, Copy)]
pub struct HorizonFilter {
    pub start: f64,
    pub end: f64,
}

impl HorizonFilter {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

impl FlawFilter for HorizonFilter {
    fn name(&self) -> &str {
        "horizon"
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn excludes_variable(&self, db: &PlanDatabase, var: VarId) -> bool {
        owner_of(db, var).is_some_and(|t| self.excludes_token(db, t))
    }

    fn excludes_token(&self, db: &PlanDatabase, token: TokenId) -> bool {
        let Some(start) = db
            .token(token)
            .and_then(|t| db.engine().last_domain(t.start()))
        else {
            return false;
        };
        start.is_empty() || start.lb() > self.end || start.ub() < self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Value};
    use crate::plan::{NewToken, SimpleSchema};

    fn db() -> PlanDatabase {
        let mut schema = SimpleSchema::new();
        schema
            .add_predicate("Task", None, &["level"])
            .add_predicate("Maintenance", Some("Task"), &[]);
        PlanDatabase::new(schema)
    }

    #[test]
    fn test_predicate_filter_is_schema_aware() {
        let mut db = db();
        let t = db
            .create_token(NewToken::new("Maintenance").with_parameter(Domain::int_interval(0.0, 3.0)))
            .unwrap();
        let level = db.token(t).unwrap().parameter(0).unwrap();
        let filter = PredicateFilter::new(["Task"]);
        assert!(filter.excludes_token(&db, t));
        assert!(filter.excludes_variable(&db, level));
        assert!(!PredicateFilter::new(["Other"]).excludes_token(&db, t));
    }

    #[test]
    fn test_infinite_domain_filter() {
        let mut db = db();
        let open = db.create_global_variable("open", Domain::interval(0.0, f64::INFINITY), true);
        let wide = db.create_global_variable("wide", Domain::int_interval(0.0, 1000.0), true);
        let small = db.create_global_variable("small", Domain::int_interval(0.0, 3.0), true);
        let sym = db.create_global_variable("sym", Domain::symbols(["a", "b"]), true);

        let filter = InfiniteDomainFilter::new();
        assert!(filter.excludes_variable(&db, open));
        assert!(!filter.excludes_variable(&db, wide));

        let bounded = InfiniteDomainFilter::new().with_max_size(10);
        assert!(bounded.excludes_variable(&db, wide));
        assert!(!bounded.excludes_variable(&db, small));
        assert!(!bounded.excludes_variable(&db, sym));
    }

    #[test]
    fn test_horizon_filter_reads_derived_domains() {
        let mut db = db();
        let t = db
            .create_token(NewToken::new("Task").with_parameter(Domain::int_interval(0.0, 3.0)))
            .unwrap();
        let start = db.token(t).unwrap().start();
        let filter = HorizonFilter::new(0.0, 100.0);
        assert!(filter.is_dynamic());
        assert!(!filter.excludes_token(&db, t));

        db.engine_mut()
            .specify(start, &Domain::singleton(Value::number(500.0)))
            .unwrap();
        assert!(filter.excludes_token(&db, t));
        let level = db.token(t).unwrap().parameter(0).unwrap();
        assert!(filter.excludes_variable(&db, level));
    }

    #[test]
    fn test_variable_name_filter() {
        let mut db = db();
        let x = db.create_global_variable("x", Domain::boolean(), true);
        let y = db.create_global_variable("y", Domain::boolean(), true);
        let filter = VariableNameFilter::new(["x"]);
        assert!(filter.excludes_variable(&db, x));
        assert!(!filter.excludes_variable(&db, y));
    }
}
