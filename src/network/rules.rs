//! Constraint rule library.
//!
//! Arithmetic rules use bounds reasoning; `Equal` and `NotEqual` work on
//! any domain kind. Infinite bounds are handled explicitly so that
//! `inf - inf` never produces NaN.

use super::constraint::{ConstraintRule, PropagatorKind};
use crate::domain::Domain;

const INF: f64 = f64::INFINITY;

fn lower_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY || b == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        a + b
    }
}

fn upper_add(a: f64, b: f64) -> f64 {
    if a == INF || b == INF {
        INF
    } else {
        a + b
    }
}

/// Lower bound of `a - b` given `a` lower and `b` upper.
fn lower_sub(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY || b == INF {
        f64::NEG_INFINITY
    } else {
        a - b
    }
}

/// Upper bound of `a - b` given `a` upper and `b` lower.
fn upper_sub(a: f64, b: f64) -> f64 {
    if a == INF || b == f64::NEG_INFINITY {
        INF
    } else {
        a - b
    }
}

/// All scope variables take the same value.
#[derive(Debug, Clone, Default)]
pub struct Equal;

impl ConstraintRule for Equal {
    fn name(&self) -> &str {
        "eq"
    }

    fn execute(&self, scope: &mut [Domain]) {
        let Some((first, rest)) = scope.split_first() else {
            return;
        };
        let mut common = first.clone();
        for d in rest {
            common.intersect(d);
        }
        for d in scope.iter_mut() {
            d.intersect(&common);
        }
    }
}

/// Two variables take different values.
#[derive(Debug, Clone, Default)]
pub struct NotEqual;

impl ConstraintRule for NotEqual {
    fn name(&self) -> &str {
        "neq"
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }

    fn execute(&self, scope: &mut [Domain]) {
        if let Some(v) = scope[0].singleton_value() {
            scope[1].remove(&v);
        }
        if let Some(v) = scope[1].singleton_value() {
            scope[0].remove(&v);
        }
    }
}

/// `x <= y`.
#[derive(Debug, Clone, Default)]
pub struct LessThanEqual;

impl ConstraintRule for LessThanEqual {
    fn name(&self) -> &str {
        "leq"
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }

    fn execute(&self, scope: &mut [Domain]) {
        let (Some((xl, _)), Some((_, yu))) = (scope[0].bounds(), scope[1].bounds()) else {
            return;
        };
        scope[0].intersect_bounds(f64::NEG_INFINITY, yu);
        scope[1].intersect_bounds(xl, INF);
    }
}

/// `x < y`. Integer domains use a step of one; real domains only reject
/// the case where `x` cannot lie strictly below `y`.
#[derive(Debug, Clone, Default)]
pub struct LessThan;

impl ConstraintRule for LessThan {
    fn name(&self) -> &str {
        "lt"
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }

    fn execute(&self, scope: &mut [Domain]) {
        let (Some((xl, _)), Some((_, yu))) = (scope[0].bounds(), scope[1].bounds()) else {
            return;
        };
        let integral = scope[0].kind().is_integer() && scope[1].kind().is_integer();
        if integral {
            scope[0].intersect_bounds(f64::NEG_INFINITY, upper_sub(yu, 1.0));
            scope[1].intersect_bounds(lower_add(xl, 1.0), INF);
        } else {
            scope[0].intersect_bounds(f64::NEG_INFINITY, yu);
            scope[1].intersect_bounds(xl, INF);
            if scope[0].lb() >= scope[1].ub() {
                scope[0].empty();
            }
        }
    }
}

/// `x + y = z`.
#[derive(Debug, Clone)]
pub struct AddEqual {
    propagator: PropagatorKind,
}

impl AddEqual {
    pub fn new() -> Self {
        Self {
            propagator: PropagatorKind::Default,
        }
    }

    /// Scheduled on the temporal agenda (e.g. `start + duration = end`).
    pub fn temporal() -> Self {
        Self {
            propagator: PropagatorKind::Temporal,
        }
    }
}

impl Default for AddEqual {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintRule for AddEqual {
    fn name(&self) -> &str {
        "add_eq"
    }

    fn propagator(&self) -> PropagatorKind {
        self.propagator
    }

    fn arity(&self) -> Option<usize> {
        Some(3)
    }

    fn execute(&self, scope: &mut [Domain]) {
        let (Some((xl, xu)), Some((yl, yu)), Some((zl, zu))) =
            (scope[0].bounds(), scope[1].bounds(), scope[2].bounds())
        else {
            return;
        };
        scope[2].intersect_bounds(lower_add(xl, yl), upper_add(xu, yu));
        let (zl, zu) = scope[2].bounds().unwrap_or((zl, zu));
        scope[0].intersect_bounds(lower_sub(zl, yu), upper_sub(zu, yl));
        let (xl, xu) = scope[0].bounds().unwrap_or((xl, xu));
        scope[1].intersect_bounds(lower_sub(zl, xu), upper_sub(zu, xl));
    }
}

/// `min <= y - x <= max` on the temporal agenda.
#[derive(Debug, Clone)]
pub struct TemporalDistance {
    pub min: f64,
    pub max: f64,
}

impl TemporalDistance {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `x <= y`: the precedence edge between two timepoints.
    pub fn precedes() -> Self {
        Self::new(0.0, INF)
    }

    /// `y - x` is exactly `d`.
    pub fn exactly(d: f64) -> Self {
        Self::new(d, d)
    }
}

impl ConstraintRule for TemporalDistance {
    fn name(&self) -> &str {
        "temporal_distance"
    }

    fn propagator(&self) -> PropagatorKind {
        PropagatorKind::Temporal
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }

    fn execute(&self, scope: &mut [Domain]) {
        let (Some((xl, xu)), Some(_)) = (scope[0].bounds(), scope[1].bounds()) else {
            return;
        };
        scope[1].intersect_bounds(lower_add(xl, self.min), upper_add(xu, self.max));
        let (yl, yu) = (scope[1].lb(), scope[1].ub());
        scope[0].intersect_bounds(lower_sub(yl, self.max), upper_sub(yu, self.min));
    }
}

/// Restricts a single variable to a fixed domain.
#[derive(Debug, Clone)]
pub struct MemberOf {
    allowed: Domain,
}

impl MemberOf {
    pub fn new(allowed: Domain) -> Self {
        Self { allowed }
    }
}

impl ConstraintRule for MemberOf {
    fn name(&self) -> &str {
        "member_of"
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn execute(&self, scope: &mut [Domain]) {
        scope[0].intersect(&self.allowed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;

    fn run(rule: &dyn ConstraintRule, mut scope: Vec<Domain>) -> Vec<Domain> {
        rule.execute(&mut scope);
        scope
    }

    #[test]
    fn test_equal_intersects_all() {
        let out = run(
            &Equal,
            vec![
                Domain::int_interval(0.0, 10.0),
                Domain::int_interval(5.0, 20.0),
                Domain::numbers([4.0, 6.0, 8.0]),
            ],
        );
        for d in &out {
            assert_eq!(d.values(), Some(vec![Value::number(6.0), Value::number(8.0)]));
        }
    }

    #[test]
    fn test_not_equal_removes_singleton() {
        let out = run(
            &NotEqual,
            vec![Domain::symbols(["a"]), Domain::symbols(["a", "b"])],
        );
        assert_eq!(out[1].singleton_value(), Some(Value::symbol("b")));
    }

    #[test]
    fn test_less_than_equal_bounds() {
        let out = run(
            &LessThanEqual,
            vec![Domain::int_interval(3.0, 10.0), Domain::int_interval(0.0, 6.0)],
        );
        assert_eq!(out[0].bounds(), Some((3.0, 6.0)));
        assert_eq!(out[1].bounds(), Some((3.0, 6.0)));
    }

    #[test]
    fn test_less_than_integer_step() {
        let out = run(
            &LessThan,
            vec![Domain::int_interval(0.0, 10.0), Domain::int_interval(0.0, 5.0)],
        );
        assert_eq!(out[0].bounds(), Some((0.0, 4.0)));
        assert_eq!(out[1].bounds(), Some((1.0, 5.0)));
    }

    #[test]
    fn test_add_equal() {
        let out = run(
            &AddEqual::new(),
            vec![
                Domain::int_interval(0.0, 10.0),
                Domain::int_interval(5.0, 5.0),
                Domain::int_interval(0.0, 8.0),
            ],
        );
        assert_eq!(out[0].bounds(), Some((0.0, 3.0)));
        assert_eq!(out[2].bounds(), Some((5.0, 8.0)));
    }

    #[test]
    fn test_add_equal_with_infinite_bounds() {
        let out = run(
            &AddEqual::temporal(),
            vec![
                Domain::interval(0.0, INF),
                Domain::interval(2.0, 2.0),
                Domain::interval(f64::NEG_INFINITY, INF),
            ],
        );
        assert_eq!(out[2].bounds(), Some((2.0, INF)));
        assert_eq!(out[0].bounds(), Some((0.0, INF)));
    }

    #[test]
    fn test_temporal_distance() {
        let out = run(
            &TemporalDistance::new(2.0, 4.0),
            vec![Domain::int_interval(0.0, 10.0), Domain::int_interval(0.0, 5.0)],
        );
        assert_eq!(out[1].bounds(), Some((2.0, 5.0)));
        assert_eq!(out[0].bounds(), Some((0.0, 3.0)));
    }

    #[test]
    fn test_temporal_distance_detects_cycle() {
        let out = run(
            &TemporalDistance::precedes(),
            vec![Domain::int_interval(8.0, 10.0), Domain::int_interval(0.0, 5.0)],
        );
        assert!(out[1].is_empty() || out[0].is_empty());
    }
}
