//! Value-set abstraction.

use super::value::Value;
use crate::error::DomainError;
use crate::plan::ObjectId;
use std::collections::BTreeSet;
use std::fmt;

/// Type tag of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DomainKind {
    IntervalReal,
    IntervalInt,
    EnumNumeric,
    EnumSymbolic,
    Boolean,
    ObjectRef,
}

impl DomainKind {
    /// Whether values of this kind are numbers.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DomainKind::IntervalReal | DomainKind::IntervalInt | DomainKind::EnumNumeric
        )
    }

    pub fn is_integer(self) -> bool {
        self == DomainKind::IntervalInt
    }

    /// Kind of a singleton domain holding `value`.
    pub fn for_value(value: &Value) -> Self {
        match value {
            Value::Bool(_) => DomainKind::Boolean,
            Value::Number(_) => DomainKind::EnumNumeric,
            Value::Symbol(_) => DomainKind::EnumSymbolic,
            Value::Object(_) => DomainKind::ObjectRef,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Repr {
    /// Closed interval; always `lb <= ub` (empty intervals become empty sets).
    Interval { lb: f64, ub: f64 },
    Set(BTreeSet<Value>),
}

/// The legal value set of a variable.
///
/// A domain is either an interval `[lb, ub]` (bounds may be infinite) or a
/// finite ordered set of values. The [`DomainKind`] tag is fixed at
/// construction; the representation may switch from interval to set when
/// an interval is intersected with an enumeration.
///
/// # Examples
///
/// ```
/// use u_plansearch::domain::{Domain, Value};
///
/// let mut d = Domain::int_interval(0.0, 10.0);
/// assert_eq!(d.size(), Some(11));
///
/// d.intersect(&Domain::numbers([3.0, 5.0, 42.0]));
/// assert_eq!(d.values(), Some(vec![Value::number(3.0), Value::number(5.0)]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    kind: DomainKind,
    repr: Repr,
    open: bool,
}

impl Domain {
    /// Real interval `[lb, ub]`.
    pub fn interval(lb: f64, ub: f64) -> Self {
        Self::make_interval(DomainKind::IntervalReal, lb, ub)
    }

    /// Integer interval; bounds are rounded inwards.
    pub fn int_interval(lb: f64, ub: f64) -> Self {
        Self::make_interval(DomainKind::IntervalInt, lb, ub)
    }

    fn make_interval(kind: DomainKind, lb: f64, ub: f64) -> Self {
        let mut d = Self {
            kind,
            repr: Repr::Interval { lb, ub },
            open: false,
        };
        d.normalize();
        d
    }

    /// Enumerated numeric domain.
    pub fn numbers<I: IntoIterator<Item = f64>>(values: I) -> Self {
        Self::enumerated(
            DomainKind::EnumNumeric,
            values.into_iter().map(Value::number),
        )
    }

    /// Enumerated symbolic domain.
    pub fn symbols<'a, I: IntoIterator<Item = &'a str>>(values: I) -> Self {
        Self::enumerated(
            DomainKind::EnumSymbolic,
            values.into_iter().map(Value::symbol),
        )
    }

    /// Object-reference domain.
    pub fn objects<I: IntoIterator<Item = ObjectId>>(values: I) -> Self {
        Self::enumerated(DomainKind::ObjectRef, values.into_iter().map(Value::Object))
    }

    /// `{false, true}`.
    pub fn boolean() -> Self {
        Self::enumerated(
            DomainKind::Boolean,
            [Value::Bool(false), Value::Bool(true)],
        )
    }

    /// Enumerated domain of the given kind.
    pub fn enumerated<I: IntoIterator<Item = Value>>(kind: DomainKind, values: I) -> Self {
        Self {
            kind,
            repr: Repr::Set(values.into_iter().collect()),
            open: false,
        }
    }

    /// Singleton domain; the kind follows the value.
    pub fn singleton(value: Value) -> Self {
        Self::enumerated(DomainKind::for_value(&value), [value])
    }

    /// The empty domain of a kind.
    pub fn empty_of(kind: DomainKind) -> Self {
        Self {
            kind,
            repr: Repr::Set(BTreeSet::new()),
            open: false,
        }
    }

    /// Marks an enumerated domain as open (dynamically extensible).
    pub fn opened(mut self) -> Self {
        if matches!(self.repr, Repr::Set(_)) {
            self.open = true;
        }
        self
    }

    pub fn kind(&self) -> DomainKind {
        self.kind
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_interval(&self) -> bool {
        matches!(self.repr, Repr::Interval { .. })
    }

    pub fn is_empty(&self) -> bool {
        match &self.repr {
            Repr::Interval { .. } => false,
            Repr::Set(s) => s.is_empty(),
        }
    }

    pub fn is_singleton(&self) -> bool {
        match &self.repr {
            Repr::Interval { lb, ub } => lb == ub,
            Repr::Set(s) => s.len() == 1,
        }
    }

    /// The single value of a singleton domain.
    pub fn singleton_value(&self) -> Option<Value> {
        if !self.is_singleton() {
            return None;
        }
        match &self.repr {
            Repr::Interval { lb, .. } => Some(Value::number(*lb)),
            Repr::Set(s) => s.iter().next().cloned(),
        }
    }

    /// Number of values, `None` when infinite or too many to count in a
    /// `usize`.
    pub fn size(&self) -> Option<usize> {
        match &self.repr {
            Repr::Set(s) => Some(s.len()),
            Repr::Interval { lb, ub } => {
                if lb == ub {
                    Some(1)
                } else if self.kind.is_integer() && lb.is_finite() && ub.is_finite() {
                    let span = ub - lb;
                    // `usize::MAX as f64` rounds up, so the cast below never saturates.
                    if span >= usize::MAX as f64 {
                        return None;
                    }
                    (span as usize).checked_add(1)
                } else {
                    None
                }
            }
        }
    }

    /// Whether the domain has finitely many values.
    pub fn is_finite(&self) -> bool {
        self.size().is_some()
    }

    /// Numeric bounds; `None` for empty or non-numeric domains.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match &self.repr {
            Repr::Interval { lb, ub } => Some((*lb, *ub)),
            Repr::Set(s) => {
                let mut nums = s.iter().filter_map(Value::as_number);
                let first = nums.next()?;
                let (lo, hi) = nums.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x)));
                Some((lo, hi))
            }
        }
    }

    /// Lower bound, `-inf` when there is none.
    pub fn lb(&self) -> f64 {
        self.bounds().map_or(f64::NEG_INFINITY, |(lb, _)| lb)
    }

    /// Upper bound, `+inf` when there is none.
    pub fn ub(&self) -> f64 {
        self.bounds().map_or(f64::INFINITY, |(_, ub)| ub)
    }

    pub fn contains(&self, value: &Value) -> bool {
        match &self.repr {
            Repr::Set(s) => s.contains(value),
            Repr::Interval { lb, ub } => match value.as_number() {
                Some(x) => x >= *lb && x <= *ub && (!self.kind.is_integer() || x.fract() == 0.0),
                None => false,
            },
        }
    }

    /// Enumerates the values of a finite domain.
    pub fn values(&self) -> Option<Vec<Value>> {
        match &self.repr {
            Repr::Set(s) => Some(s.iter().cloned().collect()),
            Repr::Interval { lb, ub } => {
                if lb == ub {
                    return Some(vec![Value::number(*lb)]);
                }
                let n = self.size()?;
                Some((0..n).map(|i| Value::number(lb + i as f64)).collect())
            }
        }
    }

    /// Whether every value of `self` is in `other`.
    pub fn is_subset_of(&self, other: &Domain) -> bool {
        if self.is_empty() {
            return true;
        }
        match (&self.repr, &other.repr) {
            (Repr::Set(a), _) => a.iter().all(|v| other.contains(v)),
            (Repr::Interval { lb, ub }, Repr::Interval { lb: olb, ub: oub }) => {
                if other.kind.is_integer() && !self.kind.is_integer() && lb != ub {
                    return false;
                }
                lb >= olb && ub <= oub
            }
            (Repr::Interval { .. }, Repr::Set(_)) => match self.values() {
                Some(vals) => vals.iter().all(|v| other.contains(v)),
                None => false,
            },
        }
    }

    /// Whether the two domains share at least one value.
    pub fn intersects(&self, other: &Domain) -> bool {
        let mut d = self.clone();
        d.intersect(other);
        !d.is_empty()
    }

    /// `self := self ∩ other`. Returns whether `self` changed.
    pub fn intersect(&mut self, other: &Domain) -> bool {
        let before = self.clone();
        let repr = match (&self.repr, &other.repr) {
            (Repr::Interval { lb, ub }, Repr::Interval { lb: olb, ub: oub }) => {
                if other.kind.is_integer() && !self.kind.is_integer() {
                    self.kind = DomainKind::IntervalInt;
                    let (lo, hi) = (lb.max(*olb).ceil(), ub.min(*oub).floor());
                    Repr::Interval { lb: lo, ub: hi }
                } else {
                    Repr::Interval {
                        lb: lb.max(*olb),
                        ub: ub.min(*oub),
                    }
                }
            }
            (Repr::Set(a), _) => Repr::Set(a.iter().filter(|v| other.contains(v)).cloned().collect()),
            (Repr::Interval { .. }, Repr::Set(b)) => {
                Repr::Set(b.iter().filter(|v| self.contains(v)).cloned().collect())
            }
        };
        self.repr = repr;
        self.normalize();
        *self != before
    }

    /// Restricts the numeric bounds to `[lb, ub]`. Non-numeric set
    /// members are kept.
    pub fn intersect_bounds(&mut self, lb: f64, ub: f64) -> bool {
        let before = self.clone();
        match &mut self.repr {
            Repr::Interval { lb: l, ub: u } => {
                *l = l.max(lb);
                *u = u.min(ub);
            }
            Repr::Set(s) => s.retain(|v| match v.as_number() {
                Some(x) => x >= lb && x <= ub,
                None => true,
            }),
        }
        self.normalize();
        *self != before
    }

    /// Removes one value. Intervals only shrink when the value is a bound.
    pub fn remove(&mut self, value: &Value) -> bool {
        let before = self.clone();
        match &mut self.repr {
            Repr::Set(s) => {
                s.remove(value);
            }
            Repr::Interval { lb, ub } => {
                if let Some(x) = value.as_number() {
                    let step = if self.kind.is_integer() { 1.0 } else { 0.0 };
                    if *lb == *ub && x == *lb {
                        self.repr = Repr::Set(BTreeSet::new());
                    } else if step > 0.0 && x == *lb {
                        *lb += step;
                    } else if step > 0.0 && x == *ub {
                        *ub -= step;
                    }
                }
            }
        }
        self.normalize();
        *self != before
    }

    /// Widens back to `other`, including its kind. Returns whether anything
    /// changed.
    pub fn relax_to(&mut self, other: &Domain) -> bool {
        if self == other {
            return false;
        }
        *self = other.clone();
        true
    }

    /// Removes every value.
    pub fn empty(&mut self) {
        self.repr = Repr::Set(BTreeSet::new());
    }

    /// Closes an open domain. Returns whether it was open.
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// Adds a value to an open domain.
    pub fn insert(&mut self, value: Value) -> Result<bool, DomainError> {
        if !self.open {
            return Err(DomainError::Closed);
        }
        match &mut self.repr {
            Repr::Set(s) => Ok(s.insert(value)),
            Repr::Interval { .. } => Err(DomainError::Closed),
        }
    }

    fn normalize(&mut self) {
        if let Repr::Interval { lb, ub } = &mut self.repr {
            if self.kind.is_integer() {
                *lb = lb.ceil();
                *ub = ub.floor();
            }
            if lb.is_nan() || ub.is_nan() || *lb > *ub {
                self.repr = Repr::Set(BTreeSet::new());
            }
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Interval { lb, ub } => write!(f, "[{lb}, {ub}]"),
            Repr::Set(s) => {
                write!(f, "{{")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_int_interval_rounding() {
        let d = Domain::int_interval(0.5, 3.7);
        assert_eq!(d.bounds(), Some((1.0, 3.0)));
        assert_eq!(d.size(), Some(3));
        assert!(Domain::int_interval(0.2, 0.8).is_empty());
    }

    #[test]
    fn test_real_interval_size() {
        assert_eq!(Domain::interval(0.0, 1.0).size(), None);
        assert_eq!(Domain::interval(2.0, 2.0).size(), Some(1));
        assert!(Domain::interval(f64::NEG_INFINITY, f64::INFINITY).bounds().is_some());
    }

    #[test]
    fn test_interval_set_intersection() {
        let mut d = Domain::int_interval(0.0, 10.0);
        assert!(d.intersect(&Domain::numbers([2.0, 4.5, 11.0])));
        assert!(!d.is_empty());
        assert_eq!(d.singleton_value(), Some(Value::number(2.0)));
        assert_eq!(d.kind(), DomainKind::IntervalInt);
    }

    #[test]
    fn test_huge_int_interval_has_no_size() {
        let d = Domain::int_interval(0.0, 2e19);
        assert_eq!(d.size(), None);
        assert!(!d.is_finite());
        assert_eq!(d.values(), None);
        assert_eq!(d.bounds(), Some((0.0, 2e19)));
        assert_eq!(Domain::int_interval(0.0, 1e15).size(), Some(1_000_000_000_000_001));
    }

    #[test]
    fn test_real_meets_integer_interval() {
        let mut d = Domain::interval(0.0, 5.0);
        assert!(d.intersect(&Domain::int_interval(0.0, 5.0)));
        assert_eq!(d.kind(), DomainKind::IntervalInt);
        assert!(!d.contains(&Value::number(1.5)));
        assert!(d.contains(&Value::number(2.0)));
        assert_eq!(d.size(), Some(6));

        let mut r = Domain::interval(0.5, 4.5);
        r.intersect(&Domain::int_interval(0.0, 10.0));
        assert_eq!(r.bounds(), Some((1.0, 4.0)));

        let mut i = Domain::int_interval(0.0, 5.0);
        assert!(!i.intersect(&Domain::interval(0.0, 5.0)));
        assert_eq!(i.kind(), DomainKind::IntervalInt);
    }

    #[test]
    fn test_symbolic_operations() {
        let mut d = Domain::symbols(["red", "green", "blue"]);
        assert!(d.contains(&Value::symbol("red")));
        assert!(d.remove(&Value::symbol("red")));
        assert!(!d.remove(&Value::symbol("red")));
        assert_eq!(d.size(), Some(2));
        assert!(Domain::symbols(["green"]).is_subset_of(&d));
        assert!(!d.is_subset_of(&Domain::symbols(["green"])));
    }

    #[test]
    fn test_remove_interval_bound() {
        let mut d = Domain::int_interval(0.0, 3.0);
        assert!(d.remove(&Value::number(0.0)));
        assert_eq!(d.bounds(), Some((1.0, 3.0)));
        assert!(!d.remove(&Value::number(2.0)));
        let mut s = Domain::interval(1.0, 1.0);
        assert!(s.remove(&Value::number(1.0)));
        assert!(s.is_empty());
    }

    #[test]
    fn test_open_domain_insert() {
        let mut d = Domain::symbols(["a"]).opened();
        assert!(d.is_open());
        assert_eq!(d.insert(Value::symbol("b")), Ok(true));
        assert!(d.close());
        assert!(matches!(d.insert(Value::symbol("c")), Err(DomainError::Closed)));
    }

    #[test]
    fn test_relax_restores_kind_and_values() {
        let wide = Domain::interval(0.0, 5.0);
        let mut d = wide.clone();
        d.intersect(&Domain::int_interval(2.0, 3.0));
        assert_eq!(d.kind(), DomainKind::IntervalInt);
        assert!(d.relax_to(&wide));
        assert_eq!(d.kind(), DomainKind::IntervalReal);
        assert_eq!(d.bounds(), Some((0.0, 5.0)));
        assert!(!d.relax_to(&wide));
    }

    #[test]
    fn test_empty_domains_compare_equal() {
        let mut a = Domain::int_interval(0.0, 1.0);
        a.intersect_bounds(5.0, 6.0);
        let mut b = Domain::int_interval(3.0, 9.0);
        b.intersect_bounds(20.0, 30.0);
        assert!(a.is_empty() && b.is_empty());
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_intersection_is_subset(
            a in -50i32..50, b in -50i32..50, c in -50i32..50, d in -50i32..50
        ) {
            let mut x = Domain::int_interval(a.min(b) as f64, a.max(b) as f64);
            let y = Domain::int_interval(c.min(d) as f64, c.max(d) as f64);
            let orig = x.clone();
            x.intersect(&y);
            prop_assert!(x.is_subset_of(&orig));
            prop_assert!(x.is_subset_of(&y));
        }

        #[test]
        fn prop_intersect_is_idempotent(values in proptest::collection::vec(-20i32..20, 0..10)) {
            let mut x = Domain::numbers(values.iter().map(|v| *v as f64));
            let y = Domain::int_interval(-5.0, 5.0);
            x.intersect(&y);
            let again = x.clone();
            prop_assert!(!x.intersect(&y));
            prop_assert_eq!(x, again);
        }
    }
}
